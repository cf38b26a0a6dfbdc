use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc};

use async_graphql::http::GraphiQLSource;
use async_graphql_warp::{GraphQLBadRequest, GraphQLResponse};
use tracing::{error, info};
use warp::{http::StatusCode, reply::Response, Filter, Rejection, Reply};

use crate::{
    api::{Schema, Source},
    dashboard::{SortOrder, ViewOptions},
    product::Condition,
    query::SearchQuery,
    render::Pages,
    search,
    settings::Marketplace,
};

/// What the dashboard page needs to run a search.
#[derive(Clone)]
pub(crate) struct Dashboard {
    source: Source,
    marketplace: Arc<Marketplace>,
    pages: Arc<Pages>,
}

impl Dashboard {
    pub(crate) fn new(source: Source, marketplace: Marketplace, pages: Pages) -> Self {
        Self {
            source,
            marketplace: Arc::new(marketplace),
            pages: Arc::new(pages),
        }
    }
}

/// Query string of the dashboard page, named after the form fields.
#[derive(Debug, Default)]
struct DashboardParams {
    q: Option<String>,
    ordem: Option<String>,
    frete: Option<String>,
    novo: Option<String>,
    usado: Option<String>,
    /// Set by the form, so unchecked condition boxes can be told apart from
    /// a first visit.
    aplicado: Option<String>,
}

impl DashboardParams {
    /// Reads the decoded query pairs. Unknown keys are ignored and a repeated
    /// key keeps its first value.
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let field = match key.as_str() {
                "q" => &mut params.q,
                "ordem" => &mut params.ordem,
                "frete" => &mut params.frete,
                "novo" => &mut params.novo,
                "usado" => &mut params.usado,
                "aplicado" => &mut params.aplicado,
                _ => continue,
            };
            field.get_or_insert(value);
        }
        params
    }

    fn view_options(&self) -> ViewOptions {
        let order = match self.ordem.as_deref() {
            Some("desc") => SortOrder::Descending,
            _ => SortOrder::Ascending,
        };
        let conditions = if self.aplicado.is_some() {
            [
                (self.novo.is_some(), Condition::New),
                (self.usado.is_some(), Condition::Used),
            ]
            .into_iter()
            .filter_map(|(selected, condition)| selected.then_some(condition))
            .collect()
        } else {
            Condition::ALL.to_vec()
        };
        ViewOptions {
            order,
            free_shipping_only: self.frete.is_some(),
            conditions,
        }
    }
}

pub(crate) async fn serve(
    schema: Schema,
    dashboard: Dashboard,
    addr: SocketAddr,
    tls: Option<(PathBuf, PathBuf)>,
) {
    let server = warp::serve(routes(schema, dashboard));
    if let Some((cert, key)) = tls {
        info!("Serving https://{addr}");
        server.tls().cert_path(cert).key_path(key).run(addr).await;
    } else {
        info!("Serving http://{addr}");
        server.run(addr).await;
    }
}

fn routes(
    schema: Schema,
    dashboard: Dashboard,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let page = warp::path::end()
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>().map(DashboardParams::from_pairs))
        .and(warp::any().map(move || dashboard.clone()))
        .then(dashboard_page);

    let graphiql = warp::path!("graphql")
        .and(warp::get())
        .map(|| warp::reply::html(GraphiQLSource::build().endpoint("/graphql").finish()));

    let graphql = warp::path!("graphql")
        .and(warp::post())
        .and(async_graphql_warp::graphql(schema))
        .then(
            |(schema, request): (Schema, async_graphql::Request)| async move {
                GraphQLResponse::from(schema.execute(request).await)
            },
        );

    page.or(graphiql).or(graphql).recover(handle_rejection)
}

async fn dashboard_page(params: DashboardParams, dashboard: Dashboard) -> Response {
    let options = params.view_options();
    let text = params.q.unwrap_or_default();
    let outcome = match SearchQuery::new(&text) {
        Some(query) => Some(
            search::run(
                dashboard.source.as_ref(),
                &dashboard.marketplace,
                &query,
                &options,
            )
            .await,
        ),
        None => None,
    };
    match dashboard
        .pages
        .dashboard(&text, &options, outcome.as_ref())
    {
        Ok(html) => warp::reply::html(html).into_response(),
        Err(e) => {
            error!("Problem while rendering the dashboard. {e}");
            warp::reply::with_status(
                "INTERNAL_SERVER_ERROR".to_string(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if let Some(GraphQLBadRequest(err)) = err.find() {
        return Ok(warp::reply::with_status(
            err.to_string(),
            StatusCode::BAD_REQUEST,
        ));
    }
    if err.is_not_found() {
        return Ok(warp::reply::with_status(
            "NOT_FOUND".to_string(),
            StatusCode::NOT_FOUND,
        ));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(warp::reply::with_status(
            "METHOD_NOT_ALLOWED".to_string(),
            StatusCode::METHOD_NOT_ALLOWED,
        ));
    }
    error!("Unhandled rejection: {err:?}");
    Ok(warp::reply::with_status(
        "INTERNAL_SERVER_ERROR".to_string(),
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}
