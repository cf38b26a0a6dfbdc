use async_graphql::{Context, InputObject, Object, Result};

use crate::{
    api::Source,
    dashboard::{SortOrder, ViewOptions},
    product::Condition,
    query::SearchQuery,
    search::{self, SearchOutcome},
    settings::Marketplace,
};

#[derive(InputObject, Debug, Default)]
pub(crate) struct SearchOptions {
    /// Price order of the records.
    #[graphql(default)]
    order: SortOrder,
    /// Keep only products shipped for free.
    #[graphql(default)]
    free_shipping_only: bool,
    /// Conditions to keep. Both when omitted; none when empty.
    conditions: Option<Vec<Condition>>,
}

impl From<SearchOptions> for ViewOptions {
    fn from(options: SearchOptions) -> Self {
        Self {
            order: options.order,
            free_shipping_only: options.free_shipping_only,
            conditions: options
                .conditions
                .unwrap_or_else(|| Condition::ALL.to_vec()),
        }
    }
}

#[derive(Default)]
pub(super) struct ProductSearchQuery;

#[Object]
impl ProductSearchQuery {
    /// Searches the marketplace. Returns null for a blank query.
    async fn search(
        &self,
        ctx: &Context<'_>,
        query: String,
        options: Option<SearchOptions>,
    ) -> Result<Option<SearchOutcome>> {
        let Some(query) = SearchQuery::new(&query) else {
            return Ok(None);
        };
        let source = ctx.data::<Source>()?;
        let marketplace = ctx.data::<Marketplace>()?;
        let options = ViewOptions::from(options.unwrap_or_default());
        Ok(Some(
            search::run(source.as_ref(), marketplace, &query, &options).await,
        ))
    }
}
