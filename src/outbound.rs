use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{query::SearchQuery, settings::Marketplace};

const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// A search result as the marketplace returns it. Every field is optional,
/// and a field of an unexpected type reads as missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct RawProduct {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) price: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) permalink: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) condition: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) shipping: Option<Shipping>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub(crate) sold_quantity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub(crate) struct Shipping {
    #[serde(default, deserialize_with = "lenient")]
    pub(crate) free_shipping: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Option<Vec<Value>>,
}

impl SearchResponse {
    /// A result that is not an object becomes an empty record, which the
    /// projector later skips for its missing price.
    fn into_products(self) -> Vec<RawProduct> {
        self.results
            .unwrap_or_default()
            .into_iter()
            .map(|result| serde_json::from_value(result).unwrap_or_default())
            .collect()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Reads a count that may come as an integral float, such as `3.0`.
#[allow(clippy::cast_possible_truncation)]
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|n| n.fract() == 0.0 && n.abs() < 9.0e15)
            .map(|n| n as i64)
    }))
}

#[derive(Debug, Error)]
pub(crate) enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Something that can return one page of search results.
#[async_trait]
pub(crate) trait ProductSource: Send + Sync {
    async fn fetch(
        &self,
        query: &SearchQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawProduct>, FetchError>;
}

/// Client for the marketplace's public search endpoint.
pub(crate) struct MarketClient {
    client: Client,
    search_url: String,
}

impl MarketClient {
    pub(crate) fn new(marketplace: &Marketplace) -> Result<Self> {
        let mut builder = Client::builder().user_agent(APP_USER_AGENT);
        if let Some(timeout) = marketplace.timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            search_url: search_url(&marketplace.api_url, &marketplace.site_id),
        })
    }

    fn page_url(&self, query: &SearchQuery, offset: usize, limit: usize) -> String {
        page_url(&self.search_url, query, offset, limit)
    }
}

#[async_trait]
impl ProductSource for MarketClient {
    async fn fetch(
        &self,
        query: &SearchQuery,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RawProduct>, FetchError> {
        let url = self.page_url(query, offset, limit);
        debug!("GET {url}");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body: SearchResponse = resp.json().await.map_err(FetchError::Decode)?;
        Ok(body.into_products())
    }
}

fn search_url(api_url: &str, site_id: &str) -> String {
    format!("{}/sites/{site_id}/search", api_url.trim_end_matches('/'))
}

fn page_url(search_url: &str, query: &SearchQuery, offset: usize, limit: usize) -> String {
    format!(
        "{search_url}?q={}&offset={offset}&limit={limit}",
        query.encoded()
    )
}

/// Everything collected by walking the result pages of one search.
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    pub(crate) products: Vec<RawProduct>,
    /// One message per page that could not be fetched.
    pub(crate) errors: Vec<String>,
}

/// Fetches `pages` pages of `page_size` results one after another and
/// concatenates them in page order. A failed page adds an error message and
/// nothing else; the walk carries on with the next page.
pub(crate) async fn fetch_pages(
    source: &dyn ProductSource,
    query: &SearchQuery,
    pages: usize,
    page_size: usize,
) -> Fetched {
    let mut fetched = Fetched::default();
    for page in 0..pages {
        let offset = page * page_size;
        match source.fetch(query, offset, page_size).await {
            Ok(products) => {
                debug!("Page at offset {offset} returned {} products", products.len());
                fetched.products.extend(products);
            }
            Err(e) => {
                error!("Problem while fetching products at offset {offset}. {e}");
                fetched.errors.push(format!("Erro ao buscar produtos: {e}"));
            }
        }
    }
    info!(
        "Fetched {} products for \"{query}\" ({} failed pages)",
        fetched.products.len(),
        fetched.errors.len()
    );
    fetched
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;

    /// A source that serves `page_size` numbered products per page, failing
    /// the pages whose offsets are listed in `failing`.
    pub(crate) struct FakeSource {
        pub(crate) failing: Vec<usize>,
        pub(crate) products: Option<Vec<RawProduct>>,
        pub(crate) calls: Mutex<Vec<(usize, usize)>>,
    }

    impl FakeSource {
        pub(crate) fn numbered() -> Self {
            Self {
                failing: Vec::new(),
                products: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Serves `products` as the first page and nothing afterwards.
        pub(crate) fn with_products(products: Vec<RawProduct>) -> Self {
            Self {
                products: Some(products),
                ..Self::numbered()
            }
        }

        pub(crate) fn failing(failing: Vec<usize>) -> Self {
            Self {
                failing,
                ..Self::numbered()
            }
        }
    }

    #[async_trait]
    impl ProductSource for FakeSource {
        async fn fetch(
            &self,
            _query: &SearchQuery,
            offset: usize,
            limit: usize,
        ) -> Result<Vec<RawProduct>, FetchError> {
            self.calls.lock().unwrap().push((offset, limit));
            if self.failing.contains(&offset) {
                return Err(FetchError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }
            if let Some(products) = &self.products {
                return Ok(if offset == 0 {
                    products.clone()
                } else {
                    Vec::new()
                });
            }
            Ok((offset..offset + limit)
                .map(|n| RawProduct {
                    title: Some(format!("product {n}")),
                    price: Some(n as f64),
                    ..RawProduct::default()
                })
                .collect())
        }
    }

    fn decode(body: &str) -> Vec<RawProduct> {
        serde_json::from_str::<SearchResponse>(body)
            .unwrap()
            .into_products()
    }

    fn query(text: &str) -> SearchQuery {
        SearchQuery::new(text).unwrap()
    }

    #[test]
    fn builds_page_url() {
        let url = page_url(
            &search_url("https://api.mercadolibre.com/", "MLB"),
            &query("fone bluetooth"),
            100,
            50,
        );
        assert_eq!(
            url,
            "https://api.mercadolibre.com/sites/MLB/search?q=fone%20bluetooth&offset=100&limit=50"
        );
    }

    #[test]
    fn decodes_search_response() {
        let body = r#"{
            "site_id": "MLB",
            "results": [
                {
                    "id": "MLB1",
                    "title": "Notebook Dell",
                    "price": 3499.9,
                    "permalink": "https://produto.mercadolivre.com.br/MLB1",
                    "condition": "new",
                    "shipping": { "free_shipping": true, "mode": "me2" },
                    "sold_quantity": 12
                },
                { "title": "Sem preço" }
            ]
        }"#;
        let results = decode(body);
        assert_eq!(results.len(), 2);
        let first = &results[0];
        assert_eq!(first.price, Some(3499.9));
        assert_eq!(first.condition.as_deref(), Some("new"));
        assert_eq!(
            first.shipping.as_ref().and_then(|s| s.free_shipping),
            Some(true)
        );
        assert_eq!(first.sold_quantity, Some(12));
        assert_eq!(results[1].price, None);

        assert!(decode(r#"{"paging": {}}"#).is_empty());
        assert!(decode(r#"{"results": null}"#).is_empty());
    }

    #[test]
    fn malformed_fields_spoil_only_their_record() {
        let body = r#"{
            "results": [
                { "title": "ok", "price": 10.0 },
                { "title": "bad", "price": "10,00", "sold_quantity": 3.0 },
                { "title": "odd", "price": 20.5, "shipping": { "free_shipping": "yes" } },
                "not a record",
                { "title": "ok too", "price": 30, "sold_quantity": "many" }
            ]
        }"#;
        let results = decode(body);
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].price, Some(10.0));
        assert_eq!(results[1].title.as_deref(), Some("bad"));
        assert_eq!(results[1].price, None);
        assert_eq!(results[1].sold_quantity, Some(3));
        assert_eq!(results[2].price, Some(20.5));
        assert_eq!(
            results[2].shipping,
            Some(Shipping {
                free_shipping: None
            })
        );
        assert_eq!(results[3], RawProduct::default());
        assert_eq!(results[4].price, Some(30.0));
        assert_eq!(results[4].sold_quantity, None);
    }

    #[tokio::test]
    async fn ten_full_pages() {
        let source = FakeSource::numbered();
        let fetched = fetch_pages(&source, &query("mouse"), 10, 50).await;
        assert_eq!(fetched.products.len(), 500);
        assert!(fetched.errors.is_empty());
        assert_eq!(fetched.products[0].title.as_deref(), Some("product 0"));
        assert_eq!(fetched.products[499].title.as_deref(), Some("product 499"));

        let calls = source.calls.lock().unwrap();
        let offsets: Vec<usize> = calls.iter().map(|(offset, _)| *offset).collect();
        assert_eq!(offsets, [0, 50, 100, 150, 200, 250, 300, 350, 400, 450]);
        assert!(calls.iter().all(|(_, limit)| *limit == 50));
    }

    #[tokio::test]
    async fn failed_pages_contribute_nothing() {
        let source = FakeSource::failing(vec![0, 250, 450]);
        let fetched = fetch_pages(&source, &query("mouse"), 10, 50).await;
        assert_eq!(fetched.products.len(), 7 * 50);
        assert_eq!(fetched.errors.len(), 3);
        assert!(fetched.errors[0].starts_with("Erro ao buscar produtos:"));
        assert_eq!(fetched.products[0].title.as_deref(), Some("product 50"));
    }
}
