use async_graphql::SimpleObject;
use tracing::info;

use crate::{
    dashboard::{histogram, HistogramBin, PriceStats, ViewOptions, MAX_BINS},
    outbound::{fetch_pages, ProductSource},
    product::{project, DisplayRecord},
    query::{filter_exact, SearchQuery},
    settings::Marketplace,
};

/// The result of one search submission, ready to be shown.
#[derive(SimpleObject, Debug, Default)]
pub(crate) struct SearchOutcome {
    /// The query as typed.
    pub(crate) query: String,
    /// Products returned by the marketplace over all pages.
    pub(crate) fetched_count: usize,
    /// Products left after the exact-match filter.
    pub(crate) matched_count: usize,
    /// Matched products dropped for lacking a price.
    pub(crate) skipped_count: usize,
    /// One message per page that could not be fetched.
    pub(crate) errors: Vec<String>,
    pub(crate) records: Vec<DisplayRecord>,
    /// `None` when no record is left.
    pub(crate) stats: Option<PriceStats>,
    pub(crate) histogram: Vec<HistogramBin>,
}

/// Runs one search from fetch to display data.
pub(crate) async fn run(
    source: &dyn ProductSource,
    marketplace: &Marketplace,
    query: &SearchQuery,
    options: &ViewOptions,
) -> SearchOutcome {
    let fetched = fetch_pages(
        source,
        query,
        marketplace.pages(),
        marketplace.page_size,
    )
    .await;
    let fetched_count = fetched.products.len();

    let matched = filter_exact(fetched.products, query);
    let matched_count = matched.len();

    let projection = project(&matched);
    let records = options.apply(projection.records);
    let stats = PriceStats::compute(&records);
    let prices: Vec<f64> = records.iter().map(|r| r.price).collect();
    let histogram = histogram(&prices, MAX_BINS);

    info!(
        "Search \"{query}\": {fetched_count} fetched, {matched_count} matched, {} shown",
        records.len()
    );
    SearchOutcome {
        query: query.as_str().to_string(),
        fetched_count,
        matched_count,
        skipped_count: projection.skipped,
        errors: fetched.errors,
        records,
        stats,
        histogram,
    }
}
