mod api;
mod dashboard;
mod outbound;
mod product;
mod query;
mod render;
mod search;
mod settings;
mod web;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    api::Source,
    outbound::MarketClient,
    render::Pages,
    settings::{Args, Settings},
    web::Dashboard,
};

const DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let settings = Settings::load(args.config.as_deref())
        .context("Problem while loading settings")?;
    info!(
        "Searching {} on site {}",
        settings.marketplace.api_url, settings.marketplace.site_id
    );

    let client = MarketClient::new(&settings.marketplace)
        .context("Problem while building the marketplace client")?;
    let source: Source = Arc::new(client);

    let schema = api::schema(source.clone(), settings.marketplace.clone());
    let pages = Pages::new().context("Problem while loading the page templates")?;
    let dashboard = Dashboard::new(source, settings.marketplace, pages);
    let tls = args.cert.zip(args.key);
    web::serve(schema, dashboard, settings.web.address, tls).await;
    Ok(())
}
