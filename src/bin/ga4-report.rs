//! GA4 Report Binary
//!
//! Run with: `GA4_CONFIG=ga4.toml cargo run --bin ga4-report -- [client]`
//!
//! Prints the most viewed pages and the visitor totals of the last 30 days
//! as JSON. Set RUST_LOG to control log output, e.g. `RUST_LOG=ga4_analytics=debug`.
//! Responses are cached in `GA4_CACHE_DB` (default `ga4-cache.db`).

use ga4_analytics::{Config, Ga4Bundle, SqliteCacheStore, DEFAULT_LIMIT};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config_path = std::env::var("GA4_CONFIG").unwrap_or_else(|_| "ga4.toml".to_string());
    let cache_path = std::env::var("GA4_CACHE_DB").unwrap_or_else(|_| "ga4-cache.db".to_string());

    let config = Config::from_file(&config_path)?;
    let store = Arc::new(SqliteCacheStore::new(&cache_path)?);
    let bundle = Ga4Bundle::new(config, store);

    let client = match std::env::args().nth(1) {
        Some(name) => bundle.analytics().get_client(&name)?,
        None => bundle.analytics().default_client()?,
    };

    let pages = client.get_most_viewed_pages(None, DEFAULT_LIMIT).await?;
    let totals = client.get_total_visitors_and_page_views(None).await?;

    let output = json!({
        "client": client.name(),
        "property_id": client.property_id(),
        "most_viewed_pages": pages,
        "totals": totals,
        "diagnostics": bundle.summaries(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
