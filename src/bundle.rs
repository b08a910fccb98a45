//! Wiring from a [`Config`] to ready-to-use client registries.

use crate::admin_client::AdminClient;
use crate::analytics_client::{AnalyticsClient, ClientSummary};
use crate::api::google::GoogleApiFactory;
use crate::api::ApiFactory;
use crate::cache::{AnalyticsCache, CacheStore};
use crate::config::Config;
use crate::registry::{AdminRegistry, AnalyticsRegistry};
use std::sync::Arc;
use tracing::info;

/// Every configured client, built once at startup.
///
/// The analytics and admin client of one name share a cache whose keys are
/// prefixed with `{prefix}.{name}`, so clients sharing a store never collide.
#[derive(Debug)]
pub struct Ga4Bundle {
    config: Config,
    analytics: AnalyticsRegistry,
    admin: AdminRegistry,
}

impl Ga4Bundle {
    /// Builds clients that talk to the Google APIs.
    pub fn new(config: Config, store: Arc<dyn CacheStore>) -> Self {
        Self::with_factory(config, store, Arc::new(GoogleApiFactory::new()))
    }

    pub fn with_factory(config: Config, store: Arc<dyn CacheStore>, factory: Arc<dyn ApiFactory>) -> Self {
        let mut analytics = AnalyticsRegistry::new();
        let mut admin = AdminRegistry::new();

        for (name, client_config) in &config.clients {
            let settings = &client_config.cache;
            let cache = Arc::new(AnalyticsCache::new(
                Arc::clone(&store),
                format!("{}.{}", settings.prefix, name),
                settings.lifetime(),
                settings.enabled,
            ));

            analytics.add_client(
                name.clone(),
                Arc::new(AnalyticsClient::new(
                    name.clone(),
                    client_config.clone(),
                    Arc::clone(&cache),
                    Arc::clone(&factory),
                )),
            );
            admin.add_client(
                name.clone(),
                Arc::new(AdminClient::new(
                    name.clone(),
                    client_config.clone(),
                    cache,
                    Arc::clone(&factory),
                )),
            );

            info!(
                client = %name,
                property_id = %client_config.property_id,
                cache_enabled = settings.enabled,
                "Registered GA4 client"
            );
        }

        if let Some(default) = config.default_client_name() {
            analytics.set_default_client(default);
            admin.set_default_client(default);
        }

        Ga4Bundle {
            config,
            analytics,
            admin,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analytics(&self) -> &AnalyticsRegistry {
        &self.analytics
    }

    pub fn admin(&self) -> &AdminRegistry {
        &self.admin
    }

    /// Per-client diagnostics, or `None` when diagnostics are disabled.
    pub fn summaries(&self) -> Option<Vec<ClientSummary>> {
        if !self.config.diagnostics {
            return None;
        }
        Some(
            self.analytics
                .clients()
                .values()
                .map(|client| client.summary())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::test_support::{report_response, FakeDataApi, FakeFactory};

    const CONFIG: &str = r#"
default_client = "shop"
diagnostics = true

[clients.shop]
property_id = "111"
service_account_credentials_json = "shop.json"
proxy = "http://proxy.local:3128"

[clients.blog]
property_id = "222"
service_account_credentials_json = "blog.json"

[clients.blog.cache]
enabled = false
prefix = "blog_cache"
"#;

    fn bundle_from(config: &str, store: Arc<InMemoryCacheStore>) -> Ga4Bundle {
        let api = FakeDataApi::returning(report_response(&[], &[("totalUsers", "TYPE_INTEGER")], vec![]));
        Ga4Bundle::with_factory(
            Config::from_toml_str(config).unwrap(),
            store,
            Arc::new(FakeFactory::with_data(api)),
        )
    }

    fn bundle(store: Arc<InMemoryCacheStore>) -> Ga4Bundle {
        bundle_from(CONFIG, store)
    }

    #[test]
    fn test_registries_and_defaults() {
        let bundle = bundle(Arc::new(InMemoryCacheStore::new()));

        assert_eq!(bundle.analytics().len(), 2);
        assert!(bundle.admin().has_client("blog"));
        assert_eq!(bundle.analytics().default_client().unwrap().property_id(), "111");
        assert_eq!(bundle.admin().default_client().unwrap().name(), "shop");

        let blog = bundle.analytics().get_client("blog").unwrap();
        assert_eq!(blog.cache().namespace(), "blog_cache.blog");
        assert!(!blog.cache().is_enabled());
    }

    #[test]
    fn test_summaries() {
        let bundle = bundle(Arc::new(InMemoryCacheStore::new()));
        let summaries = bundle.summaries().unwrap();

        assert_eq!(summaries.len(), 2);
        let shop = summaries.iter().find(|summary| summary.name == "shop").unwrap();
        assert!(shop.proxy_enabled);
        assert!(shop.cache_enabled);
        assert_eq!(shop.cache_lifetime_minutes, 1440);
    }

    #[tokio::test]
    async fn test_clients_share_store_without_collisions() {
        const BOTH_CACHING: &str = r#"
[clients.shop]
property_id = "111"
service_account_credentials_json = "shop.json"

[clients.blog]
property_id = "222"
service_account_credentials_json = "blog.json"
"#;
        let store = Arc::new(InMemoryCacheStore::new());
        let bundle = bundle_from(BOTH_CACHING, store.clone());

        let shop = bundle.analytics().get_client("shop").unwrap();
        shop.get_total_visitors_and_page_views(None).await.unwrap();
        let blog = bundle.analytics().get_client("blog").unwrap();
        blog.get_total_visitors_and_page_views(None).await.unwrap();

        // same operation key, one entry per client namespace
        assert_eq!(store.len(), 2);
        let period = crate::period::Period::days(30);
        let key = format!("total_visitors_pageviews_{}_{}", period.start_key(), period.end_key());
        assert!(shop.cache().delete(&key).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_client_writes_nothing() {
        let store = Arc::new(InMemoryCacheStore::new());
        let bundle = bundle(store.clone());

        let blog = bundle.analytics().get_client("blog").unwrap();
        blog.get_total_visitors_and_page_views(None).await.unwrap();
        assert!(store.is_empty());
    }
}
