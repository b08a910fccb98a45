use ga4_analytics::api::google::StaticToken;
use ga4_analytics::{
    AdminApi, AnalyticsDataApi, ApiFactory, ClientConfig, Config, Ga4Bundle, GoogleTransport,
    InMemoryCacheStore, ReportValue, TransportError,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Points every client at the mock server with a fixed token.
struct MockServerFactory {
    uri: String,
}

impl MockServerFactory {
    fn transport(&self) -> GoogleTransport {
        GoogleTransport::new(reqwest::Client::new(), Arc::new(StaticToken("test-token".to_string())))
            .with_base_urls(self.uri.clone(), self.uri.clone())
    }
}

impl ApiFactory for MockServerFactory {
    fn create_data_api(&self, _config: &ClientConfig) -> Result<Arc<dyn AnalyticsDataApi>, TransportError> {
        Ok(Arc::new(self.transport()))
    }

    fn create_admin_api(&self, _config: &ClientConfig) -> Result<Arc<dyn AdminApi>, TransportError> {
        Ok(Arc::new(self.transport()))
    }
}

fn config() -> Config {
    Config::from_json_str(
        r#"{
            "clients": {
                "shop": {"property_id": "111", "service_account_credentials_json": "shop.json"},
                "blog": {"property_id": "222", "service_account_credentials_json": "blog.json"}
            }
        }"#,
    )
    .unwrap()
}

#[test]
fn registry_resolves_configured_clients() {
    let bundle = Ga4Bundle::new(config(), Arc::new(InMemoryCacheStore::new()));

    assert!(bundle.analytics().has_client("shop"));
    assert!(!bundle.analytics().has_client("news"));

    let err = bundle.admin().get_client("news").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Analytics client with key \"news\" does not exist in the registry."
    );

    // without an explicit default the first client by name is used
    assert_eq!(bundle.analytics().default_client().unwrap().property_id(), "222");

    let first = bundle.analytics().get_client("shop").unwrap();
    let second = bundle.analytics().get_client("shop").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(bundle.summaries().is_none());
}

#[tokio::test]
async fn registry_client_runs_reports_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/properties/111:runReport"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "metricHeaders": [
                {"name": "totalUsers", "type": "TYPE_INTEGER"},
                {"name": "screenPageViews", "type": "TYPE_INTEGER"},
                {"name": "sessions", "type": "TYPE_INTEGER"}
            ],
            "rows": [{"metricValues": [{"value": "12"}, {"value": "34"}, {"value": "15"}]}],
            "rowCount": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let factory = Arc::new(MockServerFactory { uri: server.uri() });
    let bundle = Ga4Bundle::with_factory(config(), Arc::new(InMemoryCacheStore::new()), factory);
    let shop = bundle.analytics().get_client("shop").unwrap();

    let totals = shop.get_total_visitors_and_page_views(None).await.unwrap();
    assert_eq!(totals["totalUsers"], ReportValue::Integer(12));
    assert_eq!(totals["screenPageViews"], ReportValue::Integer(34));

    // served from cache, the mock expects a single request
    let cached = shop.get_total_visitors_and_page_views(None).await.unwrap();
    assert_eq!(cached, totals);
}

#[tokio::test]
async fn registry_admin_client_reports_remote_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/properties/222/customDimensions"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": 403, "message": "User does not have sufficient permissions"}
        })))
        .mount(&server)
        .await;

    let factory = Arc::new(MockServerFactory { uri: server.uri() });
    let bundle = Ga4Bundle::with_factory(config(), Arc::new(InMemoryCacheStore::new()), factory);
    let blog = bundle.admin().get_client("blog").unwrap();

    let err = blog.list_custom_dimensions().await.unwrap_err();
    assert!(err.to_string().contains("Failed to list custom dimensions"));
    assert!(err.to_string().contains("User does not have sufficient permissions"));
}
