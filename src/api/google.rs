use super::admin::{
    CustomDimensionResource, CustomMetricResource, ListCustomDimensionsResponse,
    ListCustomMetricsResponse,
};
use super::credentials::{load_service_account, ServiceAccountKey};
use super::data::{RunReportRequest, RunReportResponse};
use super::{AdminApi, AnalyticsDataApi, ApiFactory};
use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, NoProxy, Proxy, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const DATA_API_BASE: &str = "https://analyticsdata.googleapis.com/v1beta";
pub const ADMIN_API_BASE: &str = "https://analyticsadmin.googleapis.com/v1beta";

const SCOPES: &str =
    "https://www.googleapis.com/auth/analytics.readonly https://www.googleapis.com/auth/analytics.edit";
const PAGE_SIZE: u32 = 200;
/// Tokens are refreshed this many seconds before they expire.
const TOKEN_REFRESH_MARGIN: i64 = 60;

/// Supplies OAuth access tokens to the transport.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, TransportError>;
}

/// Fixed token, for tests and externally managed credentials.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, TransportError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Exchanges a signed service account JWT for an access token and caches it
/// until shortly before expiry.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, http: Client) -> Self {
        ServiceAccountTokenSource {
            key,
            http,
            cached: Mutex::new(None),
        }
    }

    fn signed_assertion(&self, now: i64) -> Result<String, TransportError> {
        let claims = JwtClaims {
            iss: &self.key.client_email,
            scope: SCOPES,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key.private_key_id.clone());

        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| TransportError::Auth(format!("Invalid private key: {}", e)))?;

        jsonwebtoken::encode(&header, &claims, &signing_key)
            .map_err(|e| TransportError::Auth(format!("Failed to sign assertion: {}", e)))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String, TransportError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.signed_assertion(now)?;
        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Auth(format!(
                "Token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let token: TokenResponse = response.json().await?;
        debug!(client_email = %self.key.client_email, "Obtained access token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });
        Ok(token.access_token)
    }
}

/// REST transport for both the Data API and the Admin API.
pub struct GoogleTransport {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    data_base: String,
    admin_base: String,
}

impl std::fmt::Debug for GoogleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTransport")
            .field("data_base", &self.data_base)
            .field("admin_base", &self.admin_base)
            .finish()
    }
}

impl GoogleTransport {
    pub fn new(http: Client, tokens: Arc<dyn TokenSource>) -> Self {
        GoogleTransport {
            http,
            tokens,
            data_base: DATA_API_BASE.to_string(),
            admin_base: ADMIN_API_BASE.to_string(),
        }
    }

    /// Overrides both API base URLs (e.g. to point at a mock server).
    pub fn with_base_urls(mut self, data_base: impl Into<String>, admin_base: impl Into<String>) -> Self {
        self.data_base = data_base.into();
        self.admin_base = admin_base.into();
        self
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Pulls `error.message` out of a Google error body, falling back to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl AnalyticsDataApi for GoogleTransport {
    async fn run_report(
        &self,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, TransportError> {
        let url = format!("{}/{}:runReport", self.data_base, request.property);
        self.send(self.http.post(url).json(request)).await
    }
}

#[async_trait]
impl AdminApi for GoogleTransport {
    async fn list_custom_dimensions(
        &self,
        parent: &str,
    ) -> Result<Vec<CustomDimensionResource>, TransportError> {
        let url = format!("{}/{}/customDimensions", self.admin_base, parent);
        let mut dimensions = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ListCustomDimensionsResponse = self.send(request).await?;
            dimensions.extend(page.custom_dimensions);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(url = %url, page_token = %token, "Page token repeated, stopping pagination");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(dimensions)
    }

    async fn create_custom_dimension(
        &self,
        parent: &str,
        dimension: &CustomDimensionResource,
    ) -> Result<CustomDimensionResource, TransportError> {
        let url = format!("{}/{}/customDimensions", self.admin_base, parent);
        self.send(self.http.post(url).json(dimension)).await
    }

    async fn update_custom_dimension(
        &self,
        dimension: &CustomDimensionResource,
        update_mask: &[String],
    ) -> Result<CustomDimensionResource, TransportError> {
        let url = format!("{}/{}", self.admin_base, dimension.name);
        let request = self
            .http
            .patch(url)
            .query(&[("updateMask", update_mask.join(","))])
            .json(dimension);
        self.send(request).await
    }

    async fn archive_custom_dimension(&self, name: &str) -> Result<(), TransportError> {
        let url = format!("{}/{}:archive", self.admin_base, name);
        let _: serde_json::Value = self
            .send(self.http.post(url).json(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn list_custom_metrics(
        &self,
        parent: &str,
    ) -> Result<Vec<CustomMetricResource>, TransportError> {
        let url = format!("{}/{}/customMetrics", self.admin_base, parent);
        let mut metrics = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).query(&[("pageSize", PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page: ListCustomMetricsResponse = self.send(request).await?;
            metrics.extend(page.custom_metrics);

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) if page_token.as_deref() == Some(token.as_str()) => {
                    warn!(url = %url, page_token = %token, "Page token repeated, stopping pagination");
                    break;
                }
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(metrics)
    }
}

/// Configuration for the HTTP client built by [`GoogleApiFactory`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig { timeout_seconds: 30 }
    }
}

/// Builds [`GoogleTransport`] handles from client configuration, validating
/// the credentials file first.
#[derive(Debug, Clone, Default)]
pub struct GoogleApiFactory {
    config: TransportConfig,
}

impl GoogleApiFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        GoogleApiFactory { config }
    }

    /// Creates the HTTP client, applying the proxy settings if any.
    pub fn build_http_client(&self, config: &ClientConfig) -> Result<Client, TransportError> {
        let mut builder =
            Client::builder().timeout(Duration::from_secs(self.config.timeout_seconds));

        if let Some(proxy_url) = config.proxy.as_deref().filter(|url| !url.is_empty()) {
            let mut proxy =
                Proxy::all(proxy_url).map_err(|e| TransportError::Http(e.to_string()))?;
            if !config.no_proxy.is_empty() {
                proxy = proxy.no_proxy(NoProxy::from_string(&config.no_proxy.join(",")));
            }
            builder = builder.proxy(proxy);

            info!(
                proxy = %proxy_url,
                no_proxy = ?config.no_proxy,
                "Google Analytics API using proxy"
            );
        }

        builder
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    pub fn create_transport(&self, config: &ClientConfig) -> Result<GoogleTransport, TransportError> {
        let key = load_service_account(&config.service_account_credentials_json)?;
        let http = self.build_http_client(config)?;
        let tokens = Arc::new(ServiceAccountTokenSource::new(key, http.clone()));
        Ok(GoogleTransport::new(http, tokens))
    }
}

impl ApiFactory for GoogleApiFactory {
    fn create_data_api(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn AnalyticsDataApi>, TransportError> {
        Ok(Arc::new(self.create_transport(config)?))
    }

    fn create_admin_api(&self, config: &ClientConfig) -> Result<Arc<dyn AdminApi>, TransportError> {
        Ok(Arc::new(self.create_transport(config)?))
    }
}
