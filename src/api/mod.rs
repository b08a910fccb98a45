//! Seams over the remote Google Analytics APIs.
//!
//! The clients in this crate never talk HTTP directly. They call through the
//! traits below, which lets the same request-building, caching and
//! normalisation logic run against the real REST transport
//! ([`google::GoogleTransport`]) or against in-process fakes in tests.

pub mod admin;
pub mod credentials;
pub mod data;
pub mod google;

use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

pub use admin::{CustomDimensionResource, CustomMetricResource};
pub use data::{RunReportRequest, RunReportResponse};

/// Report execution on the Data API.
#[async_trait]
pub trait AnalyticsDataApi: Send + Sync {
    /// Runs a single report request and returns the raw tabular response.
    async fn run_report(&self, request: &RunReportRequest)
        -> Result<RunReportResponse, TransportError>;
}

/// Property administration on the Admin API.
///
/// List operations return every element; paging is the transport's concern.
#[async_trait]
pub trait AdminApi: Send + Sync {
    async fn list_custom_dimensions(
        &self,
        parent: &str,
    ) -> Result<Vec<CustomDimensionResource>, TransportError>;

    async fn create_custom_dimension(
        &self,
        parent: &str,
        dimension: &CustomDimensionResource,
    ) -> Result<CustomDimensionResource, TransportError>;

    /// Updates the fields named in `update_mask` (snake_case field paths).
    async fn update_custom_dimension(
        &self,
        dimension: &CustomDimensionResource,
        update_mask: &[String],
    ) -> Result<CustomDimensionResource, TransportError>;

    async fn archive_custom_dimension(&self, name: &str) -> Result<(), TransportError>;

    async fn list_custom_metrics(
        &self,
        parent: &str,
    ) -> Result<Vec<CustomMetricResource>, TransportError>;
}

/// Builds authenticated API handles for a configured client.
///
/// Called at most once per client and API kind; the clients keep the handle
/// for the rest of the process lifetime.
pub trait ApiFactory: Send + Sync {
    fn create_data_api(
        &self,
        config: &ClientConfig,
    ) -> Result<Arc<dyn AnalyticsDataApi>, TransportError>;

    fn create_admin_api(&self, config: &ClientConfig) -> Result<Arc<dyn AdminApi>, TransportError>;
}
