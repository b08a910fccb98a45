pub mod admin_client;
pub mod analytics_client;
pub mod api;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod dimension;
pub mod error;
pub mod filter;
pub mod order_by;
pub mod period;
pub mod processor;
pub mod registry;
pub mod report;
pub mod sqlite_store;
pub mod type_caster;

#[cfg(test)]
mod test_support;

pub use admin_client::{
    AdminClient, BatchResult, CreateOutcome, CustomDimensionRecord, CustomMetricRecord,
    DimensionValidation, SyncResult,
};
pub use analytics_client::{AnalyticsClient, ClientSummary, ReportOptions, DEFAULT_LIMIT};
pub use api::google::{GoogleApiFactory, GoogleTransport};
pub use api::{AdminApi, AnalyticsDataApi, ApiFactory};
pub use bundle::Ga4Bundle;
pub use cache::{AnalyticsCache, CacheStore, InMemoryCacheStore};
pub use config::{CacheSettings, ClientConfig, Config};
pub use dimension::{CustomDimension, DimensionScope};
pub use error::{
    AdminApiError, AnalyticsError, CacheError, ClientNotFoundError, ConfigError, CredentialsError,
    FilterError, InvalidPeriodError, TransportError, TypeCastError, ValidationError,
};
pub use filter::{FilterNode, StringMatchType};
pub use order_by::{Direction, OrderBy};
pub use period::Period;
pub use processor::ReportProcessor;
pub use registry::{AdminRegistry, AnalyticsRegistry, ClientRegistry};
pub use report::{AnalyticsReport, ReportRow, ReportValue};
pub use sqlite_store::SqliteCacheStore;
pub use type_caster::cast_value;
