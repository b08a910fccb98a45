//! Report queries against the Data API.
//!
//! Every report method resolves a default [`Period`], derives a cache key
//! from its parameters, and on a miss builds a `runReport` request, runs it
//! and normalises the response through the [`ReportProcessor`].

use crate::api::data::{RunReportRequest, RunReportResponse};
use crate::api::{AnalyticsDataApi, ApiFactory};
use crate::cache::AnalyticsCache;
use crate::config::ClientConfig;
use crate::error::{AnalyticsError, BoxError, FilterError, TransportError};
use crate::filter::FilterNode;
use crate::order_by::{Direction, OrderBy};
use crate::period::Period;
use crate::processor::ReportProcessor;
use crate::report::{AnalyticsReport, ReportRow, ReportValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error};

pub const DEFAULT_PERIOD_DAYS: u32 = 30;
pub const TRANSACTION_LOOKUP_DAYS: u32 = 180;
pub const DEFAULT_LIMIT: u32 = 20;

const TOTAL_METRICS: [&str; 4] = ["totalUsers", "screenPageViews", "sessions", "userEngagementDuration"];
const TRANSACTION_DIMENSIONS: [&str; 3] = ["eventName", "dateHour", "transactionId"];
const TRANSACTION_METRICS: [&str; 2] = ["eventCount", "totalRevenue"];

/// Optional parts of a custom report request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub dimension_filter: Option<FilterNode>,
    pub metric_filter: Option<FilterNode>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReportOptions {
    /// Reads options from a nested definition with the keys
    /// `dimensionFilter`, `metricFilter`, `orderBy`, `limit` and `offset`.
    ///
    /// `orderBy` entries look like `{"metric": "sessions"}` or
    /// `{"dimension": "date", "direction": "desc"}`.
    pub fn from_definition(definition: &Value) -> Result<Self, FilterError> {
        let object = definition.as_object().ok_or(FilterError::NotAnObject)?;

        let dimension_filter = object
            .get("dimensionFilter")
            .map(FilterNode::from_definition)
            .transpose()?;
        let metric_filter = object
            .get("metricFilter")
            .map(FilterNode::from_definition)
            .transpose()?;

        let order_by = match object.get("orderBy") {
            None => Vec::new(),
            Some(entries) => entries
                .as_array()
                .ok_or_else(|| FilterError::InvalidGroup("orderBy".to_string()))?
                .iter()
                .map(order_by_from_definition)
                .collect::<Result<_, _>>()?,
        };

        Ok(ReportOptions {
            dimension_filter,
            metric_filter,
            order_by,
            limit: object.get("limit").and_then(Value::as_i64),
            offset: object.get("offset").and_then(Value::as_i64),
        })
    }
}

fn order_by_from_definition(entry: &Value) -> Result<OrderBy, FilterError> {
    let direction = match entry.get("direction").and_then(Value::as_str) {
        Some(raw) if raw.eq_ignore_ascii_case("asc") => Some(Direction::Asc),
        Some(raw) if raw.eq_ignore_ascii_case("desc") => Some(Direction::Desc),
        Some(raw) => return Err(FilterError::InvalidOrderBy(format!("unknown direction \"{}\"", raw))),
        None => None,
    };

    if let Some(name) = entry.get("metric").and_then(Value::as_str) {
        return Ok(OrderBy::metric_with(name, direction.unwrap_or(Direction::Desc)));
    }
    if let Some(name) = entry.get("dimension").and_then(Value::as_str) {
        return Ok(OrderBy::dimension_with(name, direction.unwrap_or(Direction::Asc)));
    }
    Err(FilterError::InvalidOrderBy(
        "expected a \"metric\" or \"dimension\" name".to_string(),
    ))
}

/// Fields hashed into the custom report cache key. Field order is fixed by
/// the struct, so the serialised form is stable.
#[derive(Serialize)]
struct CustomReportKey<'a> {
    dimensions: &'a [String],
    metrics: &'a [String],
    period: PeriodKey,
    options: &'a ReportOptions,
}

#[derive(Serialize)]
struct PeriodKey {
    start: String,
    end: String,
}

fn custom_report_key(
    dimensions: &[String],
    metrics: &[String],
    period: &Period,
    options: &ReportOptions,
) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(&CustomReportKey {
        dimensions,
        metrics,
        period: PeriodKey {
            start: period.start_key(),
            end: period.end_key(),
        },
        options,
    })?;
    Ok(format!("custom_report_{}", hex::encode(Sha256::digest(&canonical))))
}

/// Read-only view of a client's settings for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub name: String,
    pub property_id: String,
    pub cache_enabled: bool,
    pub cache_lifetime_minutes: u64,
    pub proxy_enabled: bool,
}

impl ClientSummary {
    pub(crate) fn new(name: &str, config: &ClientConfig, cache: &AnalyticsCache) -> Self {
        ClientSummary {
            name: name.to_string(),
            property_id: config.property_id.clone(),
            cache_enabled: cache.is_enabled(),
            cache_lifetime_minutes: cache.lifetime().as_secs() / 60,
            proxy_enabled: config.has_proxy(),
        }
    }
}

/// Data API client for one configured property.
pub struct AnalyticsClient {
    name: String,
    config: ClientConfig,
    cache: Arc<AnalyticsCache>,
    processor: ReportProcessor,
    factory: Arc<dyn ApiFactory>,
    api: OnceCell<Arc<dyn AnalyticsDataApi>>,
}

impl std::fmt::Debug for AnalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsClient")
            .field("name", &self.name)
            .field("property_id", &self.config.property_id)
            .field("cache", &self.cache)
            .finish()
    }
}

impl AnalyticsClient {
    /// The API handle is created by `factory` on first use, not here.
    pub fn new(
        name: impl Into<String>,
        config: ClientConfig,
        cache: Arc<AnalyticsCache>,
        factory: Arc<dyn ApiFactory>,
    ) -> Self {
        AnalyticsClient {
            name: name.into(),
            config,
            cache,
            processor: ReportProcessor::new(),
            factory,
            api: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_id(&self) -> &str {
        &self.config.property_id
    }

    pub fn cache(&self) -> &AnalyticsCache {
        &self.cache
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary::new(&self.name, &self.config, &self.cache)
    }

    /// Pages by views with users, engagement time and average engagement.
    pub async fn get_most_viewed_pages(
        &self,
        period: Option<Period>,
        limit: u32,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        const MESSAGE: &str = "Failed to get most viewed pages";
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("most_viewed_pages_{}_{}_{}", period.start_key(), period.end_key(), limit);

        let report = self
            .cache
            .get(&key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(&["pagePath", "pageTitle"])
                    .with_metrics(&["screenPageViews", "totalUsers", "userEngagementDuration"]);
                request.order_bys = vec![OrderBy::metric("screenPageViews").to_wire()];
                request.limit = Some(i64::from(limit));

                let response = self.fetch(&request).await.map_err(|e| self.fail(MESSAGE, e))?;
                self.processor
                    .process_most_viewed_pages_report(&response)
                    .map_err(|e| self.fail(MESSAGE, e))
            })
            .await?;

        Ok(report.into_rows())
    }

    /// Landing pages by sessions.
    pub async fn get_top_landing_pages(
        &self,
        period: Option<Period>,
        limit: u32,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("top_landing_pages_{}_{}_{}", period.start_key(), period.end_key(), limit);
        self.ranked_pages(
            &key,
            "Failed to get top landing pages",
            period,
            ["landingPage", "pageTitle"],
            ["sessions", "totalUsers", "bounceRate"],
            "sessions",
            limit,
        )
        .await
    }

    /// Exit pages by exits.
    pub async fn get_top_exit_pages(
        &self,
        period: Option<Period>,
        limit: u32,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("top_exit_pages_{}_{}_{}", period.start_key(), period.end_key(), limit);
        self.ranked_pages(
            &key,
            "Failed to get top exit pages",
            period,
            ["exitPage", "pageTitle"],
            ["sessions", "exits", "exitRate"],
            "exits",
            limit,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn ranked_pages(
        &self,
        key: &str,
        message: &'static str,
        period: Period,
        dimensions: [&str; 2],
        metrics: [&str; 3],
        rank_by: &str,
        limit: u32,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        let report = self
            .cache
            .get(key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(&dimensions)
                    .with_metrics(&metrics);
                request.order_bys = vec![OrderBy::metric(rank_by).to_wire()];
                request.limit = Some(i64::from(limit));

                let response = self.fetch(&request).await.map_err(|e| self.fail(message, e))?;
                self.processor
                    .process_report(&response)
                    .map_err(|e| self.fail(message, e))
            })
            .await?;

        Ok(report.into_rows())
    }

    /// Users, views and sessions split by `dimension`. Rows come in
    /// chronological order when the dimension is `date`.
    pub async fn get_visitors_and_page_views(
        &self,
        period: Option<Period>,
        dimension: &str,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        const MESSAGE: &str = "Failed to get visitors and page views";
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("visitors_pageviews_{}_{}_{}", period.start_key(), period.end_key(), dimension);

        let report = self
            .cache
            .get(&key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(&[dimension])
                    .with_metrics(&["totalUsers", "screenPageViews", "sessions"]);
                if dimension == "date" {
                    request.order_bys = vec![OrderBy::dimension("date").to_wire()];
                }

                let response = self.fetch(&request).await.map_err(|e| self.fail(MESSAGE, e))?;
                self.processor
                    .process_report(&response)
                    .map_err(|e| self.fail(MESSAGE, e))
            })
            .await?;

        Ok(report.into_rows())
    }

    /// Totals for the period as a single row; zeros when there is no data.
    pub async fn get_total_visitors_and_page_views(
        &self,
        period: Option<Period>,
    ) -> Result<ReportRow, AnalyticsError> {
        const MESSAGE: &str = "Failed to get total visitors and page views";
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("total_visitors_pageviews_{}_{}", period.start_key(), period.end_key());

        let report = self
            .cache
            .get(&key, || async move {
                let request = self.base_request(&period).with_metrics(&TOTAL_METRICS);

                let response = self.fetch(&request).await.map_err(|e| self.fail(MESSAGE, e))?;
                let report = self
                    .processor
                    .process_report(&response)
                    .map_err(|e| self.fail(MESSAGE, e))?;

                if report.has_rows() {
                    return Ok::<_, AnalyticsError>(report);
                }
                let metrics = TOTAL_METRICS.iter().map(|name| name.to_string()).collect();
                Ok(AnalyticsReport::new(Vec::new(), metrics, vec![zero_totals()]))
            })
            .await?;

        Ok(report.first_row().cloned().unwrap_or_else(zero_totals))
    }

    /// Purchase events in the period with canonical `transactionId` and
    /// `transactionRevenue` fields.
    pub async fn get_transactions(&self, period: Option<Period>) -> Result<Vec<ReportRow>, AnalyticsError> {
        const MESSAGE: &str = "Failed to fetch GA transactions";
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let key = format!("transactions_{}_{}", period.start_key(), period.end_key());

        let report = self
            .cache
            .get(&key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(&TRANSACTION_DIMENSIONS)
                    .with_metrics(&TRANSACTION_METRICS);
                request.dimension_filter = Some(FilterNode::exact("eventName", "purchase").to_expression());

                let response = self.fetch(&request).await.map_err(|e| self.fail(MESSAGE, e))?;
                self.processor
                    .process_transactions_report(&response)
                    .map_err(|e| self.fail(MESSAGE, e))
            })
            .await?;

        Ok(report.into_rows())
    }

    /// Whether a purchase with `transaction_id` was recorded in the period
    /// (last 180 days by default).
    ///
    /// Lookup failures are logged and reported as `false`; they are not
    /// cached.
    pub async fn is_transaction_in_analytics(&self, transaction_id: &str, period: Option<Period>) -> bool {
        let period = period.unwrap_or_else(|| Period::days(TRANSACTION_LOOKUP_DAYS));
        let key = format!("transaction_{}_{}_{}", transaction_id, period.start_key(), period.end_key());

        let lookup = self
            .cache
            .get(&key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(&TRANSACTION_DIMENSIONS)
                    .with_metrics(&TRANSACTION_METRICS);
                request.dimension_filter = Some(
                    FilterNode::and(vec![
                        FilterNode::exact("transactionId", transaction_id),
                        FilterNode::exact("eventName", "purchase"),
                    ])
                    .to_expression(),
                );

                let response = self.fetch(&request).await?;
                Ok::<bool, TransportError>(response.row_count > 0 || !response.rows.is_empty())
            })
            .await;

        match lookup {
            Ok(found) => found,
            Err(e) => {
                error!(
                    property_id = %self.config.property_id,
                    transaction_id = %transaction_id,
                    error = %e,
                    "GA transaction check failed"
                );
                false
            }
        }
    }

    /// Runs an arbitrary report.
    ///
    /// The cache key is a SHA-256 digest of the dimensions, metrics, period
    /// and options.
    pub async fn run_report<S: AsRef<str>>(
        &self,
        dimensions: &[S],
        metrics: &[S],
        period: Option<Period>,
        options: &ReportOptions,
    ) -> Result<Vec<ReportRow>, AnalyticsError> {
        const MESSAGE: &str = "Failed to run custom report";
        let period = period.unwrap_or_else(|| Period::days(DEFAULT_PERIOD_DAYS));
        let dimensions: Vec<String> = dimensions.iter().map(|name| name.as_ref().to_string()).collect();
        let metrics: Vec<String> = metrics.iter().map(|name| name.as_ref().to_string()).collect();

        let key = custom_report_key(&dimensions, &metrics, &period, options)
            .map_err(|e| self.fail(MESSAGE, e))?;
        debug!(key = %key, ?dimensions, ?metrics, "Running custom report");

        let (dimensions, metrics) = (&dimensions, &metrics);
        let report = self
            .cache
            .get(&key, || async move {
                let mut request = self
                    .base_request(&period)
                    .with_dimensions(dimensions)
                    .with_metrics(metrics);
                request.dimension_filter = options.dimension_filter.as_ref().map(FilterNode::to_expression);
                request.metric_filter = options.metric_filter.as_ref().map(FilterNode::to_expression);
                request.order_bys = options.order_by.iter().map(OrderBy::to_wire).collect();
                request.limit = options.limit;
                request.offset = options.offset;

                let response = self.fetch(&request).await.map_err(|e| self.fail(MESSAGE, e))?;
                self.processor
                    .process_report(&response)
                    .map_err(|e| self.fail(MESSAGE, e))
            })
            .await?;

        Ok(report.into_rows())
    }

    fn base_request(&self, period: &Period) -> RunReportRequest {
        let mut request = RunReportRequest::for_property(&self.config.property_id);
        request.date_ranges = vec![period.to_range()];
        request
    }

    async fn data_api(&self) -> Result<&Arc<dyn AnalyticsDataApi>, TransportError> {
        self.api
            .get_or_try_init(|| async move { self.factory.create_data_api(&self.config) })
            .await
    }

    async fn fetch(&self, request: &RunReportRequest) -> Result<RunReportResponse, TransportError> {
        self.data_api().await?.run_report(request).await
    }

    fn fail(&self, message: &str, source: impl Into<BoxError>) -> AnalyticsError {
        let source = source.into();
        error!(
            property_id = %self.config.property_id,
            client = %self.name,
            error = %source,
            "{}",
            message
        );
        AnalyticsError::report(message, &self.config.property_id, source)
    }
}

fn zero_totals() -> ReportRow {
    TOTAL_METRICS
        .iter()
        .map(|name| (name.to_string(), ReportValue::Integer(0)))
        .collect()
}
