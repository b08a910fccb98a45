//! In-process fakes of the remote APIs.

use crate::api::admin::{CustomDimensionResource, CustomMetricResource};
use crate::api::data::{CellValue, DimensionHeader, MetricHeader, Row, RunReportRequest, RunReportResponse};
use crate::api::{AdminApi, AnalyticsDataApi, ApiFactory};
use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn report_response(
    dimensions: &[&str],
    metrics: &[(&str, &str)],
    rows: Vec<(Vec<&str>, Vec<&str>)>,
) -> RunReportResponse {
    RunReportResponse {
        dimension_headers: dimensions
            .iter()
            .map(|name| DimensionHeader {
                name: name.to_string(),
            })
            .collect(),
        metric_headers: metrics
            .iter()
            .map(|(name, tag)| MetricHeader {
                name: name.to_string(),
                metric_type: tag.to_string(),
            })
            .collect(),
        row_count: rows.len() as i64,
        rows: rows
            .into_iter()
            .map(|(dims, mets)| Row {
                dimension_values: dims.into_iter().map(CellValue::new).collect(),
                metric_values: mets.into_iter().map(CellValue::new).collect(),
            })
            .collect(),
    }
}

/// Answers every report with one canned response, or fails every call.
pub struct FakeDataApi {
    response: Option<RunReportResponse>,
    requests: Mutex<Vec<RunReportRequest>>,
}

impl FakeDataApi {
    pub fn returning(response: RunReportResponse) -> Arc<Self> {
        Arc::new(FakeDataApi {
            response: Some(response),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(FakeDataApi {
            response: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<RunReportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl AnalyticsDataApi for FakeDataApi {
    async fn run_report(&self, request: &RunReportRequest) -> Result<RunReportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.response.clone().ok_or_else(|| TransportError::Api {
            status: 503,
            message: "The service is currently unavailable.".to_string(),
        })
    }
}

/// Keeps custom dimensions in memory the way the Admin API would.
#[derive(Default)]
pub struct FakeAdminApi {
    dimensions: Mutex<Vec<CustomDimensionResource>>,
    metrics: Mutex<Vec<CustomMetricResource>>,
    rejected: Mutex<HashSet<String>>,
    updates: Mutex<Vec<(CustomDimensionResource, Vec<String>)>>,
    list_calls: AtomicUsize,
    created: AtomicUsize,
    list_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAdminApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Existing dimension named `properties/123/customDimensions/{n}`.
    pub fn with_dimension(self: Arc<Self>, parameter_name: &str, scope: &str) -> Arc<Self> {
        {
            let mut dimensions = self.dimensions.lock().unwrap();
            let index = dimensions.len() + 1;
            dimensions.push(CustomDimensionResource {
                name: format!("properties/123/customDimensions/{}", index),
                parameter_name: parameter_name.to_string(),
                display_name: parameter_name.replace('_', " "),
                description: String::new(),
                scope: scope.to_string(),
                disallow_ads_personalization: false,
            });
        }
        self
    }

    pub fn with_metric(self: Arc<Self>, parameter_name: &str) -> Arc<Self> {
        self.metrics.lock().unwrap().push(CustomMetricResource {
            name: format!("properties/123/customMetrics/{}", parameter_name),
            parameter_name: parameter_name.to_string(),
            display_name: parameter_name.to_string(),
            description: String::new(),
            measurement_unit: "STANDARD".to_string(),
            scope: "EVENT".to_string(),
        });
        self
    }

    /// The next list call snapshots the dimensions, then waits for the
    /// returned gate before answering.
    pub fn pause_next_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Makes create calls for `parameter_name` fail.
    pub fn reject(&self, parameter_name: &str) {
        self.rejected.lock().unwrap().insert(parameter_name.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<(CustomDimensionResource, Vec<String>)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.dimensions
            .lock()
            .unwrap()
            .iter()
            .map(|dimension| dimension.parameter_name.clone())
            .collect()
    }
}

#[async_trait]
impl AdminApi for FakeAdminApi {
    async fn list_custom_dimensions(&self, _parent: &str) -> Result<Vec<CustomDimensionResource>, TransportError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.dimensions.lock().unwrap().clone();
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(snapshot)
    }

    async fn create_custom_dimension(
        &self,
        parent: &str,
        dimension: &CustomDimensionResource,
    ) -> Result<CustomDimensionResource, TransportError> {
        if self.rejected.lock().unwrap().contains(&dimension.parameter_name) {
            return Err(TransportError::Api {
                status: 400,
                message: format!("Invalid parameter name {}", dimension.parameter_name),
            });
        }

        let mut dimensions = self.dimensions.lock().unwrap();
        let mut created = dimension.clone();
        created.name = format!("{}/customDimensions/{}", parent, dimensions.len() + 1);
        dimensions.push(created.clone());
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn update_custom_dimension(
        &self,
        dimension: &CustomDimensionResource,
        update_mask: &[String],
    ) -> Result<CustomDimensionResource, TransportError> {
        self.updates
            .lock()
            .unwrap()
            .push((dimension.clone(), update_mask.to_vec()));

        let mut dimensions = self.dimensions.lock().unwrap();
        let existing = dimensions
            .iter_mut()
            .find(|existing| existing.name == dimension.name)
            .ok_or_else(|| TransportError::Api {
                status: 404,
                message: "Requested entity was not found.".to_string(),
            })?;
        for field in update_mask {
            match field.as_str() {
                "display_name" => existing.display_name = dimension.display_name.clone(),
                "description" => existing.description = dimension.description.clone(),
                _ => {}
            }
        }
        Ok(existing.clone())
    }

    async fn archive_custom_dimension(&self, name: &str) -> Result<(), TransportError> {
        self.dimensions.lock().unwrap().retain(|dimension| dimension.name != name);
        Ok(())
    }

    async fn list_custom_metrics(&self, _parent: &str) -> Result<Vec<CustomMetricResource>, TransportError> {
        Ok(self.metrics.lock().unwrap().clone())
    }
}

/// Hands out the fakes and counts how often handles are created.
#[derive(Default)]
pub struct FakeFactory {
    data: Option<Arc<FakeDataApi>>,
    admin: Option<Arc<FakeAdminApi>>,
    data_creations: AtomicUsize,
    admin_creations: AtomicUsize,
}

impl FakeFactory {
    pub fn with_data(data: Arc<FakeDataApi>) -> Self {
        FakeFactory {
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_admin(admin: Arc<FakeAdminApi>) -> Self {
        FakeFactory {
            admin: Some(admin),
            ..Default::default()
        }
    }

    pub fn data_creations(&self) -> usize {
        self.data_creations.load(Ordering::SeqCst)
    }

    pub fn admin_creations(&self) -> usize {
        self.admin_creations.load(Ordering::SeqCst)
    }
}

fn not_configured(config: &ClientConfig) -> TransportError {
    TransportError::Auth(format!("no fake API for property {}", config.property_id))
}

impl ApiFactory for FakeFactory {
    fn create_data_api(&self, config: &ClientConfig) -> Result<Arc<dyn AnalyticsDataApi>, TransportError> {
        self.data_creations.fetch_add(1, Ordering::SeqCst);
        let data = self.data.clone().ok_or_else(|| not_configured(config))?;
        Ok(data)
    }

    fn create_admin_api(&self, config: &ClientConfig) -> Result<Arc<dyn AdminApi>, TransportError> {
        self.admin_creations.fetch_add(1, Ordering::SeqCst);
        let admin = self.admin.clone().ok_or_else(|| not_configured(config))?;
        Ok(admin)
    }
}
