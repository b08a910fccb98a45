//! Custom dimension lifecycle on the Admin API.
//!
//! Existence checks go through an in-process index (parameter name to
//! record) built lazily from [`AdminClient::list_custom_dimensions`] and
//! dropped on every mutation. The index may briefly lag behind the remote
//! property; `list_custom_dimensions` is the authoritative view.

use crate::api::admin::{CustomDimensionResource, CustomMetricResource};
use crate::api::{AdminApi, ApiFactory};
use crate::analytics_client::ClientSummary;
use crate::cache::AnalyticsCache;
use crate::config::ClientConfig;
use crate::dimension::{CustomDimension, DimensionScope};
use crate::error::{AdminApiError, BoxError, TransportError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info, warn};

/// A custom dimension as it exists on the property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDimensionRecord {
    /// `properties/{id}/customDimensions/{n}`
    pub name: String,
    pub parameter_name: String,
    pub display_name: String,
    pub description: Option<String>,
    /// `EVENT`, `USER`, `ITEM`, or `UNKNOWN` for anything else
    pub scope: String,
    pub disallow_ads_personalization: bool,
}

impl From<CustomDimensionResource> for CustomDimensionRecord {
    fn from(resource: CustomDimensionResource) -> Self {
        let scope = if DimensionScope::is_valid(&resource.scope) {
            resource.scope
        } else {
            "UNKNOWN".to_string()
        };
        CustomDimensionRecord {
            name: resource.name,
            parameter_name: resource.parameter_name,
            display_name: resource.display_name,
            description: Some(resource.description).filter(|text| !text.is_empty()),
            scope,
            disallow_ads_personalization: resource.disallow_ads_personalization,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomMetricRecord {
    pub name: String,
    pub parameter_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub measurement_unit: String,
    pub scope: String,
}

impl From<CustomMetricResource> for CustomMetricRecord {
    fn from(resource: CustomMetricResource) -> Self {
        CustomMetricRecord {
            name: resource.name,
            parameter_name: resource.parameter_name,
            display_name: resource.display_name,
            description: Some(resource.description).filter(|text| !text.is_empty()),
            measurement_unit: resource.measurement_unit,
            // custom metrics are always event-scoped
            scope: DimensionScope::Event.as_str().to_string(),
        }
    }
}

/// Result of [`AdminClient::create_custom_dimension_if_not_exists`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub created: bool,
    pub dimension: CustomDimensionRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDimension {
    pub parameter_name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedDimension {
    pub parameter_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDimension {
    pub parameter_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub created: Vec<CreatedDimension>,
    pub skipped: Vec<SkippedDimension>,
    pub failed: Vec<FailedDimension>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub created: Vec<String>,
    pub existing: Vec<String>,
    pub failed: Vec<FailedDimension>,
}

/// Result of [`AdminClient::validate_custom_dimension`]. `valid` means the
/// definition passes the field rules and does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub exists: bool,
}

type DimensionIndex = Arc<HashMap<String, CustomDimensionRecord>>;

/// Admin API client for one configured property.
pub struct AdminClient {
    name: String,
    config: ClientConfig,
    cache: Arc<AnalyticsCache>,
    factory: Arc<dyn ApiFactory>,
    api: OnceCell<Arc<dyn AdminApi>>,
    index: RwLock<Option<DimensionIndex>>,
    /// Bumped by every mutation; a listing started under an older value is
    /// not kept.
    generation: AtomicU64,
}

impl std::fmt::Debug for AdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminClient")
            .field("name", &self.name)
            .field("property_id", &self.config.property_id)
            .finish()
    }
}

impl AdminClient {
    pub fn new(
        name: impl Into<String>,
        config: ClientConfig,
        cache: Arc<AnalyticsCache>,
        factory: Arc<dyn ApiFactory>,
    ) -> Self {
        AdminClient {
            name: name.into(),
            config,
            cache,
            factory,
            api: OnceCell::new(),
            index: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_id(&self) -> &str {
        &self.config.property_id
    }

    pub fn summary(&self) -> ClientSummary {
        ClientSummary::new(&self.name, &self.config, &self.cache)
    }

    fn property_path(&self) -> String {
        format!("properties/{}", self.config.property_id)
    }

    fn dimensions_cache_key(&self) -> String {
        format!("admin_custom_dimensions_{}", self.config.property_id)
    }

    /// Every custom dimension on the property (cached).
    pub async fn list_custom_dimensions(&self) -> Result<Vec<CustomDimensionRecord>, AdminApiError> {
        const MESSAGE: &str = "Failed to list custom dimensions";
        let key = self.dimensions_cache_key();
        let generation = self.generation.load(Ordering::SeqCst);

        let dimensions = self
            .cache
            .get(&key, || async move {
                let api = self.admin_api().await.map_err(|e| self.fail(MESSAGE, e))?;
                let dimensions = api
                    .list_custom_dimensions(&self.property_path())
                    .await
                    .map_err(|e| self.fail(MESSAGE, e))?;
                Ok(dimensions.into_iter().map(CustomDimensionRecord::from).collect())
            })
            .await?;

        if self.generation.load(Ordering::SeqCst) != generation {
            // a mutation finished while listing; the stored list may predate it
            self.forget_cached_dimensions();
        }
        Ok(dimensions)
    }

    pub async fn get_custom_dimension(
        &self,
        parameter_name: &str,
    ) -> Result<Option<CustomDimensionRecord>, AdminApiError> {
        Ok(self.dimensions_indexed().await?.get(parameter_name).cloned())
    }

    pub async fn custom_dimension_exists(&self, parameter_name: &str) -> Result<bool, AdminApiError> {
        Ok(self.dimensions_indexed().await?.contains_key(parameter_name))
    }

    /// Creates the dimension on the property.
    ///
    /// # Errors
    /// `DimensionAlreadyExists` when the parameter name is already in use,
    /// `Call` when the remote call fails.
    pub async fn create_custom_dimension(
        &self,
        dimension: &CustomDimension,
    ) -> Result<CustomDimensionRecord, AdminApiError> {
        let parameter_name = dimension.parameter_name();
        if self.custom_dimension_exists(parameter_name).await? {
            return Err(AdminApiError::DimensionAlreadyExists {
                parameter_name: parameter_name.to_string(),
                property_id: Some(self.config.property_id.clone()),
            });
        }

        let message = format!("Failed to create custom dimension \"{}\"", parameter_name);
        let api = self.admin_api().await.map_err(|e| self.fail(&message, e))?;
        let created = api
            .create_custom_dimension(&self.property_path(), &dimension.to_resource())
            .await
            .map_err(|e| self.fail(&message, e))?;

        self.invalidate_dimensions().await;

        info!(
            parameter_name = %parameter_name,
            display_name = %dimension.display_name(),
            scope = %dimension.scope(),
            property_id = %self.config.property_id,
            "Created custom dimension"
        );

        Ok(created.into())
    }

    pub async fn create_custom_dimension_if_not_exists(
        &self,
        dimension: &CustomDimension,
    ) -> Result<CreateOutcome, AdminApiError> {
        if let Some(existing) = self.get_custom_dimension(dimension.parameter_name()).await? {
            return Ok(CreateOutcome {
                created: false,
                dimension: existing,
            });
        }

        Ok(CreateOutcome {
            created: true,
            dimension: self.create_custom_dimension(dimension).await?,
        })
    }

    /// Creates every dimension not present yet. A failing item is recorded
    /// and the rest of the batch continues.
    pub async fn create_custom_dimensions_batch(
        &self,
        dimensions: &[CustomDimension],
    ) -> Result<BatchResult, AdminApiError> {
        let existing = self.dimensions_indexed().await?;
        let mut result = BatchResult::default();

        for dimension in dimensions {
            let parameter_name = dimension.parameter_name().to_string();

            if existing.contains_key(&parameter_name) {
                result.skipped.push(SkippedDimension {
                    parameter_name,
                    reason: "Already exists".to_string(),
                });
                continue;
            }

            match self.create_custom_dimension(dimension).await {
                Ok(_) => result.created.push(CreatedDimension {
                    parameter_name,
                    display_name: dimension.display_name().to_string(),
                }),
                Err(e) => result.failed.push(FailedDimension {
                    parameter_name,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            created = result.created.len(),
            skipped = result.skipped.len(),
            failed = result.failed.len(),
            property_id = %self.config.property_id,
            "Batch dimension creation completed"
        );

        Ok(result)
    }

    /// Updates the display name and/or description. Parameter name and scope
    /// cannot change. With neither field given, returns the existing record
    /// without calling the API.
    pub async fn update_custom_dimension(
        &self,
        parameter_name: &str,
        display_name: Option<&str>,
        description: Option<&str>,
    ) -> Result<CustomDimensionRecord, AdminApiError> {
        let existing = self.require_dimension(parameter_name).await?;

        let mut update = CustomDimensionResource {
            name: existing.name.clone(),
            ..Default::default()
        };
        let mut update_mask = Vec::new();
        if let Some(display_name) = display_name {
            update.display_name = display_name.to_string();
            update_mask.push("display_name".to_string());
        }
        if let Some(description) = description {
            update.description = description.to_string();
            update_mask.push("description".to_string());
        }
        if update_mask.is_empty() {
            return Ok(existing);
        }

        let message = format!("Failed to update custom dimension \"{}\"", parameter_name);
        let api = self.admin_api().await.map_err(|e| self.fail(&message, e))?;
        let updated = api
            .update_custom_dimension(&update, &update_mask)
            .await
            .map_err(|e| self.fail(&message, e))?;

        self.invalidate_dimensions().await;

        info!(
            parameter_name = %parameter_name,
            updated_fields = ?update_mask,
            property_id = %self.config.property_id,
            "Updated custom dimension"
        );

        Ok(updated.into())
    }

    /// Archives the dimension. Archived dimensions stop collecting data and
    /// cannot be restored through this client.
    pub async fn archive_custom_dimension(&self, parameter_name: &str) -> Result<(), AdminApiError> {
        let existing = self.require_dimension(parameter_name).await?;

        let message = format!("Failed to archive custom dimension \"{}\"", parameter_name);
        let api = self.admin_api().await.map_err(|e| self.fail(&message, e))?;
        api.archive_custom_dimension(&existing.name)
            .await
            .map_err(|e| self.fail(&message, e))?;

        self.invalidate_dimensions().await;

        info!(
            parameter_name = %parameter_name,
            property_id = %self.config.property_id,
            "Archived custom dimension"
        );
        Ok(())
    }

    /// Checks a definition against the field rules and the property without
    /// changing anything.
    pub async fn validate_custom_dimension(
        &self,
        dimension: &CustomDimension,
    ) -> Result<DimensionValidation, AdminApiError> {
        let errors = CustomDimension::validate(
            dimension.parameter_name(),
            dimension.display_name(),
            dimension.description(),
        );
        let exists = self.custom_dimension_exists(dimension.parameter_name()).await?;

        Ok(DimensionValidation {
            valid: errors.is_empty() && !exists,
            errors,
            exists,
        })
    }

    /// Creates the definitions missing from the property and reports the
    /// ones already there.
    pub async fn sync_custom_dimensions(
        &self,
        definitions: &[CustomDimension],
    ) -> Result<SyncResult, AdminApiError> {
        let existing = self.dimensions_indexed().await?;
        let mut result = SyncResult::default();

        for definition in definitions {
            let parameter_name = definition.parameter_name().to_string();

            if existing.contains_key(&parameter_name) {
                result.existing.push(parameter_name);
                continue;
            }

            match self.create_custom_dimension(definition).await {
                Ok(_) => result.created.push(parameter_name),
                Err(e) => result.failed.push(FailedDimension {
                    parameter_name,
                    error: e.to_string(),
                }),
            }
        }

        info!(
            created = result.created.len(),
            existing = result.existing.len(),
            failed = result.failed.len(),
            property_id = %self.config.property_id,
            "Dimension sync completed"
        );

        Ok(result)
    }

    /// The definitions whose parameter name is not on the property.
    pub async fn find_missing_dimensions(
        &self,
        definitions: &[CustomDimension],
    ) -> Result<Vec<CustomDimension>, AdminApiError> {
        let existing = self.dimensions_indexed().await?;
        Ok(definitions
            .iter()
            .filter(|definition| !existing.contains_key(definition.parameter_name()))
            .cloned()
            .collect())
    }

    /// Every custom metric on the property (cached).
    pub async fn list_custom_metrics(&self) -> Result<Vec<CustomMetricRecord>, AdminApiError> {
        const MESSAGE: &str = "Failed to list custom metrics";
        let key = format!("admin_custom_metrics_{}", self.config.property_id);

        self.cache
            .get(&key, || async move {
                let api = self.admin_api().await.map_err(|e| self.fail(MESSAGE, e))?;
                let metrics = api
                    .list_custom_metrics(&self.property_path())
                    .await
                    .map_err(|e| self.fail(MESSAGE, e))?;
                Ok(metrics.into_iter().map(CustomMetricRecord::from).collect())
            })
            .await
    }

    async fn require_dimension(&self, parameter_name: &str) -> Result<CustomDimensionRecord, AdminApiError> {
        self.get_custom_dimension(parameter_name)
            .await?
            .ok_or_else(|| AdminApiError::DimensionNotFound {
                parameter_name: parameter_name.to_string(),
                property_id: Some(self.config.property_id.clone()),
            })
    }

    async fn dimensions_indexed(&self) -> Result<DimensionIndex, AdminApiError> {
        if let Some(index) = self.index.read().await.as_ref() {
            return Ok(Arc::clone(index));
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let index: DimensionIndex = Arc::new(
            self.list_custom_dimensions()
                .await?
                .into_iter()
                .map(|dimension| (dimension.parameter_name.clone(), dimension))
                .collect(),
        );

        let mut slot = self.index.write().await;
        if self.generation.load(Ordering::SeqCst) == generation {
            *slot = Some(Arc::clone(&index));
        }
        Ok(index)
    }

    async fn invalidate_dimensions(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.index.write().await = None;
        self.forget_cached_dimensions();
    }

    fn forget_cached_dimensions(&self) {
        if let Err(e) = self.cache.delete(&self.dimensions_cache_key()) {
            warn!(
                property_id = %self.config.property_id,
                error = %e,
                "Failed to invalidate cached custom dimensions"
            );
        }
    }

    async fn admin_api(&self) -> Result<&Arc<dyn AdminApi>, TransportError> {
        self.api
            .get_or_try_init(|| async move { self.factory.create_admin_api(&self.config) })
            .await
    }

    fn fail(&self, message: &str, source: impl Into<BoxError>) -> AdminApiError {
        let source = source.into();
        error!(
            property_id = %self.config.property_id,
            client = %self.name,
            error = %source,
            "{}",
            message
        );
        AdminApiError::call(message, &self.config.property_id, source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAdminApi, FakeFactory};

    fn client(api: Arc<FakeAdminApi>) -> AdminClient {
        AdminClient::new(
            "main",
            ClientConfig::new("123", "credentials.json"),
            Arc::new(AnalyticsCache::in_memory("ga4_analytics_data.main")),
            Arc::new(FakeFactory::with_admin(api)),
        )
    }

    fn dimension(parameter_name: &str) -> CustomDimension {
        CustomDimension::event(parameter_name, parameter_name.to_uppercase()).unwrap()
    }

    #[tokio::test]
    async fn test_list_is_cached_and_normalised() {
        let api = FakeAdminApi::new()
            .with_dimension("button_name", "EVENT")
            .with_dimension("legacy", "DIMENSION_SCOPE_UNSPECIFIED");
        let client = client(api.clone());

        let dimensions = client.list_custom_dimensions().await.unwrap();
        client.list_custom_dimensions().await.unwrap();
        assert_eq!(api.list_calls(), 1);

        assert_eq!(dimensions.len(), 2);
        assert_eq!(dimensions[0].scope, "EVENT");
        assert_eq!(dimensions[0].description, None);
        assert_eq!(dimensions[1].scope, "UNKNOWN");
    }

    #[tokio::test]
    async fn test_create_rejects_existing_parameter_name() {
        let client = client(FakeAdminApi::new().with_dimension("button_name", "EVENT"));

        let err = client.create_custom_dimension(&dimension("button_name")).await.unwrap_err();
        assert!(matches!(err, AdminApiError::DimensionAlreadyExists { .. }));
        assert_eq!(err.parameter_name(), Some("button_name"));
        assert_eq!(err.property_id(), Some("123"));
    }

    #[tokio::test]
    async fn test_create_invalidates_index() {
        let api = FakeAdminApi::new();
        let client = client(api.clone());

        assert!(!client.custom_dimension_exists("page_section").await.unwrap());
        let created = client.create_custom_dimension(&dimension("page_section")).await.unwrap();
        assert_eq!(created.name, "properties/123/customDimensions/1");

        assert!(client.custom_dimension_exists("page_section").await.unwrap());
        assert_eq!(api.list_calls(), 2);
    }

    #[tokio::test]
    async fn test_create_if_not_exists_is_idempotent() {
        let api = FakeAdminApi::new();
        let client = client(api.clone());

        let first = client
            .create_custom_dimension_if_not_exists(&dimension("video_title"))
            .await
            .unwrap();
        let second = client
            .create_custom_dimension_if_not_exists(&dimension("video_title"))
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.dimension, second.dimension);
        assert_eq!(api.created(), 1);
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let api = FakeAdminApi::new().with_dimension("existing", "EVENT");
        api.reject("broken");
        let client = client(api.clone());

        let result = client
            .create_custom_dimensions_batch(&[dimension("existing"), dimension("broken"), dimension("fresh")])
            .await
            .unwrap();

        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].reason, "Already exists");
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].parameter_name, "broken");
        assert!(result.failed[0].error.contains("Failed to create custom dimension \"broken\""));
        assert_eq!(result.created.len(), 1);
        assert_eq!(result.created[0].display_name, "FRESH");
        assert_eq!(api.parameter_names(), vec!["existing", "fresh"]);
    }

    #[tokio::test]
    async fn test_update_touches_only_given_fields() {
        let api = FakeAdminApi::new().with_dimension("button_name", "EVENT");
        let client = client(api.clone());

        let unchanged = client.update_custom_dimension("button_name", None, None).await.unwrap();
        assert_eq!(unchanged.display_name, "button name");
        assert!(api.updates().is_empty());

        let updated = client
            .update_custom_dimension("button_name", None, Some("Clicked button"))
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Clicked button"));
        assert_eq!(updated.display_name, "button name");

        let updates = api.updates();
        assert_eq!(updates[0].1, vec!["description".to_string()]);
        assert_eq!(updates[0].0.name, "properties/123/customDimensions/1");

        let err = client.update_custom_dimension("missing", Some("X"), None).await.unwrap_err();
        assert!(matches!(err, AdminApiError::DimensionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_archive() {
        let client = client(FakeAdminApi::new().with_dimension("button_name", "EVENT"));

        client.archive_custom_dimension("button_name").await.unwrap();
        assert!(!client.custom_dimension_exists("button_name").await.unwrap());

        let err = client.archive_custom_dimension("button_name").await.unwrap_err();
        assert_eq!(err.parameter_name(), Some("button_name"));
    }

    #[tokio::test]
    async fn test_validate_sync_and_find_missing() {
        let api = FakeAdminApi::new().with_dimension("present", "USER");
        let client = client(api.clone());

        let report = client.validate_custom_dimension(&dimension("present")).await.unwrap();
        assert!(!report.valid);
        assert!(report.exists);
        assert!(report.errors.is_empty());

        let definitions = [dimension("present"), dimension("absent")];
        let missing = client.find_missing_dimensions(&definitions).await.unwrap();
        assert_eq!(missing, vec![dimension("absent")]);

        let result = client.sync_custom_dimensions(&definitions).await.unwrap();
        assert_eq!(result.existing, vec!["present".to_string()]);
        assert_eq!(result.created, vec!["absent".to_string()]);
        assert!(result.failed.is_empty());
        assert!(client.find_missing_dimensions(&definitions).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_metrics_are_event_scoped() {
        let client = client(FakeAdminApi::new().with_metric("points"));
        let metrics = client.list_custom_metrics().await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].scope, "EVENT");
        assert_eq!(metrics[0].measurement_unit, "STANDARD");
    }

    #[tokio::test]
    async fn test_listing_overlapping_a_mutation_is_not_kept() {
        let api = FakeAdminApi::new().with_dimension("button_name", "EVENT");
        let client = client(api.clone());
        let gate = api.pause_next_list();

        let coupon = dimension("coupon_code");
        let (stale, created) = tokio::join!(client.custom_dimension_exists("coupon_code"), async {
            let created = client.create_custom_dimension(&coupon).await;
            gate.notify_one();
            created
        });

        // the paused listing answered with the list from before the create
        assert!(!stale.unwrap());
        assert!(created.is_ok());

        assert!(client.custom_dimension_exists("coupon_code").await.unwrap());
        assert_eq!(client.list_custom_dimensions().await.unwrap().len(), 2);
        assert_eq!(api.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_admin_handle_created_once() {
        let factory = Arc::new(FakeFactory::with_admin(FakeAdminApi::new()));
        let client = AdminClient::new(
            "main",
            ClientConfig::new("123", "credentials.json"),
            Arc::new(AnalyticsCache::disabled()),
            factory.clone(),
        );
        assert_eq!(factory.admin_creations(), 0);

        client.list_custom_dimensions().await.unwrap();
        client.create_custom_dimension(&dimension("coupon_code")).await.unwrap();
        client.list_custom_metrics().await.unwrap();

        assert_eq!(factory.admin_creations(), 1);
        assert_eq!(factory.data_creations(), 0);
    }

    #[tokio::test]
    async fn test_factory_failure_is_wrapped() {
        let client = AdminClient::new(
            "main",
            ClientConfig::new("123", "credentials.json"),
            Arc::new(AnalyticsCache::disabled()),
            Arc::new(FakeFactory::default()),
        );
        let err = client.list_custom_dimensions().await.unwrap_err();
        assert!(matches!(err, AdminApiError::Call { .. }));
        assert!(err.to_string().starts_with("Failed to list custom dimensions"));
    }
}
