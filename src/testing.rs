//! Test harness for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way the host would,
//! and [`MemoryAppsApi`] stands in for the Ghost API with the same etag and
//! status-code behaviour.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hemmer_provider_ghost::testing::{MemoryAppsApi, ProviderTester};
//! use hemmer_provider_ghost::GhostProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let tester = ProviderTester::new(GhostProvider::with_client(Arc::new(MemoryAppsApi::new())));
//! let state = tester
//!     .lifecycle_create("ghost_app", json!({
//!         "name": "web",
//!         "env": "prod",
//!         "role": "webfront",
//!         "vpc_id": "vpc-1",
//!         "build_infos": [{"source_ami": "ami-1", "subnet_id": "subnet-1"}],
//!         "environment_infos": [{}],
//!         "modules": [{"name": "code", "git_repo": "git@host:repo", "path": "/", "scope": "code"}]
//!     }))
//!     .await
//!     .unwrap();
//! assert_eq!(state["etag"], "etag-1");
//! # });
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;

use crate::client::models::{App, Apps, EveItemMetadata};
use crate::client::{AppsApi, ClientError};
use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through host-like calls.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The provider under test.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// The provider's full schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider block; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Release the configured client.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration; error diagnostics become `Err`.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a change of existing state.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan the removal of existing state.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create from a planned state.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Refresh a state; `None` when the resource is gone.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Apply a planned state over a prior one.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Destroy the resource behind a state.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Validate a data source configuration; error diagnostics become `Err`.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// plan → create → read. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read_existing(resource_type, created).await
    }

    /// plan → update → read. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, ProviderError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = self
            .update(resource_type, prior_state, plan.planned_state)
            .await?;
        self.read_existing(resource_type, updated).await
    }

    /// plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    async fn read_existing(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let id = state.get("id").cloned().unwrap_or(Value::Null);
        self.read(resource_type, state)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("{} {} vanished after apply", resource_type, id))
            })
    }
}

/// A failed tester call.
#[derive(Debug)]
pub enum TestError {
    /// The call returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The call failed outright.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "{} error diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  {}", diag.summary)?;
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// In-memory API
// =========================================================================

#[derive(Default)]
struct Store {
    apps: BTreeMap<String, App>,
    created: u64,
}

/// An in-memory `apps` collection.
///
/// Ids are 24 hex digits, etags are `etag-<version>`. Unknown ids answer
/// 404 and etag mismatches 412, like the real API.
#[derive(Default)]
pub struct MemoryAppsApi {
    store: Mutex<Store>,
}

impl MemoryAppsApi {
    /// An empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored wire form of an application.
    pub fn stored(&self, id: &str) -> Option<App> {
        self.lock().apps.get(id).cloned()
    }

    /// Number of stored applications.
    pub fn len(&self) -> usize {
        self.lock().apps.len()
    }

    /// No application stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found() -> ClientError {
    ClientError::Status {
        status: 404,
        message: None,
    }
}

fn etag_mismatch() -> ClientError {
    ClientError::Status {
        status: 412,
        message: Some("Client and server etags don't match".to_string()),
    }
}

fn stamp(app: &mut App, id: &str, version: i64) -> EveItemMetadata {
    app.metadata.id = Some(id.to_string());
    app.metadata.etag = Some(format!("etag-{}", version));
    app.metadata.version = Some(version);
    app.metadata.clone()
}

#[async_trait::async_trait]
impl AppsApi for MemoryAppsApi {
    async fn list_apps(&self) -> Result<Apps, ClientError> {
        Ok(Apps {
            items: self.lock().apps.values().cloned().collect(),
            ..Default::default()
        })
    }

    async fn create_app(&self, app: &App) -> Result<EveItemMetadata, ClientError> {
        let mut store = self.lock();
        store.created += 1;
        let id = format!("{:024x}", store.created);

        let mut app = app.clone();
        let meta = stamp(&mut app, &id, 1);
        store.apps.insert(id, app);
        Ok(meta)
    }

    async fn get_app(&self, id: &str) -> Result<App, ClientError> {
        self.lock().apps.get(id).cloned().ok_or_else(not_found)
    }

    async fn update_app(
        &self,
        app: &App,
        id: &str,
        etag: &str,
    ) -> Result<EveItemMetadata, ClientError> {
        let mut store = self.lock();
        let current = store.apps.get_mut(id).ok_or_else(not_found)?;
        if current.metadata.etag.as_deref() != Some(etag) {
            return Err(etag_mismatch());
        }

        let version = current.metadata.version.unwrap_or(1) + 1;
        *current = app.clone();
        Ok(stamp(current, id, version))
    }

    async fn delete_app(&self, id: &str, etag: &str) -> Result<(), ClientError> {
        let mut store = self.lock();
        let current = store.apps.get(id).ok_or_else(not_found)?;
        if current.metadata.etag.as_deref() != Some(etag) {
            return Err(etag_mismatch());
        }
        store.apps.remove(id);
        Ok(())
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan creates the resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "Expected plan to create, not replace");
}

/// Assert that a plan has no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if no change has that path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan leaves `path` alone.
///
/// # Panics
///
/// Panics if a change has that path.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changes.iter().any(|c| c.path == path),
        "Expected plan to not change attribute '{}', but it was changed",
        path
    );
}

/// Assert that no diagnostic is an error.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if no error diagnostic matches.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeChange;
    use serde_json::json;

    fn app(name: &str) -> App {
        App {
            name: name.to_string(),
            env: "prod".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_memory_api_create_and_get() {
        let api = MemoryAppsApi::new();
        let meta = api.create_app(&app("web")).await.unwrap();
        let id = meta.id.unwrap();
        assert_eq!(id.len(), 24);
        assert_eq!(meta.etag.as_deref(), Some("etag-1"));

        let stored = api.get_app(&id).await.unwrap();
        assert_eq!(stored.name, "web");
        assert_eq!(stored.metadata.etag.as_deref(), Some("etag-1"));
        assert_eq!(api.list_apps().await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_api_etags() {
        let api = MemoryAppsApi::new();
        let id = api.create_app(&app("web")).await.unwrap().id.unwrap();

        let err = api.update_app(&app("web2"), &id, "etag-9").await.unwrap_err();
        assert_eq!(err.status(), Some(412));

        let meta = api.update_app(&app("web2"), &id, "etag-1").await.unwrap();
        assert_eq!(meta.etag.as_deref(), Some("etag-2"));
        assert_eq!(api.stored(&id).unwrap().name, "web2");

        let err = api.delete_app(&id, "etag-1").await.unwrap_err();
        assert_eq!(err.status(), Some(412));
        api.delete_app(&id, "etag-2").await.unwrap();
        assert!(api.is_empty());
    }

    #[tokio::test]
    async fn test_memory_api_not_found() {
        let api = MemoryAppsApi::new();
        assert_eq!(api.get_app("nope").await.unwrap_err().status(), Some(404));
        assert_eq!(
            api.update_app(&app("x"), "nope", "etag-1")
                .await
                .unwrap_err()
                .status(),
            Some(404)
        );
        assert_eq!(api.delete_app("nope", "etag-1").await.unwrap_err().status(), Some(404));
    }

    #[test]
    fn test_assert_no_errors() {
        assert_no_errors(&[Diagnostic::warning("Just a warning")]);
    }

    #[test]
    #[should_panic(expected = "Expected no errors")]
    fn test_assert_no_errors_fails() {
        assert_no_errors(&[Diagnostic::error("An error")]);
    }

    #[test]
    fn test_assert_plan_helpers() {
        let plan = PlanResult::with_changes(
            json!({"name": "web"}),
            vec![AttributeChange::added("name", json!("web"))],
            false,
        );
        assert_plan_creates(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "env");
        assert_plan_no_changes(&PlanResult::no_change(json!({})));
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("\"vpc_id\" must match ^vpc-[a-z0-9]*$").with_attribute("vpc_id"),
            Diagnostic::error("Missing required attribute 'modules'").with_detail("More info"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 error diagnostic(s)"));
        assert!(display.contains("(at vpc_id)"));
        assert!(display.contains("More info"));
    }
}
