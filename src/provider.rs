//! [`GhostProvider`]: the provider serving `ghost_app` and `ghost_apps`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::AppsApi;
use crate::config::{provider_schema, Config};
use crate::error::ProviderError;
use crate::resource::{self, APPS_DATA_SOURCE, APP_RESOURCE};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// The Ghost provider.
///
/// Holds the API client once [`configure`](ProviderService::configure) has
/// run, or the one injected with [`GhostProvider::with_client`].
#[derive(Default)]
pub struct GhostProvider {
    client: RwLock<Option<Arc<dyn AppsApi>>>,
}

impl GhostProvider {
    /// An unconfigured provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider already talking to `client`.
    pub fn with_client(client: Arc<dyn AppsApi>) -> Self {
        Self {
            client: RwLock::new(Some(client)),
        }
    }

    async fn client(&self) -> Result<Arc<dyn AppsApi>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }
}

fn check_resource(resource_type: &str) -> Result<(), ProviderError> {
    if resource_type == APP_RESOURCE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(resource_type.to_string()))
    }
}

fn check_data_source(data_source_type: &str) -> Result<(), ProviderError> {
    if data_source_type == APPS_DATA_SOURCE {
        Ok(())
    } else {
        Err(ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for GhostProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(provider_schema())
            .with_resource(APP_RESOURCE, resource::app_schema())
            .with_data_source(APPS_DATA_SOURCE, resource::apps_data_source_schema())
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_schema(), &config);
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "Provider configuration is invalid");
            return Ok(diagnostics);
        }

        info!("Initializing Ghost client");
        let client = match Config::from_value(config).and_then(|config| config.client()) {
            Ok(client) => client,
            Err(err) => return Ok(vec![err.to_diagnostic()]),
        };

        let client: Arc<dyn AppsApi> = Arc::new(client);
        *self.client.write().await = Some(client);
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        check_resource(resource_type)?;
        Ok(resource::validate_app_config(&config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        check_resource(resource_type)?;
        resource::plan(prior_state, proposed_state)
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource(resource_type)?;
        let client = self.client().await?;
        resource::create(client.as_ref(), planned_state).await
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        check_resource(resource_type)?;
        let client = self.client().await?;
        resource::read(client.as_ref(), current_state).await
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        check_resource(resource_type)?;
        let client = self.client().await?;
        resource::update(client.as_ref(), prior_state, planned_state).await
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        check_resource(resource_type)?;
        let client = self.client().await?;
        resource::delete(client.as_ref(), current_state).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        check_resource(resource_type)?;
        let client = self.client().await?;
        Ok(vec![resource::import(client.as_ref(), id).await?])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        check_data_source(data_source_type)?;
        Ok(validate(&resource::apps_data_source_schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        check_data_source(data_source_type)?;
        let client = self.client().await?;
        resource::read_apps(client.as_ref(), config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_error_contains, assert_plan_creates, assert_plan_no_changes, MemoryAppsApi,
        ProviderTester, TestError,
    };
    use serde_json::json;

    fn app() -> Value {
        json!({
            "name": "web",
            "env": "prod",
            "role": "webfront",
            "vpc_id": "vpc-1",
            "build_infos": [{"source_ami": "ami-1", "subnet_id": "subnet-1"}],
            "environment_infos": [{}],
            "modules": [{
                "name": "code",
                "git_repo": "git@host:repo",
                "path": "/var/www",
                "scope": "code"
            }]
        })
    }

    fn tester() -> ProviderTester<GhostProvider> {
        ProviderTester::new(GhostProvider::with_client(Arc::new(MemoryAppsApi::new())))
    }

    #[test]
    fn test_metadata() {
        let tester = tester();
        assert_eq!(tester.resource_types(), vec!["ghost_app".to_string()]);
        assert_eq!(tester.data_source_types(), vec!["ghost_apps".to_string()]);
        assert!(tester.schema().provider.block.attributes.contains_key("endpoint"));
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let tester = ProviderTester::new(GhostProvider::new());
        let err = tester.create("ghost_app", app()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_configure() {
        let tester = ProviderTester::new(GhostProvider::new());
        tester
            .configure(json!({
                "user": "myuser",
                "password": "mypwd",
                "endpoint": "https://www.valid.url"
            }))
            .await
            .unwrap();

        match tester
            .configure(json!({"user": "myuser", "password": "mypwd", "endpoint": "invalid.url"}))
            .await
        {
            Err(TestError::Diagnostics(diagnostics)) => {
                assert_error_contains(&diagnostics, "Invalid endpoint URL")
            },
            other => panic!("expected diagnostics, got {:?}", other),
        }

        tester.stop().await.unwrap();
        let err = tester.read("ghost_app", json!({"id": "1"})).await.unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_unknown_types() {
        let tester = tester();
        let err = tester.create("ghost_env", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));

        let err = tester.read_data_source("ghost_envs", json!({})).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_validate_resource_config() {
        let tester = tester();
        tester.validate_resource_config("ghost_app", app()).await.unwrap();

        let mut invalid = app();
        invalid["role"] = json!("Web Front");
        assert!(tester.validate_resource_config("ghost_app", invalid).await.is_err());
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let tester = tester();

        let plan = tester.plan_create("ghost_app", app()).await.unwrap();
        assert_plan_creates(&plan);

        let state = tester.lifecycle_create("ghost_app", app()).await.unwrap();
        assert_eq!(state["etag"], "etag-1");

        // Nothing changed: the API-filled blocks are not a diff
        let plan = tester.plan_update("ghost_app", state.clone(), app()).await.unwrap();
        assert_plan_no_changes(&plan);

        let mut changed = app();
        changed["description"] = json!("front web servers");
        let state = tester
            .lifecycle_update("ghost_app", state, changed)
            .await
            .unwrap();
        assert_eq!(state["description"], "front web servers");
        assert_eq!(state["etag"], "etag-2");

        let imported = tester
            .import_resource("ghost_app", state["id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(imported[0].state, state);

        let apps = tester.read_data_source("ghost_apps", json!({"env": "prod"})).await.unwrap();
        assert_eq!(apps["apps"][0]["name"], "web");

        tester.lifecycle_delete("ghost_app", state.clone()).await.unwrap();
        assert!(tester.read("ghost_app", state).await.unwrap().is_none());
    }
}
