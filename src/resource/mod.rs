//! The `ghost_app` resource and the `ghost_apps` data source.
//!
//! Handlers here take the API client as an argument; the provider owns it.
//! Every handler decodes host JSON into the typed model, converts it with
//! [`expand`]/[`flatten`], and hands JSON back.

pub mod expand;
pub mod flatten;
pub mod model;
pub mod plan;
pub mod suppress;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::client::{AppsApi, ClientError};
use crate::error::ProviderError;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation::{apply_defaults, validate};

use self::expand::expand_app;
use self::flatten::flatten_app;
use self::model::{AppConfig, AppState};

/// Resource type name.
pub const APP_RESOURCE: &str = "ghost_app";
/// Data source type name.
pub const APPS_DATA_SOURCE: &str = "ghost_apps";

/// Schema of `ghost_app`.
pub fn app_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "id",
            Attribute::computed_string().with_description("Application id"),
        )
        .with_attribute(
            "etag",
            Attribute::computed_string().with_description("Version of the stored application"),
        )
        .with_attribute(
            "name",
            Attribute::required_string().with_pattern(r"^[a-zA-Z0-9_.+-]*$"),
        )
        .with_attribute(
            "env",
            Attribute::required_string().with_pattern(r"^[a-z0-9\-_]*$"),
        )
        .with_attribute(
            "role",
            Attribute::required_string().with_pattern(r"^[a-z0-9\-_]*$"),
        )
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("region", Attribute::optional_string())
        .with_attribute(
            "vpc_id",
            Attribute::required_string().with_pattern(r"^vpc-[a-z0-9]*$"),
        )
        .with_attribute("instance_type", Attribute::optional_string())
        .with_attribute(
            "instance_monitoring",
            Attribute::optional_bool().with_default(json!(false)),
        )
        .with_attribute("log_notifications", Attribute::optional_string_list())
        .with_block(
            "build_infos",
            NestedBlock::list_of_one(build_infos_block()).with_min_items(1),
        )
        .with_block(
            "environment_infos",
            NestedBlock::list_of_one(environment_infos_block()).with_min_items(1),
        )
        .with_block(
            "environment_variables",
            NestedBlock::list(
                Block::new()
                    .with_attribute(
                        "key",
                        Attribute::required_string().with_pattern(r"^[a-zA-Z_][a-zA-Z0-9_]*$"),
                    )
                    .with_attribute("value", Attribute::required_string()),
            ),
        )
        .with_block(
            "features",
            NestedBlock::list(
                Block::new()
                    .with_attribute("name", Attribute::required_string())
                    .with_attribute("version", Attribute::optional_string())
                    .with_attribute(
                        "parameters",
                        Attribute::optional_string()
                            .with_description("Provisioner parameters as a JSON document"),
                    )
                    .with_attribute("provisioner", Attribute::optional_string()),
            ),
        )
        .with_block(
            "lifecycle_hooks",
            NestedBlock::list_of_one(
                Block::new()
                    .with_attribute("pre_buildimage", Attribute::optional_string())
                    .with_attribute("post_buildimage", Attribute::optional_string())
                    .with_attribute("pre_bootstrap", Attribute::optional_string())
                    .with_attribute("post_bootstrap", Attribute::optional_string()),
            ),
        )
        .with_block(
            "autoscale",
            NestedBlock::list_of_one(
                Block::new()
                    .with_attribute("name", Attribute::optional_string())
                    .with_attribute(
                        "enable_metrics",
                        Attribute::optional_bool().with_default(json!(false)),
                    )
                    .with_attribute("min", Attribute::optional_int64())
                    .with_attribute("max", Attribute::optional_int64()),
            ),
        )
        .with_block(
            "modules",
            NestedBlock::list(modules_block()).with_min_items(1),
        )
        .with_block(
            "safe_deployment",
            NestedBlock::list_of_one(
                Block::new()
                    .with_attribute("ha_backend", Attribute::optional_string())
                    .with_attribute(
                        "load_balancer_type",
                        Attribute::optional_string().with_pattern(r"^(elb|alb|haproxy)?$"),
                    )
                    .with_attribute("app_tag_value", Attribute::optional_string())
                    .with_attribute("api_port", Attribute::optional_int64())
                    .with_attribute("wait_before_deploy", Attribute::optional_int64())
                    .with_attribute("wait_after_deploy", Attribute::optional_int64()),
            ),
        )
}

fn build_infos_block() -> Block {
    Block::new()
        .with_attribute(
            "ssh_username",
            Attribute::optional_string().with_default(json!("admin")),
        )
        .with_attribute(
            "source_ami",
            Attribute::required_string().with_pattern(r"^ami-[a-z0-9]*$"),
        )
        .with_attribute("ami_name", Attribute::optional_string())
        .with_attribute(
            "subnet_id",
            Attribute::required_string().with_pattern(r"^subnet-[a-z0-9]*$"),
        )
}

fn environment_infos_block() -> Block {
    Block::new()
        .with_attribute("instance_profile", Attribute::optional_string())
        .with_attribute("key_name", Attribute::optional_string())
        .with_attribute(
            "public_ip_address",
            Attribute::optional_bool().with_default(json!(true)),
        )
        .with_attribute("security_groups", Attribute::optional_string_set())
        .with_attribute("subnet_ids", Attribute::optional_string_list())
        .with_block(
            "root_block_device",
            NestedBlock::list_of_one(
                Block::new()
                    .with_attribute("size", Attribute::optional_int64().with_default(json!(20)))
                    .with_attribute("name", Attribute::optional_string()),
            ),
        )
        .with_block(
            "instance_tags",
            NestedBlock::list(
                Block::new()
                    .with_attribute("tag_name", Attribute::required_string())
                    .with_attribute("tag_value", Attribute::required_string()),
            ),
        )
        .with_block(
            "optional_volumes",
            NestedBlock::list(
                Block::new()
                    .with_attribute("device_name", Attribute::required_string())
                    .with_attribute("volume_type", Attribute::required_string())
                    .with_attribute("volume_size", Attribute::required_int64())
                    .with_attribute("iops", Attribute::optional_int64())
                    .with_attribute(
                        "launch_block_device_mappings",
                        Attribute::optional_bool(),
                    ),
            ),
        )
}

fn modules_block() -> Block {
    Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_pattern(r"^[a-zA-Z0-9.\-_]*$"),
        )
        .with_attribute("git_repo", Attribute::required_string())
        .with_attribute(
            "path",
            Attribute::required_string().with_pattern(r"^/[a-zA-Z0-9.\-_/]*$"),
        )
        .with_attribute(
            "scope",
            Attribute::required_string().with_pattern(r"^(code|system)$"),
        )
        .with_attribute("uid", Attribute::optional_int64().with_default(json!(0)))
        .with_attribute("gid", Attribute::optional_int64().with_default(json!(0)))
        .with_attribute("build_pack", Attribute::optional_string())
        .with_attribute("pre_deploy", Attribute::optional_string())
        .with_attribute("post_deploy", Attribute::optional_string())
        .with_attribute("after_all_deploy", Attribute::optional_string())
        .with_attribute("last_deployment", Attribute::optional_string())
}

/// Schema of `ghost_apps`.
pub fn apps_data_source_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "env",
            Attribute::optional_string().with_description("Only list apps of this environment"),
        )
        .with_attribute(
            "role",
            Attribute::optional_string().with_description("Only list apps of this role"),
        )
        .with_block(
            "apps",
            NestedBlock::list(
                Block::new()
                    .with_attribute("id", Attribute::computed_string())
                    .with_attribute("name", Attribute::computed_string())
                    .with_attribute("env", Attribute::computed_string())
                    .with_attribute("role", Attribute::computed_string()),
            ),
        )
}

/// Schema checks plus the ones the schema cannot express.
pub fn validate_app_config(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validate(&app_schema(), config);

    let features = config.get("features").and_then(Value::as_array);
    for (i, feature) in features.into_iter().flatten().enumerate() {
        let Some(text) = feature.get("parameters").and_then(Value::as_str) else {
            continue;
        };
        if text.trim().is_empty() {
            continue;
        }
        if let Err(err) = serde_json::from_str::<Value>(text) {
            let path = format!("features.{}.parameters", i);
            diagnostics.push(
                Diagnostic::error(format!("\"{}\" must be a valid JSON document", path))
                    .with_detail(err.to_string())
                    .with_attribute(path),
            );
        }
    }

    diagnostics
}

/// Apply defaults, validate, and decode a configuration or planned state.
fn decode_state(mut value: Value) -> Result<AppState, ProviderError> {
    let schema = app_schema();
    apply_defaults(&schema, &mut value);

    let errors: Vec<String> = validate(&schema, &value)
        .into_iter()
        .filter(Diagnostic::is_error)
        .map(|diag| diag.summary)
        .collect();
    if !errors.is_empty() {
        return Err(ProviderError::Validation(errors.join("; ")));
    }

    AppState::from_value(value)
}

/// Plan a `ghost_app` from its prior state and proposed configuration.
///
/// A null proposal with prior state plans the destruction of the application.
pub fn plan(prior_state: Option<Value>, proposed: Value) -> Result<PlanResult, ProviderError> {
    let prior = match prior_state {
        Some(Value::Null) | None => None,
        Some(value) => Some(AppState::from_value(value)?),
    };

    if proposed.is_null() {
        let Some(prior) = prior else {
            return Ok(PlanResult::no_change(Value::Null));
        };
        return plan::plan_destroy(&prior);
    }

    let proposed: AppConfig = decode_state(proposed)?.config;
    plan::plan_app(prior.as_ref(), proposed)
}

/// `POST /apps`, then record the id and etag the API assigned.
pub async fn create(api: &dyn AppsApi, planned: Value) -> Result<Value, ProviderError> {
    let state = decode_state(planned)?;
    let config = state.config;
    info!(name = %config.name, env = %config.env, role = %config.role, "Creating ghost_app");

    let meta = api.create_app(&expand_app(&config)).await?;
    let id = meta
        .id
        .ok_or_else(|| ProviderError::Api("create response carried no _id".to_string()))?;

    info!(id = %id, "Created ghost_app");
    AppState {
        id: Some(id),
        etag: meta.etag,
        config,
    }
    .to_value()
}

/// `GET /apps/{id}`. `None` means the application is gone.
pub async fn read(api: &dyn AppsApi, current: Value) -> Result<Option<Value>, ProviderError> {
    let state = AppState::from_value(current)?;
    let id = state.require_id("read")?;
    debug!(id = %id, "Reading ghost_app");

    let app = match api.get_app(id).await {
        Ok(app) => app,
        Err(ClientError::Status { status: 404, .. }) => {
            warn!(id = %id, "ghost_app not found, removing from state");
            return Ok(None);
        },
        Err(err) => return Err(err.into()),
    };

    let mut refreshed = flatten_app(&app);
    if refreshed.id.is_none() {
        refreshed.id = Some(id.to_string());
    }
    Ok(Some(refreshed.to_value()?))
}

/// `PATCH /apps/{id}` guarded by the etag of the prior state.
pub async fn update(
    api: &dyn AppsApi,
    prior_state: Value,
    planned: Value,
) -> Result<Value, ProviderError> {
    let prior = AppState::from_value(prior_state)?;
    let id = prior.require_id("update")?;
    let etag = prior.require_etag("update")?;
    let config = decode_state(planned)?.config;
    info!(id = %id, name = %config.name, "Updating ghost_app");

    let meta = api.update_app(&expand_app(&config), id, etag).await?;

    info!(id = %id, "Updated ghost_app");
    AppState {
        id: Some(id.to_string()),
        etag: meta.etag,
        config,
    }
    .to_value()
}

/// `DELETE /apps/{id}` guarded by the etag of the current state.
pub async fn delete(api: &dyn AppsApi, current: Value) -> Result<(), ProviderError> {
    let state = AppState::from_value(current)?;
    let id = state.require_id("delete")?;
    let etag = state.require_etag("delete")?;
    info!(id = %id, "Deleting ghost_app");

    api.delete_app(id, etag).await?;

    info!(id = %id, "Deleted ghost_app");
    Ok(())
}

/// Bring an existing application under management by id.
pub async fn import(api: &dyn AppsApi, id: &str) -> Result<ImportedResource, ProviderError> {
    info!(id = %id, "Importing ghost_app");
    let app = api.get_app(id).await?;

    let mut state = flatten_app(&app);
    if state.id.is_none() {
        state.id = Some(id.to_string());
    }
    Ok(ImportedResource::new(APP_RESOURCE, state.to_value()?))
}

/// List applications, optionally narrowed to one `env` and/or `role`.
pub async fn read_apps(api: &dyn AppsApi, config: Value) -> Result<Value, ProviderError> {
    let env = config.get("env").and_then(Value::as_str).filter(|s| !s.is_empty());
    let role = config.get("role").and_then(Value::as_str).filter(|s| !s.is_empty());
    debug!(env = ?env, role = ?role, "Listing ghost apps");

    let apps = api.list_apps().await?;
    let listed: Vec<Value> = apps
        .items
        .iter()
        .filter(|app| env.map_or(true, |env| app.env == env))
        .filter(|app| role.map_or(true, |role| app.role == role))
        .map(|app| {
            json!({
                "id": app.metadata.id.clone().unwrap_or_default(),
                "name": app.name,
                "env": app.env,
                "role": app.role,
            })
        })
        .collect();

    info!(count = listed.len(), "Listed ghost apps");
    let mut result = json!({ "apps": listed });
    if let Some(env) = env {
        result["env"] = json!(env);
    }
    if let Some(role) = role {
        result["role"] = json!(role);
    }
    Ok(result)
}
