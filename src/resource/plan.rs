//! Planning: diff prior state against proposed configuration.
//!
//! Both sides are rendered into flat keys the way the host addresses them
//! (`modules.0.name`, `autoscale.#`), compared key by key, and every
//! difference is offered to the suppress predicates before it becomes an
//! [`AttributeChange`].

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use tracing::debug;

use super::model::{AppConfig, AppState};
use super::suppress::{
    is_suppressed, AUTOSCALE_COUNT, LIFECYCLE_HOOKS_COUNT, ROOT_BLOCK_DEVICE_COUNT,
    SAFE_DEPLOYMENT_COUNT,
};
use crate::error::ProviderError;
use crate::types::{AttributeChange, PlanResult};

/// Flatten a JSON document into dotted keys.
///
/// Lists contribute a `<key>.#` entry holding their length; nulls are absent.
pub fn flatmap(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatmap_into("", value, &mut out);
    out
}

fn flatmap_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Null => {},
        Value::Object(map) => {
            for (key, item) in map {
                flatmap_into(&join(prefix, key), item, out);
            }
        },
        Value::Array(items) => {
            out.insert(join(prefix, "#"), Value::from(items.len()));
            for (i, item) in items.iter().enumerate() {
                flatmap_into(&join(prefix, &i.to_string()), item, out);
            }
        },
        scalar => {
            out.insert(prefix.to_string(), scalar.clone());
        },
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Text form of a flat value as the predicates see it. A missing count is `0`.
fn render(key: &str, value: Option<&Value>) -> String {
    match value {
        None if key.ends_with(".#") => "0".to_string(),
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Plan a `ghost_app`.
///
/// Without prior state every key is an addition. Otherwise only the
/// differences no predicate suppresses are reported; suppressed blocks keep
/// their prior value in the planned state, and `id`/`etag` carry over.
pub fn plan_app(
    prior: Option<&AppState>,
    proposed: AppConfig,
) -> Result<PlanResult, ProviderError> {
    let proposed = proposed.normalized();

    let Some(prior) = prior else {
        let planned = AppState {
            id: None,
            etag: None,
            config: proposed,
        }
        .to_value()?;
        let changes = flatmap(&planned)
            .into_iter()
            .map(|(key, value)| AttributeChange::added(key, value))
            .collect();
        return Ok(PlanResult::with_changes(planned, changes, false));
    };

    let prior_config = prior.config.clone().normalized();
    let old = flatmap(&serde_json::to_value(&prior_config)?);
    let new = flatmap(&serde_json::to_value(&proposed)?);
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();

    let mut planned = proposed;
    let mut muted: Vec<String> = Vec::new();
    let mut changes = Vec::new();

    // Count keys first, so a muted block silences everything under it
    for key in keys.iter().filter(|key| key.ends_with(".#")) {
        let (before, after) = (old.get(*key), new.get(*key));
        if before != after
            && is_suppressed(key, &render(key, before), &render(key, after), &prior_config)
        {
            debug!(key = %key, "Suppressed block removal");
            carry_prior(&mut planned, &prior_config, key);
            muted.push(key.trim_end_matches('#').to_string());
        }
    }

    for key in keys {
        let (before, after) = (old.get(key), new.get(key));
        if before == after || muted.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            continue;
        }
        if is_suppressed(key, &render(key, before), &render(key, after), &prior_config) {
            debug!(key = %key, "Suppressed equivalent change");
            carry_prior(&mut planned, &prior_config, key);
            continue;
        }
        changes.push(AttributeChange::new(key.clone(), before.cloned(), after.cloned()));
    }

    if changes.is_empty() {
        return Ok(PlanResult::no_change(prior.to_value()?));
    }

    let planned = AppState {
        id: prior.id.clone(),
        etag: prior.etag.clone(),
        config: planned,
    }
    .to_value()?;
    Ok(PlanResult::with_changes(planned, changes, false))
}

/// Plan removing the application: every stored key goes away.
pub fn plan_destroy(prior: &AppState) -> Result<PlanResult, ProviderError> {
    let changes = flatmap(&serde_json::to_value(&prior.config)?)
        .into_iter()
        .map(|(key, value)| AttributeChange::removed(key, value))
        .collect();
    Ok(PlanResult::with_changes(Value::Null, changes, false))
}

/// Put back the prior value of the block or attribute behind a suppressed key.
fn carry_prior(planned: &mut AppConfig, prior: &AppConfig, key: &str) {
    match key {
        AUTOSCALE_COUNT => planned.autoscale = prior.autoscale.clone(),
        LIFECYCLE_HOOKS_COUNT => planned.lifecycle_hooks = prior.lifecycle_hooks.clone(),
        SAFE_DEPLOYMENT_COUNT => planned.safe_deployment = prior.safe_deployment.clone(),
        ROOT_BLOCK_DEVICE_COUNT => {
            if let (Some(infos), Some(prior_infos)) =
                (planned.environment_infos.first_mut(), prior.environment_infos())
            {
                infos.root_block_device = prior_infos.root_block_device.clone();
            }
        },
        _ => {
            let index = key
                .strip_prefix("features.")
                .and_then(|rest| rest.strip_suffix(".parameters"))
                .and_then(|index| index.parse::<usize>().ok());
            if let Some(index) = index {
                if let (Some(feature), Some(prior_feature)) =
                    (planned.features.get_mut(index), prior.features.get(index))
                {
                    feature.parameters = prior_feature.parameters.clone();
                }
            }
        },
    }
}
