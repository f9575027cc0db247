//! Diff suppression.
//!
//! The API fills in policy blocks the configuration may leave out (zero
//! autoscale, empty hooks, the default deployment policy), and feature
//! parameters are compared as JSON rather than text. Each predicate takes a
//! flattened key, its old and new rendering and the prior state, and tells
//! whether the difference is noise.

use serde_json::Value;

use super::model::AppConfig;

/// Signature shared by all predicates.
pub type SuppressFn = fn(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool;

/// Count key of the root block device list.
pub const ROOT_BLOCK_DEVICE_COUNT: &str = "environment_infos.0.root_block_device.#";
/// Count key of the autoscale block.
pub const AUTOSCALE_COUNT: &str = "autoscale.#";
/// Count key of the lifecycle hooks block.
pub const LIFECYCLE_HOOKS_COUNT: &str = "lifecycle_hooks.#";
/// Count key of the deployment policy block.
pub const SAFE_DEPLOYMENT_COUNT: &str = "safe_deployment.#";

/// Every predicate, paired with the key prefix it is consulted for.
pub const SUPPRESSORS: &[(&str, SuppressFn)] = &[
    ("features.", suppress_features_parameters),
    ("environment_infos.0.root_block_device.", suppress_root_block_device),
    ("autoscale.", suppress_autoscale),
    ("lifecycle_hooks.", suppress_lifecycle_hooks),
    ("safe_deployment.", suppress_safe_deployment),
];

/// Whether any predicate suppresses the change of `key`.
pub fn is_suppressed(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool {
    SUPPRESSORS
        .iter()
        .any(|(prefix, suppress)| key.starts_with(prefix) && suppress(key, old, new, prior))
}

/// `features.N.parameters`: equal JSON documents, whatever the formatting or
/// key order. Blank text counts as the empty object.
pub fn suppress_features_parameters(key: &str, old: &str, new: &str, _prior: &AppConfig) -> bool {
    if !is_features_parameters_key(key) {
        return false;
    }
    match (parse_parameters(old), parse_parameters(new)) {
        (Some(old), Some(new)) => old == new,
        _ => false,
    }
}

/// Root block device removed from configuration while the API only holds defaults.
pub fn suppress_root_block_device(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool {
    key == ROOT_BLOCK_DEVICE_COUNT
        && is_dropped(old, new)
        && prior.root_block_device().map_or(true, |device| device.is_unset())
}

/// Autoscale removed from configuration while the API holds a zero policy.
pub fn suppress_autoscale(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool {
    key == AUTOSCALE_COUNT
        && is_dropped(old, new)
        && prior.autoscale().map_or(true, |autoscale| autoscale.is_zero())
}

/// Lifecycle hooks removed from configuration while the API holds empty scripts.
pub fn suppress_lifecycle_hooks(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool {
    key == LIFECYCLE_HOOKS_COUNT
        && is_dropped(old, new)
        && prior.lifecycle_hooks().map_or(true, |hooks| hooks.is_empty())
}

/// Deployment policy removed from configuration while the API holds the fallback.
pub fn suppress_safe_deployment(key: &str, old: &str, new: &str, prior: &AppConfig) -> bool {
    key == SAFE_DEPLOYMENT_COUNT
        && is_dropped(old, new)
        && prior.safe_deployment().map_or(true, |policy| policy.is_unset())
}

fn is_dropped(old: &str, new: &str) -> bool {
    old == "1" && (new == "0" || new.is_empty())
}

fn is_features_parameters_key(key: &str) -> bool {
    let mut parts = key.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some("features"), Some(index), Some("parameters"), None)
            if index.parse::<usize>().is_ok()
    )
}

fn parse_parameters(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Value::Object(Default::default()));
    }
    serde_json::from_str(text).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::model::{
        Autoscale, EnvironmentInfos, LifecycleHooks, RootBlockDevice, SafeDeployment,
    };

    fn populated() -> AppConfig {
        AppConfig {
            environment_infos: vec![EnvironmentInfos {
                root_block_device: vec![RootBlockDevice {
                    size: 20,
                    name: "rootblock".into(),
                }],
                ..Default::default()
            }],
            autoscale: vec![Autoscale {
                name: "autoscale".into(),
                enable_metrics: false,
                min: 0,
                max: 3,
            }],
            lifecycle_hooks: vec![LifecycleHooks {
                pre_buildimage: "#!/usr/bin/env bash".into(),
                post_buildimage: "#!/usr/bin/env bash".into(),
                ..Default::default()
            }],
            safe_deployment: vec![SafeDeployment::fallback()],
            ..Default::default()
        }
    }

    #[test]
    fn test_suppress_features_parameters() {
        let empty = AppConfig::default();
        let key = "features.0.parameters";

        let cases = [
            (r#"{ "name" : "positive", "id" : 1 }"#, r#"{ "name" : "positive", "id" : 1 }"#, true),
            (r#"{ "name" : "positive", "id" : 1 }"#, r#"{ "id" : 1, "name" : "positive" }"#, true),
            (r#"{ "name" : "negative", "id" : 1 }"#, r#"{ "id" : 1, "name" : "positive" }"#, false),
            (r#"{ "name" : "negative", "id" : 1 }"#, r#"{ "name" : "positive", "id" : 1 }"#, false),
            ("{}", "", true),
            ("{not json", "{not json", false),
        ];

        for (old, new, expected) in cases {
            assert_eq!(
                suppress_features_parameters(key, old, new, &empty),
                expected,
                "{} -> {}",
                old,
                new
            );
        }

        assert!(!suppress_features_parameters("features.0.name", "{}", "{}", &empty));
        assert!(!suppress_features_parameters("features.#", "1", "1", &empty));
    }

    #[test]
    fn test_suppress_root_block_device() {
        let empty = AppConfig::default();
        assert!(suppress_root_block_device(ROOT_BLOCK_DEVICE_COUNT, "1", "0", &empty));
        assert!(!suppress_root_block_device(ROOT_BLOCK_DEVICE_COUNT, "1", "0", &populated()));
        assert!(!suppress_root_block_device(
            "environment_infos.0.root_block_device.0.name",
            "1",
            "0",
            &empty
        ));
    }

    #[test]
    fn test_suppress_autoscale() {
        let empty = AppConfig::default();
        assert!(suppress_autoscale(AUTOSCALE_COUNT, "1", "0", &empty));
        assert!(!suppress_autoscale(AUTOSCALE_COUNT, "1", "0", &populated()));
        assert!(!suppress_autoscale(AUTOSCALE_COUNT, "0", "1", &empty));
        assert!(!suppress_autoscale("autoscale.0.min", "1", "0", &empty));

        let zero = AppConfig {
            autoscale: vec![Autoscale::default()],
            ..Default::default()
        };
        assert!(suppress_autoscale(AUTOSCALE_COUNT, "1", "0", &zero));
    }

    #[test]
    fn test_suppress_lifecycle_hooks() {
        let empty = AppConfig::default();
        assert!(suppress_lifecycle_hooks(LIFECYCLE_HOOKS_COUNT, "1", "0", &empty));
        assert!(!suppress_lifecycle_hooks(LIFECYCLE_HOOKS_COUNT, "1", "0", &populated()));
        assert!(!suppress_lifecycle_hooks(
            "lifecycle_hooks.0.pre_buildimage",
            "1",
            "0",
            &empty
        ));
    }

    #[test]
    fn test_suppress_safe_deployment() {
        let empty = AppConfig::default();
        assert!(suppress_safe_deployment(SAFE_DEPLOYMENT_COUNT, "1", "0", &empty));
        // The fallback policy is what the API stores when none is configured
        assert!(suppress_safe_deployment(SAFE_DEPLOYMENT_COUNT, "1", "0", &populated()));
        assert!(!suppress_safe_deployment(
            "safe_deployment.0.wait_before_deploy",
            "1",
            "0",
            &empty
        ));

        let custom = AppConfig {
            safe_deployment: vec![SafeDeployment {
                api_port: 5001,
                ..SafeDeployment::fallback()
            }],
            ..Default::default()
        };
        assert!(!suppress_safe_deployment(SAFE_DEPLOYMENT_COUNT, "1", "0", &custom));
    }

    #[test]
    fn test_is_suppressed_dispatch() {
        let empty = AppConfig::default();
        assert!(is_suppressed(AUTOSCALE_COUNT, "1", "0", &empty));
        assert!(is_suppressed("features.2.parameters", "{\"a\":1}", "{ \"a\": 1 }", &empty));
        assert!(!is_suppressed("name", "a", "b", &empty));
        assert!(!is_suppressed("modules.#", "1", "0", &empty));
    }
}
