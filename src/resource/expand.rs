//! Configuration to API conversion.
//!
//! Scripts are base64-encoded here, feature parameters parsed, and absent
//! policy blocks replaced by the values the API expects.

use serde_json::{Map, Value};

use super::model::{
    AppConfig, Autoscale, BuildInfos, EnvironmentInfos, EnvironmentVariable, Feature,
    InstanceTag, LifecycleHooks, Module, OptionalVolume, RootBlockDevice, SafeDeployment,
};
use crate::client::models as api;
use crate::encoding::str_to_b64;

/// Build the API payload for an application.
pub fn expand_app(config: &AppConfig) -> api::App {
    api::App {
        name: config.name.clone(),
        env: config.env.clone(),
        role: config.role.clone(),
        description: config.description.clone(),
        region: config.region.clone(),
        instance_type: config.instance_type.clone(),
        instance_monitoring: config.instance_monitoring,
        vpc_id: config.vpc_id.clone(),
        log_notifications: config.log_notifications.clone(),
        build_infos: config.build_infos().map(expand_build_infos),
        environment_infos: config.environment_infos().map(expand_environment_infos),
        environment_variables: Some(expand_environment_variables(&config.environment_variables)),
        features: Some(expand_features(&config.features)),
        lifecycle_hooks: Some(expand_lifecycle_hooks(config.lifecycle_hooks())),
        autoscale: Some(expand_autoscale(config.autoscale())),
        modules: Some(expand_modules(&config.modules)),
        safe_deployment: Some(expand_safe_deployment(config.safe_deployment())),
        ..Default::default()
    }
}

pub(crate) fn expand_build_infos(infos: &BuildInfos) -> api::BuildInfos {
    api::BuildInfos {
        ssh_username: infos.ssh_username.clone(),
        source_ami: infos.source_ami.clone(),
        ami_name: infos.ami_name.clone(),
        subnet_id: infos.subnet_id.clone(),
        ..Default::default()
    }
}

pub(crate) fn expand_environment_infos(infos: &EnvironmentInfos) -> api::EnvironmentInfos {
    api::EnvironmentInfos {
        instance_profile: infos.instance_profile.clone(),
        key_name: infos.key_name.clone(),
        public_ip_address: infos.public_ip_address,
        security_groups: infos.security_groups.clone(),
        subnet_ids: infos.subnet_ids.clone(),
        instance_tags: Some(expand_instance_tags(&infos.instance_tags)),
        optional_volumes: Some(expand_optional_volumes(&infos.optional_volumes)),
        root_block_device: infos.root_block_device.first().map(expand_root_block_device),
    }
}

pub(crate) fn expand_instance_tags(tags: &[InstanceTag]) -> Vec<api::InstanceTag> {
    tags.iter()
        .map(|tag| api::InstanceTag {
            tag_name: tag.tag_name.clone(),
            tag_value: tag.tag_value.clone(),
        })
        .collect()
}

pub(crate) fn expand_optional_volumes(volumes: &[OptionalVolume]) -> Vec<api::OptionalVolume> {
    volumes
        .iter()
        .map(|volume| api::OptionalVolume {
            device_name: volume.device_name.clone(),
            volume_type: volume.volume_type.clone(),
            volume_size: volume.volume_size,
            iops: volume.iops,
            launch_block_device_mappings: volume.launch_block_device_mappings,
        })
        .collect()
}

pub(crate) fn expand_root_block_device(device: &RootBlockDevice) -> api::RootBlockDevice {
    api::RootBlockDevice {
        size: device.size,
        name: device.name.clone(),
    }
}

pub(crate) fn expand_environment_variables(
    vars: &[EnvironmentVariable],
) -> Vec<api::EnvironmentVariable> {
    vars.iter()
        .map(|var| api::EnvironmentVariable {
            key: var.key.clone(),
            value: var.value.clone(),
        })
        .collect()
}

pub(crate) fn expand_features(features: &[Feature]) -> Vec<api::Feature> {
    features
        .iter()
        .map(|feature| api::Feature {
            name: feature.name.clone(),
            version: feature.version.clone(),
            provisioner: feature.provisioner.clone(),
            parameters: expand_feature_parameters(feature.parameters.as_deref()),
        })
        .collect()
}

/// Absent or blank text is the empty object, unparsable text is `None`.
pub(crate) fn expand_feature_parameters(raw: Option<&str>) -> Option<Value> {
    match raw.map(str::trim) {
        None | Some("") => Some(Value::Object(Map::new())),
        Some(text) => serde_json::from_str(text).ok(),
    }
}

pub(crate) fn expand_lifecycle_hooks(hooks: Option<&LifecycleHooks>) -> api::LifecycleHooks {
    let Some(hooks) = hooks else {
        return api::LifecycleHooks::default();
    };
    api::LifecycleHooks {
        pre_buildimage: str_to_b64(&hooks.pre_buildimage),
        post_buildimage: str_to_b64(&hooks.post_buildimage),
        pre_bootstrap: str_to_b64(&hooks.pre_bootstrap),
        post_bootstrap: str_to_b64(&hooks.post_bootstrap),
    }
}

pub(crate) fn expand_autoscale(autoscale: Option<&Autoscale>) -> api::Autoscale {
    autoscale
        .map(|autoscale| api::Autoscale {
            name: autoscale.name.clone(),
            enable_metrics: autoscale.enable_metrics,
            min: autoscale.min,
            max: autoscale.max,
        })
        .unwrap_or_default()
}

pub(crate) fn expand_modules(modules: &[Module]) -> Vec<api::Module> {
    modules
        .iter()
        .map(|module| api::Module {
            initialized: None,
            name: module.name.clone(),
            git_repo: module.git_repo.clone(),
            scope: module.scope.clone(),
            path: module.path.clone(),
            uid: module.uid,
            gid: module.gid,
            build_pack: str_to_b64(&module.build_pack),
            pre_deploy: str_to_b64(&module.pre_deploy),
            post_deploy: str_to_b64(&module.post_deploy),
            after_all_deploy: str_to_b64(&module.after_all_deploy),
            last_deployment: module.last_deployment.clone(),
        })
        .collect()
}

pub(crate) fn expand_safe_deployment(policy: Option<&SafeDeployment>) -> api::SafeDeployment {
    let policy = policy.cloned().unwrap_or_else(SafeDeployment::fallback);
    api::SafeDeployment {
        wait_before_deploy: policy.wait_before_deploy,
        wait_after_deploy: policy.wait_after_deploy,
        load_balancer_type: policy.load_balancer_type,
        app_tag_value: policy.app_tag_value,
        ha_backend: policy.ha_backend,
        api_port: policy.api_port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_feature_parameters() {
        assert_eq!(expand_feature_parameters(None), Some(json!({})));
        assert_eq!(expand_feature_parameters(Some("")), Some(json!({})));
        assert_eq!(
            expand_feature_parameters(Some(
                r#"{
                    "package_name" : [
                      "test",
                      "nano"
                    ]
                }"#
            )),
            Some(json!({"package_name": ["test", "nano"]}))
        );
        // Missing closing bracket
        assert_eq!(
            expand_feature_parameters(Some(r#"{"package_name": ["test", "nano" }"#)),
            None
        );
    }

    #[test]
    fn test_expand_features_wire_shape() {
        let features = expand_features(&[Feature {
            name: "feature".into(),
            version: "1".into(),
            provisioner: "ansible".into(),
            parameters: Some("{not json".into()),
        }]);
        let value = serde_json::to_value(&features).unwrap();
        assert_eq!(value[0]["parameters"], Value::Null);
        assert_eq!(value[0]["provisioner"], "ansible");
    }

    #[test]
    fn test_expand_absent_blocks_use_api_defaults() {
        assert_eq!(expand_autoscale(None), api::Autoscale::default());
        assert_eq!(expand_lifecycle_hooks(None), api::LifecycleHooks::default());

        let policy = expand_safe_deployment(None);
        assert_eq!(policy.wait_before_deploy, 10);
        assert_eq!(policy.wait_after_deploy, 10);
        assert_eq!(policy.load_balancer_type, "elb");
        assert_eq!(policy.api_port, 0);
        assert_eq!(policy.ha_backend, "");
    }

    #[test]
    fn test_expand_safe_deployment_explicit() {
        let policy = expand_safe_deployment(Some(&SafeDeployment {
            ha_backend: "test".into(),
            load_balancer_type: "haproxy".into(),
            app_tag_value: "test".into(),
            api_port: 5001,
            wait_before_deploy: 10,
            wait_after_deploy: 10,
        }));
        assert_eq!(policy.api_port, 5001);
        assert_eq!(policy.load_balancer_type, "haproxy");
    }

    #[test]
    fn test_expand_scripts_are_base64() {
        let hooks = expand_lifecycle_hooks(Some(&LifecycleHooks {
            pre_buildimage: "#!/usr/bin/env bash".into(),
            ..Default::default()
        }));
        assert_eq!(hooks.pre_buildimage, "IyEvdXNyL2Jpbi9lbnYgYmFzaA==");
        assert_eq!(hooks.post_bootstrap, "");

        let modules = expand_modules(&[Module {
            name: "my_module".into(),
            git_repo: "https://github.com/test/test.git".into(),
            path: "/".into(),
            scope: "system".into(),
            build_pack: "#!/usr/bin/env bash".into(),
            ..Default::default()
        }]);
        assert_eq!(modules[0].build_pack, "IyEvdXNyL2Jpbi9lbnYgYmFzaA==");
        assert_eq!(modules[0].pre_deploy, "");
        assert!(modules[0].initialized.is_none());
    }

    #[test]
    fn test_expand_environment_infos() {
        let infos = expand_environment_infos(&EnvironmentInfos {
            instance_profile: "profile".into(),
            key_name: "key".into(),
            public_ip_address: false,
            security_groups: vec!["sg-1".into(), "sg-2".into()],
            subnet_ids: vec!["subnet-1".into(), "subnet-2".into()],
            ..Default::default()
        });
        assert_eq!(infos.instance_tags, Some(vec![]));
        assert_eq!(infos.optional_volumes, Some(vec![]));
        assert!(infos.root_block_device.is_none());
        assert!(!infos.public_ip_address);
    }

    #[test]
    fn test_expand_app() {
        let config = AppConfig {
            name: "web".into(),
            env: "prod".into(),
            role: "webfront".into(),
            vpc_id: "vpc-1".into(),
            build_infos: vec![BuildInfos {
                source_ami: "ami-1".into(),
                subnet_id: "subnet-1".into(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let app = expand_app(&config);
        assert_eq!(app.name, "web");
        assert_eq!(app.build_infos.as_ref().unwrap().ssh_username, "admin");
        assert!(app.environment_infos.is_none());
        assert_eq!(app.environment_variables, Some(vec![]));
        assert_eq!(app.modules, Some(vec![]));
        assert_eq!(app.safe_deployment.unwrap().load_balancer_type, "elb");
        assert!(app.metadata.id.is_none());
    }
}
