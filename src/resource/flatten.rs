//! API to state conversion.
//!
//! Inverse of [`expand`](super::expand): scripts are decoded, parameters
//! rendered as compact JSON, and optional sub-objects become 0- or 1-item lists.

use serde_json::Value;

use super::model::{
    AppConfig, AppState, Autoscale, BuildInfos, EnvironmentInfos, EnvironmentVariable, Feature,
    InstanceTag, LifecycleHooks, Module, OptionalVolume, RootBlockDevice, SafeDeployment,
};
use crate::client::models as api;
use crate::encoding::b64_to_str;

/// Build resource state from an application read back from the API.
pub fn flatten_app(app: &api::App) -> AppState {
    AppState {
        id: app.metadata.id.clone(),
        etag: app.metadata.etag.clone(),
        config: AppConfig {
            name: app.name.clone(),
            env: app.env.clone(),
            role: app.role.clone(),
            description: app.description.clone(),
            region: app.region.clone(),
            vpc_id: app.vpc_id.clone(),
            instance_type: app.instance_type.clone(),
            instance_monitoring: app.instance_monitoring,
            log_notifications: app.log_notifications.clone(),
            build_infos: app.build_infos.iter().map(flatten_build_infos).collect(),
            environment_infos: app
                .environment_infos
                .iter()
                .map(flatten_environment_infos)
                .collect(),
            environment_variables: flatten_environment_variables(
                app.environment_variables.as_deref().unwrap_or_default(),
            ),
            features: flatten_features(app.features.as_deref().unwrap_or_default()),
            lifecycle_hooks: app.lifecycle_hooks.iter().map(flatten_lifecycle_hooks).collect(),
            autoscale: app.autoscale.iter().map(flatten_autoscale).collect(),
            modules: flatten_modules(app.modules.as_deref().unwrap_or_default()),
            safe_deployment: app.safe_deployment.iter().map(flatten_safe_deployment).collect(),
        },
    }
}

pub(crate) fn flatten_build_infos(infos: &api::BuildInfos) -> BuildInfos {
    BuildInfos {
        ssh_username: infos.ssh_username.clone(),
        source_ami: infos.source_ami.clone(),
        ami_name: infos.ami_name.clone(),
        subnet_id: infos.subnet_id.clone(),
    }
}

pub(crate) fn flatten_environment_infos(infos: &api::EnvironmentInfos) -> EnvironmentInfos {
    EnvironmentInfos {
        instance_profile: infos.instance_profile.clone(),
        key_name: infos.key_name.clone(),
        public_ip_address: infos.public_ip_address,
        root_block_device: infos
            .root_block_device
            .iter()
            .map(flatten_root_block_device)
            .collect(),
        security_groups: infos.security_groups.clone(),
        instance_tags: flatten_instance_tags(infos.instance_tags.as_deref().unwrap_or_default()),
        subnet_ids: infos.subnet_ids.clone(),
        optional_volumes: flatten_optional_volumes(
            infos.optional_volumes.as_deref().unwrap_or_default(),
        ),
    }
}

pub(crate) fn flatten_root_block_device(device: &api::RootBlockDevice) -> RootBlockDevice {
    RootBlockDevice {
        size: device.size,
        name: device.name.clone(),
    }
}

pub(crate) fn flatten_instance_tags(tags: &[api::InstanceTag]) -> Vec<InstanceTag> {
    tags.iter()
        .map(|tag| InstanceTag {
            tag_name: tag.tag_name.clone(),
            tag_value: tag.tag_value.clone(),
        })
        .collect()
}

pub(crate) fn flatten_optional_volumes(volumes: &[api::OptionalVolume]) -> Vec<OptionalVolume> {
    volumes
        .iter()
        .map(|volume| OptionalVolume {
            device_name: volume.device_name.clone(),
            volume_type: volume.volume_type.clone(),
            volume_size: volume.volume_size,
            iops: volume.iops,
            launch_block_device_mappings: volume.launch_block_device_mappings,
        })
        .collect()
}

pub(crate) fn flatten_environment_variables(
    vars: &[api::EnvironmentVariable],
) -> Vec<EnvironmentVariable> {
    vars.iter()
        .map(|var| EnvironmentVariable {
            key: var.key.clone(),
            value: var.value.clone(),
        })
        .collect()
}

pub(crate) fn flatten_features(features: &[api::Feature]) -> Vec<Feature> {
    features
        .iter()
        .map(|feature| Feature {
            name: feature.name.clone(),
            version: feature.version.clone(),
            provisioner: feature.provisioner.clone(),
            parameters: flatten_feature_parameters(feature.parameters.as_ref()),
        })
        .collect()
}

/// `null` and `{}` have no text form; anything else is compact JSON.
pub(crate) fn flatten_feature_parameters(parameters: Option<&Value>) -> Option<String> {
    match parameters {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) if map.is_empty() => None,
        Some(value) => serde_json::to_string(value).ok(),
    }
}

pub(crate) fn flatten_lifecycle_hooks(hooks: &api::LifecycleHooks) -> LifecycleHooks {
    LifecycleHooks {
        pre_buildimage: b64_to_str(&hooks.pre_buildimage),
        post_buildimage: b64_to_str(&hooks.post_buildimage),
        pre_bootstrap: b64_to_str(&hooks.pre_bootstrap),
        post_bootstrap: b64_to_str(&hooks.post_bootstrap),
    }
}

pub(crate) fn flatten_autoscale(autoscale: &api::Autoscale) -> Autoscale {
    Autoscale {
        name: autoscale.name.clone(),
        enable_metrics: autoscale.enable_metrics,
        min: autoscale.min,
        max: autoscale.max,
    }
}

pub(crate) fn flatten_modules(modules: &[api::Module]) -> Vec<Module> {
    modules
        .iter()
        .map(|module| Module {
            name: module.name.clone(),
            git_repo: module.git_repo.clone(),
            path: module.path.clone(),
            scope: module.scope.clone(),
            uid: module.uid,
            gid: module.gid,
            build_pack: b64_to_str(&module.build_pack),
            pre_deploy: b64_to_str(&module.pre_deploy),
            post_deploy: b64_to_str(&module.post_deploy),
            after_all_deploy: b64_to_str(&module.after_all_deploy),
            last_deployment: module.last_deployment.clone(),
        })
        .collect()
}

pub(crate) fn flatten_safe_deployment(policy: &api::SafeDeployment) -> SafeDeployment {
    SafeDeployment {
        ha_backend: policy.ha_backend.clone(),
        load_balancer_type: policy.load_balancer_type.clone(),
        app_tag_value: policy.app_tag_value.clone(),
        api_port: policy.api_port,
        wait_before_deploy: policy.wait_before_deploy,
        wait_after_deploy: policy.wait_after_deploy,
    }
}
