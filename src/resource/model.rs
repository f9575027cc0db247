//! Typed configuration of a `ghost_app`.
//!
//! Mirrors the resource schema one field per attribute. Single nested blocks
//! are `Vec`s holding at most one item, the way the host hands them over.
//! Defaults here match the schema defaults so that a value decoded from
//! sparse JSON equals one that went through [`apply_defaults`] first.
//!
//! [`apply_defaults`]: crate::validation::apply_defaults

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::validation::strip_nulls;

/// Default SSH user of the image builder.
pub const DEFAULT_SSH_USERNAME: &str = "admin";
/// Default root volume size, in GiB.
pub const DEFAULT_ROOT_BLOCK_DEVICE_SIZE: i64 = 20;
/// Seconds to wait around each deployment when no policy is given.
pub const DEFAULT_SAFE_DEPLOYMENT_WAIT: i64 = 10;
/// Load balancer used when no policy is given.
pub const DEFAULT_LOAD_BALANCER_TYPE: &str = "elb";

/// Configuration of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application name.
    pub name: String,
    /// Environment, e.g. `prod`.
    pub env: String,
    /// Role, e.g. `webfront`.
    pub role: String,
    /// Free text.
    pub description: String,
    /// AWS region.
    pub region: String,
    /// VPC id, `vpc-...`.
    pub vpc_id: String,
    /// EC2 instance type.
    pub instance_type: String,
    /// Detailed CloudWatch monitoring.
    pub instance_monitoring: bool,
    /// Addresses notified of deployments.
    pub log_notifications: Vec<String>,
    /// Exactly one item.
    pub build_infos: Vec<BuildInfos>,
    /// Exactly one item.
    pub environment_infos: Vec<EnvironmentInfos>,
    /// Exported to every module.
    pub environment_variables: Vec<EnvironmentVariable>,
    /// Provisioner features.
    pub features: Vec<Feature>,
    /// At most one item.
    pub lifecycle_hooks: Vec<LifecycleHooks>,
    /// At most one item.
    pub autoscale: Vec<Autoscale>,
    /// At least one item.
    pub modules: Vec<Module>,
    /// At most one item.
    pub safe_deployment: Vec<SafeDeployment>,
}

/// How the application image is baked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildInfos {
    /// Defaults to [`DEFAULT_SSH_USERNAME`].
    pub ssh_username: String,
    /// Base AMI, `ami-...`.
    pub source_ami: String,
    /// Last baked AMI.
    pub ami_name: String,
    /// Subnet of the build instance, `subnet-...`.
    pub subnet_id: String,
}

impl Default for BuildInfos {
    fn default() -> Self {
        Self {
            ssh_username: DEFAULT_SSH_USERNAME.to_string(),
            source_ami: String::new(),
            ami_name: String::new(),
            subnet_id: String::new(),
        }
    }
}

/// Where and how instances run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentInfos {
    /// IAM instance profile.
    pub instance_profile: String,
    /// EC2 key pair.
    pub key_name: String,
    /// Defaults to `true`.
    pub public_ip_address: bool,
    /// At most one item.
    pub root_block_device: Vec<RootBlockDevice>,
    /// Set semantics: kept sorted and unique by [`AppConfig::normalized`].
    pub security_groups: Vec<String>,
    /// Tags put on every instance.
    pub instance_tags: Vec<InstanceTag>,
    /// Subnets instances are spread over.
    pub subnet_ids: Vec<String>,
    /// Extra EBS volumes.
    pub optional_volumes: Vec<OptionalVolume>,
}

impl Default for EnvironmentInfos {
    fn default() -> Self {
        Self {
            instance_profile: String::new(),
            key_name: String::new(),
            public_ip_address: true,
            root_block_device: Vec::new(),
            security_groups: Vec::new(),
            instance_tags: Vec::new(),
            subnet_ids: Vec::new(),
            optional_volumes: Vec::new(),
        }
    }
}

/// Root volume of the instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootBlockDevice {
    /// GiB, defaults to [`DEFAULT_ROOT_BLOCK_DEVICE_SIZE`].
    pub size: i64,
    /// Device name.
    pub name: String,
}

impl Default for RootBlockDevice {
    fn default() -> Self {
        Self {
            size: DEFAULT_ROOT_BLOCK_DEVICE_SIZE,
            name: String::new(),
        }
    }
}

impl RootBlockDevice {
    /// Zero-valued or untouched defaults.
    pub fn is_unset(&self) -> bool {
        self.name.is_empty() && (self.size == 0 || self.size == DEFAULT_ROOT_BLOCK_DEVICE_SIZE)
    }
}

/// An EC2 tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceTag {
    /// Tag key.
    pub tag_name: String,
    /// Tag value.
    pub tag_value: String,
}

/// An extra EBS volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionalVolume {
    /// Device path.
    pub device_name: String,
    /// `gp2`, `io1`, `standard`, `st1` or `sc1`.
    pub volume_type: String,
    /// GiB.
    pub volume_size: i64,
    /// Provisioned IOPS.
    pub iops: i64,
    /// Also attach while baking the image.
    pub launch_block_device_mappings: bool,
}

/// An environment variable exported to modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentVariable {
    /// Shell identifier.
    pub key: String,
    /// Value.
    pub value: String,
}

/// A provisioner feature. `parameters` is a JSON document held as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    /// Feature name.
    pub name: String,
    /// Version or value passed to the provisioner.
    pub version: String,
    /// `salt` or `ansible`.
    pub provisioner: String,
    /// JSON text; absent and blank mean no parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

/// Plain-text hook scripts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleHooks {
    /// Before the image is baked.
    pub pre_buildimage: String,
    /// After the image is baked.
    pub post_buildimage: String,
    /// Before an instance bootstraps.
    pub pre_bootstrap: String,
    /// After an instance bootstraps.
    pub post_bootstrap: String,
}

impl LifecycleHooks {
    /// No script set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Autoscaling group bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Autoscale {
    /// Group name.
    pub name: String,
    /// Collect group metrics.
    pub enable_metrics: bool,
    /// Minimum instance count.
    pub min: i64,
    /// Maximum instance count.
    pub max: i64,
}

impl Autoscale {
    /// Every field at its zero value.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// A deployable module. Scripts are plain text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Repository URL.
    pub git_repo: String,
    /// Install path.
    pub path: String,
    /// `code` or `system`.
    pub scope: String,
    /// Owner uid.
    pub uid: i64,
    /// Owner gid.
    pub gid: i64,
    /// Build script.
    pub build_pack: String,
    /// Runs before each deployment.
    pub pre_deploy: String,
    /// Runs after each deployment.
    pub post_deploy: String,
    /// Runs once every instance is deployed.
    pub after_all_deploy: String,
    /// Revision last deployed.
    pub last_deployment: String,
}

/// Rolling deployment policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafeDeployment {
    /// HAProxy backend.
    pub ha_backend: String,
    /// `elb`, `alb` or `haproxy`.
    pub load_balancer_type: String,
    /// Tag value locating the HAProxy instances.
    pub app_tag_value: String,
    /// HAProxy API port.
    pub api_port: i64,
    /// Seconds to wait before each instance.
    pub wait_before_deploy: i64,
    /// Seconds to wait after each instance.
    pub wait_after_deploy: i64,
}

impl SafeDeployment {
    /// The policy applied when the configuration has none.
    pub fn fallback() -> Self {
        Self {
            load_balancer_type: DEFAULT_LOAD_BALANCER_TYPE.to_string(),
            wait_before_deploy: DEFAULT_SAFE_DEPLOYMENT_WAIT,
            wait_after_deploy: DEFAULT_SAFE_DEPLOYMENT_WAIT,
            ..Self::default()
        }
    }

    /// Zero-valued or equal to [`SafeDeployment::fallback`].
    pub fn is_unset(&self) -> bool {
        *self == Self::default() || *self == Self::fallback()
    }
}

impl AppConfig {
    /// Decode host JSON. Nulls are treated as absent.
    pub fn from_value(mut value: Value) -> Result<Self, ProviderError> {
        strip_nulls(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Canonical form used for comparisons: set-typed lists sorted and deduplicated.
    pub fn normalized(mut self) -> Self {
        for infos in &mut self.environment_infos {
            infos.security_groups.sort();
            infos.security_groups.dedup();
        }
        self
    }

    /// The single `build_infos` item, if any.
    pub fn build_infos(&self) -> Option<&BuildInfos> {
        self.build_infos.first()
    }

    /// The single `environment_infos` item, if any.
    pub fn environment_infos(&self) -> Option<&EnvironmentInfos> {
        self.environment_infos.first()
    }

    /// The root block device of the single `environment_infos` item, if any.
    pub fn root_block_device(&self) -> Option<&RootBlockDevice> {
        self.environment_infos()
            .and_then(|infos| infos.root_block_device.first())
    }

    /// The single `autoscale` item, if any.
    pub fn autoscale(&self) -> Option<&Autoscale> {
        self.autoscale.first()
    }

    /// The single `lifecycle_hooks` item, if any.
    pub fn lifecycle_hooks(&self) -> Option<&LifecycleHooks> {
        self.lifecycle_hooks.first()
    }

    /// The single `safe_deployment` item, if any.
    pub fn safe_deployment(&self) -> Option<&SafeDeployment> {
        self.safe_deployment.first()
    }
}

/// Persisted state of a `ghost_app`: its configuration plus what the API computed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// API `_id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// API `_etag`, sent back as `If-Match`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Everything else, flattened into the same object.
    #[serde(flatten)]
    pub config: AppConfig,
}

impl AppState {
    /// Decode host JSON. Nulls are treated as absent.
    pub fn from_value(mut value: Value) -> Result<Self, ProviderError> {
        strip_nulls(&mut value);
        Ok(serde_json::from_value(value)?)
    }

    /// Encode for the host.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    /// The id, or an error naming what needed it.
    pub fn require_id(&self, operation: &str) -> Result<&str, ProviderError> {
        self.id.as_deref().filter(|id| !id.is_empty()).ok_or_else(|| {
            ProviderError::InvalidRequest(format!("cannot {} ghost_app without an id", operation))
        })
    }

    /// The etag, or an error naming what needed it.
    pub fn require_etag(&self, operation: &str) -> Result<&str, ProviderError> {
        self.etag
            .as_deref()
            .filter(|etag| !etag.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidRequest(format!(
                    "cannot {} ghost_app without an etag",
                    operation
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_sparse_config() {
        let config = AppConfig::from_value(json!({
            "name": "web",
            "env": "prod",
            "role": "webfront",
            "vpc_id": "vpc-1",
            "description": null,
            "build_infos": [{"source_ami": "ami-1", "subnet_id": "subnet-1"}],
            "environment_infos": [{"root_block_device": [{}]}],
            "modules": []
        }))
        .unwrap();

        assert_eq!(config.name, "web");
        assert_eq!(config.description, "");
        assert!(!config.instance_monitoring);
        assert_eq!(config.build_infos().unwrap().ssh_username, "admin");
        assert!(config.environment_infos().unwrap().public_ip_address);
        assert_eq!(config.root_block_device().unwrap().size, 20);
        assert!(config.autoscale().is_none());
    }

    #[test]
    fn test_state_carries_id_and_etag() {
        let state = AppState::from_value(json!({
            "id": "5a2f",
            "etag": "abc",
            "name": "web"
        }))
        .unwrap();
        assert_eq!(state.require_id("update").unwrap(), "5a2f");
        assert_eq!(state.require_etag("update").unwrap(), "abc");
        assert_eq!(state.config.name, "web");

        let value = state.to_value().unwrap();
        assert_eq!(value["id"], "5a2f");
        assert_eq!(value["etag"], "abc");
        assert_eq!(value["name"], "web");
    }

    #[test]
    fn test_missing_etag() {
        let state = AppState::from_value(json!({"id": "5a2f"})).unwrap();
        let err = state.require_etag("delete").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("delete"));
    }

    #[test]
    fn test_normalized_sorts_security_groups() {
        let config = AppConfig {
            environment_infos: vec![EnvironmentInfos {
                security_groups: vec!["sg-2".into(), "sg-1".into(), "sg-2".into()],
                ..Default::default()
            }],
            ..Default::default()
        }
        .normalized();

        assert_eq!(
            config.environment_infos[0].security_groups,
            vec!["sg-1".to_string(), "sg-2".to_string()]
        );
    }

    #[test]
    fn test_unset_checks() {
        assert!(Autoscale::default().is_zero());
        assert!(LifecycleHooks::default().is_empty());
        assert!(SafeDeployment::default().is_unset());
        assert!(SafeDeployment::fallback().is_unset());
        assert!(!SafeDeployment {
            api_port: 5001,
            ..SafeDeployment::fallback()
        }
        .is_unset());
        assert!(RootBlockDevice::default().is_unset());
        assert!(!RootBlockDevice {
            size: 20,
            name: "rootblock".into()
        }
        .is_unset());
    }
}
