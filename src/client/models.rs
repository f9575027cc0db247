//! Wire types of the Cloud Deploy `apps` endpoints.
//!
//! The API is an Eve service: every item carries `_`-prefixed metadata and
//! collections wrap their items in `_items`. Documents come out of MongoDB,
//! so any field may be `null`; scalar and list fields read `null` as their
//! zero value.

use serde::{Deserialize, Deserializer, Serialize};

/// Read `null` like an absent field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A hypermedia link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Target, relative to the API root (`apps?page=2`).
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub href: String,
    /// Relation name.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub rel: String,
    /// Resource title, e.g. `app`.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub title: String,
}

/// Links of a single item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemLinks {
    /// Link to the item itself.
    #[serde(rename = "self", default, deserialize_with = "nullable")]
    pub this: Link,
}

/// Eve metadata returned on item reads, creates and updates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EveItemMetadata {
    /// Item identifier.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Version token to send back in `If-Match`.
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Creation date as formatted by the API.
    #[serde(rename = "_created", default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    /// Last update date as formatted by the API.
    #[serde(rename = "_updated", default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Document version, starting at 1.
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Highest version stored for the document.
    #[serde(
        rename = "_latest_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub latest_version: Option<i64>,
    /// Hypermedia links of the item.
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<ItemLinks>,
}

/// Links of a collection page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionLinks {
    /// The API root.
    #[serde(default, deserialize_with = "nullable")]
    pub parent: Link,
    /// This page.
    #[serde(rename = "self", default, deserialize_with = "nullable")]
    pub this: Link,
    /// The following page; absent on the last one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Link>,
    /// The final page; absent on the last one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<Link>,
}

/// Pagination info of a collection page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    /// Page size.
    #[serde(default, deserialize_with = "nullable")]
    pub max_results: i64,
    /// One-based page number.
    #[serde(default, deserialize_with = "nullable")]
    pub page: i64,
    /// Item count across all pages.
    #[serde(default, deserialize_with = "nullable")]
    pub total: i64,
}

/// The `build_infos` sub-object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfos {
    /// AMI the image is baked from.
    #[serde(default, deserialize_with = "nullable")]
    pub source_ami: String,
    /// User Packer connects as.
    #[serde(default, deserialize_with = "nullable")]
    pub ssh_username: String,
    /// Subnet the build instance runs in.
    #[serde(default, deserialize_with = "nullable")]
    pub subnet_id: String,
    /// Last baked AMI, set by the API.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub ami_name: String,
    /// Last built container image, set by the API.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub container_image: String,
    /// Base image for container builds.
    #[serde(default, deserialize_with = "nullable")]
    pub source_container_image: String,
}

/// An extra EBS volume attached to instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionalVolume {
    /// Device path, e.g. `/dev/xvdb`.
    #[serde(default, deserialize_with = "nullable")]
    pub device_name: String,
    /// EBS type: `gp2`, `io1`, `standard` or `st1`/`sc1`.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_type: String,
    /// Size in GiB.
    #[serde(default, deserialize_with = "nullable")]
    pub volume_size: i64,
    /// Provisioned IOPS, `io1` only.
    #[serde(default, deserialize_with = "nullable")]
    pub iops: i64,
    /// Also attach the volume while baking the AMI.
    #[serde(default, deserialize_with = "nullable")]
    pub launch_block_device_mappings: bool,
}

/// Root volume of the instances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootBlockDevice {
    /// Size in GiB.
    #[serde(default, deserialize_with = "nullable")]
    pub size: i64,
    /// Device name; empty lets the API pick.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// An EC2 tag put on every instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTag {
    /// Tag key.
    #[serde(default, deserialize_with = "nullable")]
    pub tag_name: String,
    /// Tag value.
    #[serde(default, deserialize_with = "nullable")]
    pub tag_value: String,
}

/// The `environment_infos` sub-object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfos {
    /// IAM instance profile name.
    #[serde(default, deserialize_with = "nullable")]
    pub instance_profile: String,
    /// EC2 key pair name.
    #[serde(default, deserialize_with = "nullable")]
    pub key_name: String,
    /// Security group ids.
    #[serde(default, deserialize_with = "nullable")]
    pub security_groups: Vec<String>,
    /// Subnets instances are spread over.
    #[serde(default, deserialize_with = "nullable")]
    pub subnet_ids: Vec<String>,
    /// Extra EBS volumes.
    #[serde(default)]
    pub optional_volumes: Option<Vec<OptionalVolume>>,
    /// Root volume settings.
    #[serde(default)]
    pub root_block_device: Option<RootBlockDevice>,
    /// Give instances a public IP.
    #[serde(default, deserialize_with = "nullable")]
    pub public_ip_address: bool,
    /// Tags put on the instances.
    #[serde(default)]
    pub instance_tags: Option<Vec<InstanceTag>>,
}

/// A provisioner feature. `parameters` is an opaque JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Feature name, e.g. `php5-fpm`.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Version or value passed to the provisioner.
    #[serde(default, deserialize_with = "nullable")]
    pub version: String,
    /// `salt` or `ansible`.
    #[serde(default, deserialize_with = "nullable")]
    pub provisioner: String,
    /// Free-form provisioner parameters.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
}

/// A deployable module. Script fields are base64-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Set by the API once the module has been deployed at least once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initialized: Option<bool>,
    /// Module name, unique within the app.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Repository URL.
    #[serde(default, deserialize_with = "nullable")]
    pub git_repo: String,
    /// `code` or `system`.
    #[serde(default, deserialize_with = "nullable")]
    pub scope: String,
    /// Install path on the instances.
    #[serde(default, deserialize_with = "nullable")]
    pub path: String,
    /// Owner uid of the installed files.
    #[serde(default, deserialize_with = "nullable")]
    pub uid: i64,
    /// Owner gid of the installed files.
    #[serde(default, deserialize_with = "nullable")]
    pub gid: i64,
    /// Build script.
    #[serde(default, deserialize_with = "nullable")]
    pub build_pack: String,
    /// Script run before each deployment.
    #[serde(default, deserialize_with = "nullable")]
    pub pre_deploy: String,
    /// Script run after each deployment.
    #[serde(default, deserialize_with = "nullable")]
    pub post_deploy: String,
    /// Script run once every instance is deployed.
    #[serde(default, deserialize_with = "nullable")]
    pub after_all_deploy: String,
    /// Revision last deployed, set by the API.
    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "String::is_empty")]
    pub last_deployment: String,
}

/// Image and bootstrap hooks. Script fields are base64-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHooks {
    /// Runs before the AMI is baked.
    #[serde(default, deserialize_with = "nullable")]
    pub pre_buildimage: String,
    /// Runs after the AMI is baked.
    #[serde(default, deserialize_with = "nullable")]
    pub post_buildimage: String,
    /// Runs before an instance bootstraps.
    #[serde(default, deserialize_with = "nullable")]
    pub pre_bootstrap: String,
    /// Runs after an instance bootstraps.
    #[serde(default, deserialize_with = "nullable")]
    pub post_bootstrap: String,
}

/// An environment variable exported to modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    /// Sent as `var_key`.
    #[serde(rename = "var_key", default, deserialize_with = "nullable")]
    pub key: String,
    /// Sent as `var_value`.
    #[serde(rename = "var_value", default, deserialize_with = "nullable")]
    pub value: String,
}

/// Autoscaling group bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autoscale {
    /// Minimum instance count.
    #[serde(default, deserialize_with = "nullable")]
    pub min: i64,
    /// Maximum instance count.
    #[serde(default, deserialize_with = "nullable")]
    pub max: i64,
    /// Collect group metrics.
    #[serde(default, deserialize_with = "nullable")]
    pub enable_metrics: bool,
    /// Autoscaling group name.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

/// Rolling deployment policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeDeployment {
    /// Seconds to wait before deploying an instance.
    #[serde(default, deserialize_with = "nullable")]
    pub wait_before_deploy: i64,
    /// Seconds to wait after deploying an instance.
    #[serde(default, deserialize_with = "nullable")]
    pub wait_after_deploy: i64,
    /// `elb`, `alb` or `haproxy`.
    #[serde(default, deserialize_with = "nullable")]
    pub load_balancer_type: String,
    /// Tag value locating the HAProxy instances.
    #[serde(default, deserialize_with = "nullable")]
    pub app_tag_value: String,
    /// HAProxy backend name.
    #[serde(default, deserialize_with = "nullable")]
    pub ha_backend: String,
    /// HAProxy API port.
    #[serde(default, deserialize_with = "nullable")]
    pub api_port: i64,
}

/// A change made since the last deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Changed field.
    #[serde(default, deserialize_with = "nullable")]
    pub field: String,
    /// Change date.
    #[serde(default, deserialize_with = "nullable")]
    pub updated: String,
    /// Who made the change.
    #[serde(default, deserialize_with = "nullable")]
    pub user: String,
}

/// A Ghost application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    /// `_id`, `_etag` and the other Eve fields.
    #[serde(flatten)]
    pub metadata: EveItemMetadata,
    /// Owner, set by the API.
    #[serde(default, deserialize_with = "nullable")]
    pub user: String,

    /// Application name.
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
    /// Environment, e.g. `prod`.
    #[serde(default, deserialize_with = "nullable")]
    pub env: String,
    /// Role, e.g. `webfront`.
    #[serde(default, deserialize_with = "nullable")]
    pub role: String,
    /// Free text.
    #[serde(default, deserialize_with = "nullable")]
    pub description: String,

    /// AWS region.
    #[serde(default, deserialize_with = "nullable")]
    pub region: String,
    /// EC2 instance type.
    #[serde(default, deserialize_with = "nullable")]
    pub instance_type: String,
    /// Detailed CloudWatch monitoring.
    #[serde(default, deserialize_with = "nullable")]
    pub instance_monitoring: bool,
    /// VPC the application lives in.
    #[serde(default, deserialize_with = "nullable")]
    pub vpc_id: String,

    /// Image and bootstrap hooks.
    #[serde(default)]
    pub lifecycle_hooks: Option<LifecycleHooks>,
    /// Addresses notified of deployments.
    #[serde(default, deserialize_with = "nullable")]
    pub log_notifications: Vec<String>,
    /// How the AMI is built.
    #[serde(default)]
    pub build_infos: Option<BuildInfos>,
    /// Where and how instances run.
    #[serde(default)]
    pub environment_infos: Option<EnvironmentInfos>,
    /// Sent as `env_vars`.
    #[serde(rename = "env_vars", default)]
    pub environment_variables: Option<Vec<EnvironmentVariable>>,
    /// Provisioner features.
    #[serde(default)]
    pub features: Option<Vec<Feature>>,
    /// Deployable modules.
    #[serde(default)]
    pub modules: Option<Vec<Module>>,
    /// Autoscaling bounds.
    #[serde(default)]
    pub autoscale: Option<Autoscale>,
    /// Sent as `safe-deployment`.
    #[serde(rename = "safe-deployment", default)]
    pub safe_deployment: Option<SafeDeployment>,
    /// Undeployed changes, set by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_changes: Option<Vec<PendingChange>>,
}

/// One page of the `/apps` collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Apps {
    /// Navigation links; `next` is set when more pages follow.
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<CollectionLinks>,
    /// Page number, page size and total count.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CollectionMeta>,
    /// The apps on this page.
    #[serde(rename = "_items", default, deserialize_with = "nullable")]
    pub items: Vec<App>,
}

impl Apps {
    /// `href` of the following page, if any.
    pub fn next_page(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| links.next.as_ref())
            .map(|link| link.href.as_str())
            .filter(|href| !href.is_empty())
    }
}
