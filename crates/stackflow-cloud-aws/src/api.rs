//! AWS API collaborator
//!
//! The subset of the Elastic Load Balancing and EC2 APIs the tasks need.
//! Implementations wrap a real SDK client; tests use
//! [`InMemoryAws`](crate::memory::InMemoryAws).

use crate::error::ApiResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// EC2 describe filter, e.g. `tag:Name` = [`api`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: vec![value.into()],
        }
    }

    pub fn tag(key: &str, value: impl Into<String>) -> Self {
        Self::new(format!("tag:{}", key), value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listener {
    pub load_balancer_port: i32,
    pub instance_port: i32,
    pub protocol: String,
    pub instance_protocol: String,
    pub ssl_certificate_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub target: Option<String>,
    pub healthy_threshold: Option<i32>,
    pub unhealthy_threshold: Option<i32>,
    pub interval: Option<i32>,
    pub timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerDescription {
    pub load_balancer_name: String,
    pub dns_name: Option<String>,
    pub canonical_hosted_zone_name_id: Option<String>,
    pub scheme: Option<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub listeners: Vec<Listener>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogAttribute {
    pub enabled: bool,
    pub emit_interval: Option<i32>,
    pub s3_bucket_name: Option<String>,
    pub s3_bucket_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDrainingAttribute {
    pub enabled: bool,
    pub timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettingsAttribute {
    pub idle_timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossZoneLoadBalancingAttribute {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerAttributes {
    pub access_log: AccessLogAttribute,
    pub connection_draining: ConnectionDrainingAttribute,
    pub connection_settings: ConnectionSettingsAttribute,
    pub cross_zone_load_balancing: CrossZoneLoadBalancingAttribute,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLoadBalancerRequest {
    pub load_balancer_name: String,
    pub scheme: Option<String>,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    pub listeners: Vec<Listener>,
}

/// One page of a paginated describe call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescribePage<T> {
    pub items: Vec<T>,
    /// Marker for the next page, `None` on the last one
    pub next_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDescription {
    pub load_balancer_name: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetDescription {
    pub subnet_id: String,
    pub cidr_block: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupDescription {
    pub group_id: String,
    pub group_name: String,
    pub description: Option<String>,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSubnetRequest {
    pub cidr_block: String,
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSecurityGroupRequest {
    pub group_name: String,
    pub description: String,
    pub tags: Vec<Tag>,
}

/// AWS operations used by the tasks
///
/// A missing resource is reported as [`AwsError::NotFound`](crate::AwsError::NotFound);
/// callers turn it into absence.
#[async_trait]
pub trait AwsApi: Send + Sync {
    /// One page of load balancers; all of them when `names` is empty
    async fn describe_load_balancers(
        &self,
        names: &[String],
        marker: Option<&str>,
    ) -> ApiResult<DescribePage<LoadBalancerDescription>>;

    /// At most 20 names per call
    async fn describe_load_balancer_tags(&self, names: &[String]) -> ApiResult<Vec<TagDescription>>;

    async fn describe_load_balancer_attributes(&self, name: &str) -> ApiResult<LoadBalancerAttributes>;

    /// Returns the DNS name of the new load balancer
    async fn create_load_balancer(&self, request: &CreateLoadBalancerRequest) -> ApiResult<String>;

    async fn attach_load_balancer_to_subnets(&self, name: &str, subnets: &[String]) -> ApiResult<()>;

    async fn detach_load_balancer_from_subnets(&self, name: &str, subnets: &[String]) -> ApiResult<()>;

    async fn apply_security_groups(&self, name: &str, security_groups: &[String]) -> ApiResult<()>;

    async fn delete_load_balancer_listeners(&self, name: &str, ports: &[i32]) -> ApiResult<()>;

    async fn create_load_balancer_listeners(&self, name: &str, listeners: &[Listener]) -> ApiResult<()>;

    async fn configure_health_check(&self, name: &str, health_check: &HealthCheck) -> ApiResult<()>;

    async fn modify_load_balancer_attributes(
        &self,
        name: &str,
        attributes: &LoadBalancerAttributes,
    ) -> ApiResult<()>;

    async fn add_tags(&self, name: &str, tags: &[Tag]) -> ApiResult<()>;

    async fn remove_tags(&self, name: &str, keys: &[String]) -> ApiResult<()>;

    async fn describe_subnets(&self, filters: &[Filter]) -> ApiResult<Vec<SubnetDescription>>;

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> ApiResult<SubnetDescription>;

    async fn describe_security_groups(&self, filters: &[Filter]) -> ApiResult<Vec<SecurityGroupDescription>>;

    async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> ApiResult<SecurityGroupDescription>;

    /// Add or overwrite tags on an EC2 resource
    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()>;

    async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> ApiResult<()>;
}
