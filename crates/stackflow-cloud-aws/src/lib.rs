//! AWS tasks for StackFlow
//!
//! This crate implements [`stackflow_cloud::Task`] for AWS resource kinds,
//! against an [`AwsCloud`] context wrapping an [`AwsApi`] client.
//!
//! # Tasks
//!
//! - [`ClassicLoadBalancer`]: Classic ELB, found by its Name tag
//! - [`Subnet`]: VPC subnet
//! - [`SecurityGroup`]: VPC security group
//!
//! # Example
//!
//! ```ignore
//! use stackflow_cloud::{Executor, ExecutorConfig, ResourceGraph, RunContext, Target};
//! use std::sync::Arc;
//! use stackflow_cloud_aws::{AwsCloud, ClassicLoadBalancer, Subnet};
//!
//! let cloud = AwsCloud::new(api, "prod.example.com", "us-east-1");
//!
//! let mut graph = ResourceGraph::new();
//! let subnet = graph.add(Subnet::new("us-east-1a.prod.example.com", "10.0.0.0/24"))?;
//! let mut elb = ClassicLoadBalancer::new("api.prod.example.com", "api-prod");
//! elb.subnets.push(subnet);
//! graph.add(elb)?;
//!
//! let ctx = RunContext::new(Arc::new(cloud), Target::Api);
//! let report = Executor::new(&ExecutorConfig::default()).run(&graph, ctx).await?;
//! ```

pub mod api;
pub mod cloud;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod tasks;

pub use api::AwsApi;
pub use cloud::{AwsCloud, CLUSTER_TAG, NAME_TAG};
pub use error::{ApiResult, AwsError};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{ApiCall, InMemoryAws};
pub use tasks::{
    AccessLogSpec, ClassicLoadBalancer, ConnectionDrainingSpec, ConnectionSettingsSpec,
    CrossZoneLoadBalancingSpec, HealthCheckSpec, ListenerSpec, LoadBalancerChanges, SecurityGroup,
    SecurityGroupChanges, Subnet, SubnetChanges,
};
