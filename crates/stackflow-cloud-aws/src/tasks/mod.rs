//! AWS resource tasks

pub mod load_balancer;
pub mod security_group;
pub mod subnet;

pub use load_balancer::{
    AccessLogSpec, ClassicLoadBalancer, ConnectionDrainingSpec, ConnectionSettingsSpec,
    CrossZoneLoadBalancingSpec, HealthCheckSpec, ListenerSpec, LoadBalancerChanges,
};
pub use security_group::{SecurityGroup, SecurityGroupChanges};
pub use subnet::{Subnet, SubnetChanges};

use stackflow_cloud::{CloudError, Literal, Resource, Result, TaskRef};
use std::collections::BTreeMap;

/// Resolved ids of a reference list, sorted
///
/// Every referenced task must have run first; an unresolved id is a
/// `RequiredField` error for `field`.
pub(crate) fn resolved_ids<T: Resource>(refs: &[TaskRef<T>], field: &str) -> Result<Vec<String>> {
    let mut ids = refs
        .iter()
        .map(|r| {
            r.id()
                .ok_or_else(|| CloudError::required(format!("{}.ID ({})", field, r.name())))
        })
        .collect::<Result<Vec<_>>>()?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// Deferred links of a reference list, sorted by token
pub(crate) fn config_links<T: Resource>(refs: &[TaskRef<T>]) -> Result<Vec<Literal>> {
    let mut links = refs.iter().map(TaskRef::config_link).collect::<Result<Vec<_>>>()?;
    stackflow_cloud::sort_literals(&mut links);
    Ok(links)
}

/// Literal link to a shared resource, which has no block of its own
pub(crate) fn shared_link(id: Option<&str>, field: &str) -> Result<Literal> {
    id.map(Literal::string)
        .ok_or_else(|| CloudError::required(field))
}

/// Cluster tags merged with the task's own; task tags win
pub(crate) fn merged_tags(
    base: BTreeMap<String, String>,
    tags: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = base;
    merged.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
