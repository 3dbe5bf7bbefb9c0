//! In-memory AWS for tests
//!
//! Keeps load balancers, subnets and security groups in process and records
//! every mutating call so tests can assert on exactly what a render did.

use crate::api::{
    AccessLogAttribute, AwsApi, ConnectionDrainingAttribute, ConnectionSettingsAttribute,
    CreateLoadBalancerRequest, CreateSecurityGroupRequest, CreateSubnetRequest,
    CrossZoneLoadBalancingAttribute, DescribePage, Filter, HealthCheck, Listener,
    LoadBalancerAttributes, LoadBalancerDescription, SecurityGroupDescription, SubnetDescription,
    Tag, TagDescription,
};
use crate::error::{ApiResult, AwsError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_PAGE_SIZE: usize = 400;

/// A mutating call, as recorded by [`InMemoryAws`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    CreateLoadBalancer(String),
    AttachSubnets { name: String, subnets: Vec<String> },
    DetachSubnets { name: String, subnets: Vec<String> },
    ApplySecurityGroups { name: String, security_groups: Vec<String> },
    DeleteListeners { name: String, ports: Vec<i32> },
    CreateListeners { name: String, ports: Vec<i32> },
    ConfigureHealthCheck(String),
    ModifyAttributes(String),
    AddTags { name: String, keys: Vec<String> },
    RemoveTags { name: String, keys: Vec<String> },
    CreateSubnet(String),
    CreateSecurityGroup(String),
    CreateTags { resource: String, keys: Vec<String> },
    DeleteTags { resource: String, keys: Vec<String> },
}

#[derive(Debug, Clone)]
struct StoredLoadBalancer {
    description: LoadBalancerDescription,
    tags: BTreeMap<String, String>,
    attributes: LoadBalancerAttributes,
}

#[derive(Debug, Default)]
struct State {
    load_balancers: BTreeMap<String, StoredLoadBalancer>,
    subnets: Vec<SubnetDescription>,
    security_groups: Vec<SecurityGroupDescription>,
    calls: Vec<ApiCall>,
    sequence: u32,
}

impl State {
    fn next_id(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    fn load_balancer(&mut self, name: &str) -> ApiResult<&mut StoredLoadBalancer> {
        self.load_balancers
            .get_mut(name)
            .ok_or_else(|| AwsError::NotFound(format!("LoadBalancer {}", name)))
    }
}

pub struct InMemoryAws {
    region: String,
    page_size: usize,
    state: Mutex<State>,
}

impl InMemoryAws {
    /// Hosted zone id reported for every load balancer
    pub const HOSTED_ZONE_ID: &'static str = "Z35SXDOTRQ7X7K";

    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutating calls so far, in order
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn load_balancer(&self, name: &str) -> Option<LoadBalancerDescription> {
        self.state()
            .load_balancers
            .get(name)
            .map(|lb| lb.description.clone())
    }

    pub fn load_balancer_tags(&self, name: &str) -> BTreeMap<String, String> {
        self.state()
            .load_balancers
            .get(name)
            .map(|lb| lb.tags.clone())
            .unwrap_or_default()
    }

    pub fn load_balancer_attributes(&self, name: &str) -> Option<LoadBalancerAttributes> {
        self.state()
            .load_balancers
            .get(name)
            .map(|lb| lb.attributes.clone())
    }

    pub fn subnets(&self) -> Vec<SubnetDescription> {
        self.state().subnets.clone()
    }

    pub fn security_groups(&self) -> Vec<SecurityGroupDescription> {
        self.state().security_groups.clone()
    }

    /// Seed an existing subnet without recording a call
    pub fn insert_subnet(&self, cidr_block: &str, tags: &[Tag]) -> String {
        let mut state = self.state();
        let subnet_id = format!("subnet-{:04}", state.next_id());
        state.subnets.push(SubnetDescription {
            subnet_id: subnet_id.clone(),
            cidr_block: Some(cidr_block.to_string()),
            tags: tags.to_vec(),
        });
        subnet_id
    }

    /// Seed an existing security group without recording a call
    pub fn insert_security_group(&self, group_name: &str, tags: &[Tag]) -> String {
        let mut state = self.state();
        let group_id = format!("sg-{:04}", state.next_id());
        state.security_groups.push(SecurityGroupDescription {
            group_id: group_id.clone(),
            group_name: group_name.to_string(),
            description: Some(group_name.to_string()),
            tags: tags.to_vec(),
        });
        group_id
    }

    fn default_attributes() -> LoadBalancerAttributes {
        LoadBalancerAttributes {
            access_log: AccessLogAttribute::default(),
            connection_draining: ConnectionDrainingAttribute {
                enabled: false,
                timeout: Some(300),
            },
            connection_settings: ConnectionSettingsAttribute {
                idle_timeout: Some(60),
            },
            cross_zone_load_balancing: CrossZoneLoadBalancingAttribute { enabled: false },
        }
    }
}

fn matches_filters(id: &str, name: Option<&str>, tags: &[Tag], id_filter: &str, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| {
        if filter.name == id_filter {
            return filter.values.iter().any(|v| v == id);
        }
        if filter.name == "group-name" {
            return name.is_some_and(|n| filter.values.iter().any(|v| v == n));
        }
        match filter.name.strip_prefix("tag:") {
            Some(key) => tags
                .iter()
                .any(|t| t.key == key && filter.values.contains(&t.value)),
            None => false,
        }
    })
}

impl State {
    fn ec2_tags(&mut self, resource_id: &str) -> ApiResult<&mut Vec<Tag>> {
        if let Some(subnet) = self.subnets.iter_mut().find(|s| s.subnet_id == resource_id) {
            return Ok(&mut subnet.tags);
        }
        self.security_groups
            .iter_mut()
            .find(|g| g.group_id == resource_id)
            .map(|g| &mut g.tags)
            .ok_or_else(|| AwsError::NotFound(format!("resource {}", resource_id)))
    }
}

fn merge_tags(target: &mut Vec<Tag>, tags: &[Tag]) {
    for tag in tags {
        match target.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value.clone(),
            None => target.push(tag.clone()),
        }
    }
}

#[async_trait]
impl AwsApi for InMemoryAws {
    async fn describe_load_balancers(
        &self,
        names: &[String],
        marker: Option<&str>,
    ) -> ApiResult<DescribePage<LoadBalancerDescription>> {
        let state = self.state();
        let all: Vec<LoadBalancerDescription> = if names.is_empty() {
            state
                .load_balancers
                .values()
                .map(|lb| lb.description.clone())
                .collect()
        } else {
            let mut selected = Vec::with_capacity(names.len());
            for name in names {
                let lb = state
                    .load_balancers
                    .get(name)
                    .ok_or_else(|| AwsError::NotFound(format!("LoadBalancer {}", name)))?;
                selected.push(lb.description.clone());
            }
            selected
        };

        let start = match marker {
            Some(marker) => marker
                .parse::<usize>()
                .map_err(|_| AwsError::InvalidRequest(format!("bad marker {:?}", marker)))?,
            None => 0,
        };
        let end = (start + self.page_size).min(all.len());
        let next_marker = (end < all.len()).then(|| end.to_string());
        Ok(DescribePage {
            items: all.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            next_marker,
        })
    }

    async fn describe_load_balancer_tags(&self, names: &[String]) -> ApiResult<Vec<TagDescription>> {
        if names.len() > 20 {
            return Err(AwsError::InvalidRequest("at most 20 load balancer names".to_string()));
        }
        let state = self.state();
        Ok(names
            .iter()
            .filter_map(|name| {
                state.load_balancers.get(name).map(|lb| TagDescription {
                    load_balancer_name: name.clone(),
                    tags: lb.tags.iter().map(|(k, v)| Tag::new(k, v)).collect(),
                })
            })
            .collect())
    }

    async fn describe_load_balancer_attributes(&self, name: &str) -> ApiResult<LoadBalancerAttributes> {
        let mut state = self.state();
        Ok(state.load_balancer(name)?.attributes.clone())
    }

    async fn create_load_balancer(&self, request: &CreateLoadBalancerRequest) -> ApiResult<String> {
        let mut state = self.state();
        let name = &request.load_balancer_name;
        if state.load_balancers.contains_key(name) {
            return Err(AwsError::service(
                "DuplicateLoadBalancerName",
                format!("load balancer {} already exists", name),
            ));
        }

        let dns_name = format!("{}-{}.{}.elb.amazonaws.com", name, state.next_id(), self.region);
        let description = LoadBalancerDescription {
            load_balancer_name: name.clone(),
            dns_name: Some(dns_name.clone()),
            canonical_hosted_zone_name_id: Some(Self::HOSTED_ZONE_ID.to_string()),
            scheme: Some(request.scheme.clone().unwrap_or_else(|| "internet-facing".to_string())),
            subnets: request.subnets.clone(),
            security_groups: request.security_groups.clone(),
            listeners: request.listeners.clone(),
            health_check: None,
        };
        state.load_balancers.insert(
            name.clone(),
            StoredLoadBalancer {
                description,
                tags: BTreeMap::new(),
                attributes: Self::default_attributes(),
            },
        );
        state.calls.push(ApiCall::CreateLoadBalancer(name.clone()));
        Ok(dns_name)
    }

    async fn attach_load_balancer_to_subnets(&self, name: &str, subnets: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        let lb = state.load_balancer(name)?;
        for subnet in subnets {
            if !lb.description.subnets.contains(subnet) {
                lb.description.subnets.push(subnet.clone());
            }
        }
        state.calls.push(ApiCall::AttachSubnets {
            name: name.to_string(),
            subnets: subnets.to_vec(),
        });
        Ok(())
    }

    async fn detach_load_balancer_from_subnets(&self, name: &str, subnets: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        let lb = state.load_balancer(name)?;
        lb.description.subnets.retain(|s| !subnets.contains(s));
        state.calls.push(ApiCall::DetachSubnets {
            name: name.to_string(),
            subnets: subnets.to_vec(),
        });
        Ok(())
    }

    async fn apply_security_groups(&self, name: &str, security_groups: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        state.load_balancer(name)?.description.security_groups = security_groups.to_vec();
        state.calls.push(ApiCall::ApplySecurityGroups {
            name: name.to_string(),
            security_groups: security_groups.to_vec(),
        });
        Ok(())
    }

    async fn delete_load_balancer_listeners(&self, name: &str, ports: &[i32]) -> ApiResult<()> {
        let mut state = self.state();
        state
            .load_balancer(name)?
            .description
            .listeners
            .retain(|l| !ports.contains(&l.load_balancer_port));
        state.calls.push(ApiCall::DeleteListeners {
            name: name.to_string(),
            ports: ports.to_vec(),
        });
        Ok(())
    }

    async fn create_load_balancer_listeners(&self, name: &str, listeners: &[Listener]) -> ApiResult<()> {
        let mut state = self.state();
        let lb = state.load_balancer(name)?;
        if let Some(dup) = listeners.iter().find(|l| {
            lb.description
                .listeners
                .iter()
                .any(|e| e.load_balancer_port == l.load_balancer_port)
        }) {
            return Err(AwsError::service(
                "DuplicateListener",
                format!("listener on port {} already exists", dup.load_balancer_port),
            ));
        }
        lb.description.listeners.extend(listeners.iter().cloned());
        state.calls.push(ApiCall::CreateListeners {
            name: name.to_string(),
            ports: listeners.iter().map(|l| l.load_balancer_port).collect(),
        });
        Ok(())
    }

    async fn configure_health_check(&self, name: &str, health_check: &HealthCheck) -> ApiResult<()> {
        let mut state = self.state();
        state.load_balancer(name)?.description.health_check = Some(health_check.clone());
        state.calls.push(ApiCall::ConfigureHealthCheck(name.to_string()));
        Ok(())
    }

    async fn modify_load_balancer_attributes(
        &self,
        name: &str,
        attributes: &LoadBalancerAttributes,
    ) -> ApiResult<()> {
        let mut state = self.state();
        state.load_balancer(name)?.attributes = attributes.clone();
        state.calls.push(ApiCall::ModifyAttributes(name.to_string()));
        Ok(())
    }

    async fn add_tags(&self, name: &str, tags: &[Tag]) -> ApiResult<()> {
        let mut state = self.state();
        let lb = state.load_balancer(name)?;
        for tag in tags {
            lb.tags.insert(tag.key.clone(), tag.value.clone());
        }
        state.calls.push(ApiCall::AddTags {
            name: name.to_string(),
            keys: tags.iter().map(|t| t.key.clone()).collect(),
        });
        Ok(())
    }

    async fn remove_tags(&self, name: &str, keys: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        let lb = state.load_balancer(name)?;
        for key in keys {
            lb.tags.remove(key);
        }
        state.calls.push(ApiCall::RemoveTags {
            name: name.to_string(),
            keys: keys.to_vec(),
        });
        Ok(())
    }

    async fn describe_subnets(&self, filters: &[Filter]) -> ApiResult<Vec<SubnetDescription>> {
        Ok(self
            .state()
            .subnets
            .iter()
            .filter(|s| matches_filters(&s.subnet_id, None, &s.tags, "subnet-id", filters))
            .cloned()
            .collect())
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> ApiResult<SubnetDescription> {
        let mut state = self.state();
        if state
            .subnets
            .iter()
            .any(|s| s.cidr_block.as_deref() == Some(request.cidr_block.as_str()))
        {
            return Err(AwsError::service(
                "InvalidSubnet.Conflict",
                format!("CIDR {} conflicts with another subnet", request.cidr_block),
            ));
        }
        let subnet = SubnetDescription {
            subnet_id: format!("subnet-{:04}", state.next_id()),
            cidr_block: Some(request.cidr_block.clone()),
            tags: request.tags.clone(),
        };
        state.subnets.push(subnet.clone());
        state.calls.push(ApiCall::CreateSubnet(request.cidr_block.clone()));
        Ok(subnet)
    }

    async fn describe_security_groups(&self, filters: &[Filter]) -> ApiResult<Vec<SecurityGroupDescription>> {
        Ok(self
            .state()
            .security_groups
            .iter()
            .filter(|g| matches_filters(&g.group_id, Some(&g.group_name), &g.tags, "group-id", filters))
            .cloned()
            .collect())
    }

    async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> ApiResult<SecurityGroupDescription> {
        let mut state = self.state();
        if state.security_groups.iter().any(|g| g.group_name == request.group_name) {
            return Err(AwsError::service(
                "InvalidGroup.Duplicate",
                format!("security group {} already exists", request.group_name),
            ));
        }
        let group = SecurityGroupDescription {
            group_id: format!("sg-{:04}", state.next_id()),
            group_name: request.group_name.clone(),
            description: Some(request.description.clone()),
            tags: request.tags.clone(),
        };
        state.security_groups.push(group.clone());
        state.calls.push(ApiCall::CreateSecurityGroup(request.group_name.clone()));
        Ok(group)
    }

    async fn create_tags(&self, resource_id: &str, tags: &[Tag]) -> ApiResult<()> {
        let mut state = self.state();
        merge_tags(state.ec2_tags(resource_id)?, tags);
        state.calls.push(ApiCall::CreateTags {
            resource: resource_id.to_string(),
            keys: tags.iter().map(|t| t.key.clone()).collect(),
        });
        Ok(())
    }

    async fn delete_tags(&self, resource_id: &str, keys: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        state.ec2_tags(resource_id)?.retain(|t| !keys.contains(&t.key));
        state.calls.push(ApiCall::DeleteTags {
            resource: resource_id.to_string(),
            keys: keys.to_vec(),
        });
        Ok(())
    }
}
