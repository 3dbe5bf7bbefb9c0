//! Cloud context handed to AWS tasks
//!
//! Wraps an [`AwsApi`] with the lookups the tasks share: paginated load
//! balancer listing, lookups by name, Name tag or DNS alias, and tag
//! reconciliation.

use crate::api::{
    AwsApi, Filter, LoadBalancerAttributes, LoadBalancerDescription, SecurityGroupDescription,
    SubnetDescription, Tag,
};
use crate::error::AwsError;
use stackflow_cloud::{CloudError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Tag holding the logical name of a resource
pub const NAME_TAG: &str = "Name";

/// Tag marking resources owned by a cluster
pub const CLUSTER_TAG: &str = "stackflow/cluster";

/// Tags with this prefix are managed by AWS and never reconciled
const SYSTEM_TAG_PREFIX: &str = "aws:";

/// CloudFormation stack tags are not part of the actual state
const CLOUDFORMATION_TAG_PREFIX: &str = "aws:cloudformation:";

/// Maximum names per DescribeTags call
const TAG_BATCH_SIZE: usize = 20;

const ELB_KIND: &str = "ELB";

pub struct AwsCloud {
    api: Arc<dyn AwsApi>,
    cluster_name: String,
    region: String,
}

impl AwsCloud {
    pub fn new(api: Arc<dyn AwsApi>, cluster_name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            api,
            cluster_name: cluster_name.into(),
            region: region.into(),
        }
    }

    pub fn api(&self) -> &dyn AwsApi {
        self.api.as_ref()
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Tags every resource of the cluster carries
    pub fn build_tags(&self, name: Option<&str>) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::from([(CLUSTER_TAG.to_string(), self.cluster_name.clone())]);
        if let Some(name) = name {
            tags.insert(NAME_TAG.to_string(), name.to_string());
        }
        tags
    }

    /// Drop tags that are not part of a resource's desired tags: system tags
    /// and the ones [`build_tags`](Self::build_tags) adds
    pub fn user_tags(&self, name: &str, tags: &[Tag]) -> BTreeMap<String, String> {
        let owned = self.build_tags(Some(name));
        tags.iter()
            .filter(|t| !t.key.starts_with(CLOUDFORMATION_TAG_PREFIX))
            .filter(|t| owned.get(&t.key) != Some(&t.value))
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect()
    }

    /// All load balancers accepted by `filter`, following pagination
    pub async fn describe_load_balancers<F>(
        &self,
        names: &[String],
        filter: F,
    ) -> std::result::Result<Vec<LoadBalancerDescription>, AwsError>
    where
        F: Fn(&LoadBalancerDescription) -> bool + Send,
    {
        let mut found = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let page = self
                .api
                .describe_load_balancers(names, marker.as_deref())
                .await?;
            found.extend(page.items.into_iter().filter(|lb| filter(lb)));
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(found)
    }

    /// Load balancer by its ELB name; `None` when it does not exist
    pub async fn find_load_balancer_by_name(&self, name: &str) -> Result<Option<LoadBalancerDescription>> {
        let names = [name.to_string()];
        let found = match self
            .describe_load_balancers(&names, |lb| {
                if lb.load_balancer_name == name {
                    return true;
                }
                tracing::warn!("Got ELB with unexpected name: {:?}", lb.load_balancer_name);
                false
            })
            .await
        {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(CloudError::provider("error listing ELBs", e)),
        };
        single(found, name)
    }

    /// Load balancer behind a DNS alias
    ///
    /// Matches the canonical hosted zone and the DNS name, with or without
    /// the `dualstack.` prefix and trailing dot.
    pub async fn find_load_balancer_by_alias(
        &self,
        dns_name: &str,
        hosted_zone_id: &str,
    ) -> Result<Option<LoadBalancerDescription>> {
        let wanted = dns_name.trim_end_matches('.');
        if wanted.is_empty() {
            return Err(CloudError::required("DNSName"));
        }

        let found = self
            .describe_load_balancers(&[], |lb| {
                if lb.canonical_hosted_zone_name_id.as_deref() != Some(hosted_zone_id) {
                    return false;
                }
                let lb_dns = lb.dns_name.as_deref().unwrap_or_default().trim_end_matches('.');
                !lb_dns.is_empty() && (lb_dns == wanted || format!("dualstack.{}", lb_dns) == wanted)
            })
            .await
            .map_err(|e| CloudError::provider("error listing ELBs", e))?;
        single(found, dns_name)
    }

    /// Load balancer of this cluster whose Name tag is `name`
    pub async fn find_elb_by_name_tag(&self, name: &str) -> Result<Option<LoadBalancerDescription>> {
        let all = self
            .describe_load_balancers(&[], |_| true)
            .await
            .map_err(|e| CloudError::provider("error listing ELBs", e))?;
        if all.is_empty() {
            return Ok(None);
        }

        let names: Vec<String> = all.iter().map(|lb| lb.load_balancer_name.clone()).collect();
        let tags = self.describe_elb_tags(&names).await?;

        let matches: Vec<LoadBalancerDescription> = all
            .into_iter()
            .filter(|lb| {
                let Some(tags) = tags.get(&lb.load_balancer_name) else {
                    return false;
                };
                has_tag(tags, NAME_TAG, name) && has_tag(tags, CLUSTER_TAG, &self.cluster_name)
            })
            .collect();
        tracing::debug!("Found {} ELBs with Name tag {:?}", matches.len(), name);
        single(matches, name)
    }

    /// Tags of the given load balancers, keyed by ELB name
    pub async fn describe_elb_tags(&self, names: &[String]) -> Result<BTreeMap<String, Vec<Tag>>> {
        let mut out = BTreeMap::new();
        for batch in names.chunks(TAG_BATCH_SIZE) {
            let descriptions = self
                .api
                .describe_load_balancer_tags(batch)
                .await
                .map_err(|e| CloudError::provider("error listing ELB tags", e))?;
            for description in descriptions {
                out.insert(description.load_balancer_name, description.tags);
            }
        }
        Ok(out)
    }

    /// Attributes of a load balancer; `None` when it does not exist
    pub async fn find_elb_attributes(&self, name: &str) -> Result<Option<LoadBalancerAttributes>> {
        match self.api.describe_load_balancer_attributes(name).await {
            Ok(attributes) => Ok(Some(attributes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(CloudError::provider("error querying ELB attributes", e)),
        }
    }

    /// Add desired tags that are missing or carry another value
    pub async fn add_elb_tags(&self, name: &str, desired: &BTreeMap<String, String>) -> Result<()> {
        let actual = self.current_elb_tags(name).await?;
        let add: Vec<Tag> = desired
            .iter()
            .filter(|(k, v)| actual.get(*k) != Some(*v))
            .map(|(k, v)| Tag::new(k, v))
            .collect();
        if add.is_empty() {
            return Ok(());
        }

        tracing::info!("Adding {} tags to ELB {:?}", add.len(), name);
        self.api
            .add_tags(name, &add)
            .await
            .map_err(|e| CloudError::provider("error adding tags to ELB", e))
    }

    /// Remove tags that are not desired, leaving system tags alone
    pub async fn remove_elb_tags(&self, name: &str, desired: &BTreeMap<String, String>) -> Result<()> {
        let actual = self.current_elb_tags(name).await?;
        let remove: Vec<String> = actual
            .into_keys()
            .filter(|k| !k.starts_with(SYSTEM_TAG_PREFIX) && !desired.contains_key(k))
            .collect();
        if remove.is_empty() {
            return Ok(());
        }

        tracing::info!("Removing tags {:?} from ELB {:?}", remove, name);
        self.api
            .remove_tags(name, &remove)
            .await
            .map_err(|e| CloudError::provider("error removing tags from ELB", e))
    }

    async fn current_elb_tags(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let mut tags = self.describe_elb_tags(&[name.to_string()]).await?;
        Ok(tags
            .remove(name)
            .unwrap_or_default()
            .into_iter()
            .map(|t| (t.key, t.value))
            .collect())
    }

    /// Overwrite the tags of an EC2 resource with `tags`, then delete the
    /// keys of `previous` that are no longer wanted
    pub async fn replace_ec2_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
        previous: &BTreeMap<String, String>,
    ) -> Result<()> {
        let add: Vec<Tag> = tags.iter().map(|(k, v)| Tag::new(k, v)).collect();
        tracing::info!("Updating tags on {}", resource_id);
        self.api
            .create_tags(resource_id, &add)
            .await
            .map_err(|e| CloudError::provider(format!("error tagging {}", resource_id), e))?;

        let stale: Vec<String> = previous
            .keys()
            .filter(|k| !k.starts_with(SYSTEM_TAG_PREFIX) && !tags.contains_key(*k))
            .cloned()
            .collect();
        if stale.is_empty() {
            return Ok(());
        }
        tracing::info!("Removing tags {:?} from {}", stale, resource_id);
        self.api
            .delete_tags(resource_id, &stale)
            .await
            .map_err(|e| CloudError::provider(format!("error untagging {}", resource_id), e))
    }

    /// Subnet by id, or by Name tag within the cluster
    pub async fn find_subnet(&self, id: Option<&str>, name: &str) -> Result<Option<SubnetDescription>> {
        let filters = self.lookup_filters("subnet-id", id, name);
        let found = match self.api.describe_subnets(&filters).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(CloudError::provider("error listing subnets", e)),
        };
        single_of("Subnet", found, name)
    }

    /// Security group by id, or by Name tag within the cluster
    pub async fn find_security_group(
        &self,
        id: Option<&str>,
        name: &str,
    ) -> Result<Option<SecurityGroupDescription>> {
        let filters = self.lookup_filters("group-id", id, name);
        let found = match self.api.describe_security_groups(&filters).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(CloudError::provider("error listing security groups", e)),
        };
        single_of("SecurityGroup", found, name)
    }

    fn lookup_filters(&self, id_filter: &str, id: Option<&str>, name: &str) -> Vec<Filter> {
        match id {
            Some(id) => vec![Filter::new(id_filter, id)],
            None => vec![
                Filter::tag(NAME_TAG, name),
                Filter::tag(CLUSTER_TAG, self.cluster_name.clone()),
            ],
        }
    }
}

fn has_tag(tags: &[Tag], key: &str, value: &str) -> bool {
    tags.iter().any(|t| t.key == key && t.value == value)
}

fn single(found: Vec<LoadBalancerDescription>, identity: &str) -> Result<Option<LoadBalancerDescription>> {
    single_of(ELB_KIND, found, identity)
}

fn single_of<T>(kind: &str, mut found: Vec<T>, identity: &str) -> Result<Option<T>> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(CloudError::ambiguous(kind, identity)),
    }
}
