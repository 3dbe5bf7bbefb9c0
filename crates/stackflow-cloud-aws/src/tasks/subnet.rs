//! Subnet task

use super::{merged_tags, shared_link};
use crate::api::{CreateSubnetRequest, Tag};
use crate::cloud::AwsCloud;
use async_trait::async_trait;
use stackflow_cloud::{
    Changes, CloudError, ConfigTarget, Literal, Resource, Result, Task, Value, diff_field,
    diff_map,
};
use std::collections::BTreeMap;

/// A VPC subnet, found by id or by its Name tag
#[derive(Debug, Clone, Default)]
pub struct Subnet {
    pub name: String,
    pub id: Option<String>,
    pub cidr_block: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub shared: Option<bool>,
}

impl Subnet {
    pub fn new(name: impl Into<String>, cidr_block: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cidr_block: Some(cidr_block.into()),
            ..Default::default()
        }
    }

    /// An existing subnet we reference but do not manage
    pub fn shared(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: Some(id),
            shared: Some(true),
            ..Default::default()
        }
    }

    fn is_shared(&self) -> bool {
        self.shared.unwrap_or(false)
    }
}

#[derive(Debug, Default)]
pub struct SubnetChanges {
    pub cidr_block: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
}

impl Changes for SubnetChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.cidr_block.is_some() {
            fields.push("cidr_block");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        fields
    }
}

impl Resource for Subnet {
    const KIND: &'static str = "Subnet";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn config_link(&self, attribute: &str) -> Result<Literal> {
        if self.is_shared() {
            return shared_link(self.id.as_deref(), "Subnet.ID");
        }
        Ok(Literal::property("aws_subnet", &self.name, attribute))
    }
}

#[async_trait]
impl Task<AwsCloud> for Subnet {
    type Changes = SubnetChanges;

    async fn find(&mut self, cloud: &AwsCloud) -> Result<Option<Self>> {
        let Some(found) = cloud.find_subnet(self.id.as_deref(), &self.name).await? else {
            return Ok(None);
        };

        let actual = Subnet {
            name: self.name.clone(),
            id: Some(found.subnet_id.clone()),
            cidr_block: found.cidr_block,
            tags: cloud.user_tags(&self.name, &found.tags),
            shared: self.shared,
        };
        if self.id.is_none() {
            self.id = Some(found.subnet_id);
        }
        tracing::debug!("Found subnet {:?} as {:?}", self.name, self.id);
        Ok(Some(actual))
    }

    fn diff(actual: Option<&Self>, desired: &Self) -> SubnetChanges {
        SubnetChanges {
            cidr_block: diff_field(actual.map(|a| &a.cidr_block), &desired.cidr_block),
            tags: diff_map(actual.map(|a| &a.tags), &desired.tags),
        }
    }

    fn should_create(_actual: Option<&Self>, desired: &Self, _changes: &SubnetChanges) -> bool {
        !desired.is_shared()
    }

    fn check_changes(actual: Option<&Self>, desired: &Self, changes: &SubnetChanges) -> Result<()> {
        match actual {
            None => {
                if desired.cidr_block.is_none() {
                    return Err(CloudError::required("CIDR"));
                }
            }
            Some(_) => {
                if changes.cidr_block.is_some() {
                    return Err(CloudError::ImmutableField("CIDR".to_string()));
                }
            }
        }
        Ok(())
    }

    async fn render_api(
        cloud: &AwsCloud,
        actual: Option<&Self>,
        desired: &mut Self,
        changes: &SubnetChanges,
    ) -> Result<()> {
        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);

        match actual {
            None => {
                let request = CreateSubnetRequest {
                    cidr_block: desired.cidr_block.clone().unwrap_or_default(),
                    tags: tags.iter().map(|(k, v)| Tag::new(k, v)).collect(),
                };
                tracing::info!("Creating subnet {:?} with CIDR {}", desired.name, request.cidr_block);
                let created = cloud
                    .api()
                    .create_subnet(&request)
                    .await
                    .map_err(|e| CloudError::provider("error creating subnet", e))?;
                desired.id = Some(created.subnet_id);
            }
            Some(actual) => {
                if changes.tags.is_none() {
                    return Ok(());
                }
                let id = actual.id.clone().ok_or_else(|| CloudError::required("Subnet.ID"))?;
                cloud.replace_ec2_tags(&id, &tags, &actual.tags).await?;
            }
        }
        Ok(())
    }

    fn render_config(
        cloud: &AwsCloud,
        target: &ConfigTarget,
        _actual: Option<&Self>,
        desired: &Self,
        _changes: &SubnetChanges,
    ) -> Result<()> {
        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);
        let block = Value::object([
            ("cidr_block", Value::from(desired.cidr_block.clone())),
            ("tags", Value::from(tags)),
        ]);
        target.render_resource("aws_subnet", &desired.name, &block)?;
        target.add_output("subnet_ids", desired.config_link("id")?);
        Ok(())
    }
}
