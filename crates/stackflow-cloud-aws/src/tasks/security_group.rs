//! Security group task

use super::{merged_tags, shared_link};
use crate::api::{CreateSecurityGroupRequest, Tag};
use crate::cloud::AwsCloud;
use async_trait::async_trait;
use stackflow_cloud::{
    Changes, CloudError, ConfigTarget, Literal, Resource, Result, Task, Value, diff_field,
    diff_map,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct SecurityGroup {
    /// Logical name, also used as the group name
    pub name: String,
    pub id: Option<String>,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub shared: Option<bool>,
}

impl SecurityGroup {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            ..Default::default()
        }
    }

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
pub struct SecurityGroupChanges {
    pub description: Option<String>,
    pub tags: Option<BTreeMap<String, String>>,
}

impl Changes for SecurityGroupChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.description.is_some() {
            fields.push("description");
        }
        if self.tags.is_some() {
            fields.push("tags");
        }
        fields
    }
}

impl Resource for SecurityGroup {
    const KIND: &'static str = "SecurityGroup";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn config_link(&self, attribute: &str) -> Result<Literal> {
        if self.is_shared() {
            return shared_link(self.id.as_deref(), "SecurityGroup.ID");
        }
        Ok(Literal::property("aws_security_group", &self.name, attribute))
    }
}

#[async_trait]
impl Task<AwsCloud> for SecurityGroup {
    type Changes = SecurityGroupChanges;

    async fn find(&mut self, cloud: &AwsCloud) -> Result<Option<Self>> {
        let Some(found) = cloud
            .find_security_group(self.id.as_deref(), &self.name)
            .await?
        else {
            return Ok(None);
        };

        let actual = SecurityGroup {
            name: self.name.clone(),
            id: Some(found.group_id.clone()),
            description: found.description,
            tags: cloud.user_tags(&self.name, &found.tags),
            shared: self.shared,
        };
        if self.id.is_none() {
            self.id = Some(found.group_id);
        }
        Ok(Some(actual))
    }

    fn diff(actual: Option<&Self>, desired: &Self) -> SecurityGroupChanges {
        SecurityGroupChanges {
            description: diff_field(actual.map(|a| &a.description), &desired.description),
            tags: diff_map(actual.map(|a| &a.tags), &desired.tags),
        }
    }

    fn should_create(_actual: Option<&Self>, desired: &Self, _changes: &SecurityGroupChanges) -> bool {
        !desired.is_shared()
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        changes: &SecurityGroupChanges,
    ) -> Result<()> {
        if actual.is_none() && desired.description.is_none() {
            return Err(CloudError::required("Description"));
        }
        if actual.is_some() && changes.description.is_some() {
            return Err(CloudError::ImmutableField("Description".to_string()));
        }
        Ok(())
    }

    async fn render_api(
        cloud: &AwsCloud,
        actual: Option<&Self>,
        desired: &mut Self,
        changes: &SecurityGroupChanges,
    ) -> Result<()> {
        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);

        let Some(actual) = actual else {
            let request = CreateSecurityGroupRequest {
                group_name: desired.name.clone(),
                description: desired.description.clone().unwrap_or_default(),
                tags: tags.iter().map(|(k, v)| Tag::new(k, v)).collect(),
            };
            tracing::info!("Creating security group {:?}", desired.name);
            let created = cloud
                .api()
                .create_security_group(&request)
                .await
                .map_err(|e| CloudError::provider("error creating security group", e))?;
            desired.id = Some(created.group_id);
            return Ok(());
        };

        if changes.tags.is_some() {
            let id = actual
                .id
                .clone()
                .ok_or_else(|| CloudError::required("SecurityGroup.ID"))?;
            cloud.replace_ec2_tags(&id, &tags, &actual.tags).await?;
        }
        Ok(())
    }

    fn render_config(
        cloud: &AwsCloud,
        target: &ConfigTarget,
        _actual: Option<&Self>,
        desired: &Self,
        _changes: &SecurityGroupChanges,
    ) -> Result<()> {
        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);
        let block = Value::object([
            ("name", Value::from(&desired.name)),
            ("description", Value::from(desired.description.clone())),
            ("tags", Value::from(tags)),
        ]);
        target.render_resource("aws_security_group", &desired.name, &block)?;
        target.add_output("security_group_ids", desired.config_link("id")?);
        Ok(())
    }
}
