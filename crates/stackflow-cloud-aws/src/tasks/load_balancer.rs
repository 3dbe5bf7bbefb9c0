//! Classic Load Balancer task
//!
//! The existing ELB is found through its Name tag rather than its ELB name:
//! tag values are unrestricted while ELB names are length limited, so the
//! two may differ. An ELB found under another name is adopted as is; it is
//! never renamed.

use super::{SecurityGroup, Subnet, config_links, merged_tags, resolved_ids, shared_link};
use crate::api::{
    AccessLogAttribute, ConnectionDrainingAttribute, ConnectionSettingsAttribute,
    CreateLoadBalancerRequest, CrossZoneLoadBalancingAttribute, HealthCheck, Listener,
    LoadBalancerAttributes,
};
use crate::cloud::AwsCloud;
use crate::error::AwsError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_cloud::task::ref_keys;
use stackflow_cloud::{
    Changes, CloudError, ConfigTarget, Literal, Resource, Result, Task, TaskKey, TaskRef, Value,
    diff_field, diff_map, diff_refs, difference, sort_refs,
};
use std::collections::BTreeMap;

const DEFAULT_DRAINING_TIMEOUT: i32 = 300;
const DEFAULT_IDLE_TIMEOUT: i32 = 60;
const INTERNAL_SCHEME: &str = "internal";

/// Listener keyed by its load balancer port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerSpec {
    pub instance_port: i32,
    /// SSL listener when set, TCP otherwise
    #[serde(default)]
    pub ssl_certificate_id: Option<String>,
}

impl ListenerSpec {
    pub fn tcp(instance_port: i32) -> Self {
        Self {
            instance_port,
            ssl_certificate_id: None,
        }
    }

    pub fn ssl(instance_port: i32, certificate_id: impl Into<String>) -> Self {
        Self {
            instance_port,
            ssl_certificate_id: Some(certificate_id.into()),
        }
    }

    fn certificate(&self) -> Option<&str> {
        self.ssl_certificate_id.as_deref().filter(|c| !c.is_empty())
    }

    fn protocol(&self) -> &'static str {
        if self.certificate().is_some() { "SSL" } else { "TCP" }
    }

    fn to_api(&self, load_balancer_port: i32) -> Listener {
        Listener {
            load_balancer_port,
            instance_port: self.instance_port,
            protocol: self.protocol().to_string(),
            instance_protocol: self.protocol().to_string(),
            ssl_certificate_id: self.certificate().map(String::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckSpec {
    pub target: Option<String>,
    pub healthy_threshold: Option<i32>,
    pub unhealthy_threshold: Option<i32>,
    pub interval: Option<i32>,
    pub timeout: Option<i32>,
}

impl From<&HealthCheck> for HealthCheckSpec {
    fn from(check: &HealthCheck) -> Self {
        Self {
            target: check.target.clone(),
            healthy_threshold: check.healthy_threshold,
            unhealthy_threshold: check.unhealthy_threshold,
            interval: check.interval,
            timeout: check.timeout,
        }
    }
}

impl From<&HealthCheckSpec> for HealthCheck {
    fn from(spec: &HealthCheckSpec) -> Self {
        Self {
            target: spec.target.clone(),
            healthy_threshold: spec.healthy_threshold,
            unhealthy_threshold: spec.unhealthy_threshold,
            interval: spec.interval,
            timeout: spec.timeout,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessLogSpec {
    pub enabled: Option<bool>,
    pub emit_interval: Option<i32>,
    pub s3_bucket_name: Option<String>,
    pub s3_bucket_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionDrainingSpec {
    pub enabled: Option<bool>,
    pub timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettingsSpec {
    pub idle_timeout: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossZoneLoadBalancingSpec {
    pub enabled: Option<bool>,
}

/// A Classic ELB
#[derive(Debug, Clone, Default)]
pub struct ClassicLoadBalancer {
    /// Logical name, matched against the Name tag
    pub name: String,

    /// Name in ELB, possibly different from `name`
    pub load_balancer_name: Option<String>,

    pub dns_name: Option<String>,
    pub hosted_zone_id: Option<String>,

    pub subnets: Vec<TaskRef<Subnet>>,
    pub security_groups: Vec<TaskRef<SecurityGroup>>,

    /// Keyed by load balancer port
    pub listeners: BTreeMap<String, ListenerSpec>,

    pub scheme: Option<String>,

    pub health_check: Option<HealthCheckSpec>,
    pub access_log: Option<AccessLogSpec>,
    pub connection_draining: Option<ConnectionDrainingSpec>,
    pub connection_settings: Option<ConnectionSettingsSpec>,
    pub cross_zone_load_balancing: Option<CrossZoneLoadBalancingSpec>,

    pub tags: BTreeMap<String, String>,

    /// External load balancer we reference but neither create nor modify
    pub shared: Option<bool>,
}

impl ClassicLoadBalancer {
    pub fn new(name: impl Into<String>, load_balancer_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            load_balancer_name: Some(load_balancer_name.into()),
            ..Default::default()
        }
    }

    fn is_shared(&self) -> bool {
        self.shared.unwrap_or(false)
    }

    /// DNS name of the existing load balancer, if any
    pub async fn find_addresses(&self, cloud: &AwsCloud) -> Result<Vec<String>> {
        let Some(lb) = cloud.find_elb_by_name_tag(&self.name).await? else {
            return Ok(Vec::new());
        };
        Ok(lb.dns_name.into_iter().filter(|d| !d.is_empty()).collect())
    }

    fn apply_attributes(&mut self, attributes: &LoadBalancerAttributes) {
        let access_log = &attributes.access_log;
        self.access_log = Some(AccessLogSpec {
            enabled: Some(access_log.enabled),
            emit_interval: access_log.emit_interval,
            s3_bucket_name: access_log.s3_bucket_name.clone(),
            s3_bucket_prefix: access_log.s3_bucket_prefix.clone(),
        });
        self.connection_draining = Some(ConnectionDrainingSpec {
            enabled: Some(attributes.connection_draining.enabled),
            timeout: attributes.connection_draining.timeout,
        });
        self.connection_settings = Some(ConnectionSettingsSpec {
            idle_timeout: attributes.connection_settings.idle_timeout,
        });
        self.cross_zone_load_balancing = Some(CrossZoneLoadBalancingSpec {
            enabled: Some(attributes.cross_zone_load_balancing.enabled),
        });
    }

    /// Attribute set to send, with unset values at their ELB defaults
    fn desired_attributes(&self) -> LoadBalancerAttributes {
        let access_log = self.access_log.clone().unwrap_or_default();
        let draining = self.connection_draining.clone().unwrap_or_default();
        let settings = self.connection_settings.clone().unwrap_or_default();
        let cross_zone = self.cross_zone_load_balancing.clone().unwrap_or_default();

        LoadBalancerAttributes {
            access_log: AccessLogAttribute {
                enabled: access_log.enabled.unwrap_or(false),
                emit_interval: access_log.emit_interval,
                s3_bucket_name: access_log.s3_bucket_name,
                s3_bucket_prefix: access_log.s3_bucket_prefix,
            },
            connection_draining: ConnectionDrainingAttribute {
                enabled: draining.enabled.unwrap_or(false),
                timeout: Some(draining.timeout.unwrap_or(DEFAULT_DRAINING_TIMEOUT)),
            },
            connection_settings: ConnectionSettingsAttribute {
                idle_timeout: Some(settings.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT)),
            },
            cross_zone_load_balancing: CrossZoneLoadBalancingAttribute {
                enabled: cross_zone.enabled.unwrap_or(false),
            },
        }
    }
}

/// Populated fields differ between actual and desired
#[derive(Debug, Default)]
pub struct LoadBalancerChanges {
    pub load_balancer_name: Option<String>,
    pub dns_name: Option<String>,
    pub hosted_zone_id: Option<String>,
    pub subnets: Vec<TaskRef<Subnet>>,
    pub security_groups: Vec<TaskRef<SecurityGroup>>,
    pub listeners: BTreeMap<String, ListenerSpec>,
    pub scheme: Option<String>,
    pub health_check: Option<HealthCheckSpec>,
    pub access_log: Option<AccessLogSpec>,
    pub connection_draining: Option<ConnectionDrainingSpec>,
    pub connection_settings: Option<ConnectionSettingsSpec>,
    pub cross_zone_load_balancing: Option<CrossZoneLoadBalancingSpec>,
    /// Full desired tag set; `Some` of an empty map removes every user tag
    pub tags: Option<BTreeMap<String, String>>,
}

impl LoadBalancerChanges {
    fn has_attribute_changes(&self) -> bool {
        self.access_log.is_some()
            || self.connection_draining.is_some()
            || self.connection_settings.is_some()
            || self.cross_zone_load_balancing.is_some()
    }
}

impl Changes for LoadBalancerChanges {
    fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("load_balancer_name", self.load_balancer_name.is_some()),
            ("dns_name", self.dns_name.is_some()),
            ("hosted_zone_id", self.hosted_zone_id.is_some()),
            ("subnets", !self.subnets.is_empty()),
            ("security_groups", !self.security_groups.is_empty()),
            ("listeners", !self.listeners.is_empty()),
            ("scheme", self.scheme.is_some()),
            ("health_check", self.health_check.is_some()),
            ("access_log", self.access_log.is_some()),
            ("connection_draining", self.connection_draining.is_some()),
            ("connection_settings", self.connection_settings.is_some()),
            ("cross_zone_load_balancing", self.cross_zone_load_balancing.is_some()),
            ("tags", self.tags.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, changed)| changed.then_some(field))
        .collect()
    }
}

fn parse_port(port: &str) -> Result<i32> {
    port.trim()
        .parse::<i32>()
        .map_err(|_| CloudError::parse("load balancer listener port", port))
}

/// Listeners with parsed ports, in port order
fn sorted_listeners(listeners: &BTreeMap<String, ListenerSpec>) -> Result<Vec<(i32, &ListenerSpec)>> {
    let mut sorted = listeners
        .iter()
        .map(|(port, spec)| Ok((parse_port(port)?, spec)))
        .collect::<Result<Vec<_>>>()?;
    sorted.sort_by_key(|(port, _)| *port);
    Ok(sorted)
}

fn api_listeners(listeners: &BTreeMap<String, ListenerSpec>) -> Result<Vec<Listener>> {
    Ok(sorted_listeners(listeners)?
        .into_iter()
        .map(|(port, spec)| spec.to_api(port))
        .collect())
}

fn provider_error(context: &str, name: &str, e: AwsError) -> CloudError {
    CloudError::provider(format!("{} {:?}", context, name), e)
}

impl Resource for ClassicLoadBalancer {
    const KIND: &'static str = "ClassicLoadBalancer";

    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> Option<String> {
        self.load_balancer_name.clone()
    }

    fn config_link(&self, attribute: &str) -> Result<Literal> {
        if self.is_shared() {
            tracing::debug!("Reusing existing ELB {:?}", self.load_balancer_name);
            return shared_link(self.load_balancer_name.as_deref(), "LoadBalancerName");
        }
        Ok(Literal::property("aws_elb", &self.name, attribute))
    }
}

#[async_trait]
impl Task<AwsCloud> for ClassicLoadBalancer {
    type Changes = LoadBalancerChanges;

    fn dependencies(&self) -> Vec<TaskKey> {
        ref_keys(&self.subnets)
            .chain(ref_keys(&self.security_groups))
            .collect()
    }

    async fn find(&mut self, cloud: &AwsCloud) -> Result<Option<Self>> {
        let mut found = cloud.find_elb_by_name_tag(&self.name).await?;
        if found.is_none() {
            if let (Some(dns_name), Some(zone)) = (self.dns_name.clone(), self.hosted_zone_id.clone()) {
                found = cloud.find_load_balancer_by_alias(&dns_name, &zone).await?;
            }
        }
        let Some(lb) = found else {
            return Ok(None);
        };

        let lb_name = lb.load_balancer_name.clone();
        let tags = cloud
            .describe_elb_tags(std::slice::from_ref(&lb_name))
            .await?
            .remove(&lb_name)
            .unwrap_or_default();

        let mut actual = ClassicLoadBalancer {
            name: self.name.clone(),
            load_balancer_name: Some(lb_name.clone()),
            dns_name: lb.dns_name.clone(),
            hosted_zone_id: lb.canonical_hosted_zone_name_id.clone(),
            subnets: lb
                .subnets
                .iter()
                .map(|id| TaskRef::new(Subnet::shared(id)))
                .collect(),
            security_groups: lb
                .security_groups
                .iter()
                .map(|id| TaskRef::new(SecurityGroup::shared(id)))
                .collect(),
            listeners: lb
                .listeners
                .iter()
                .map(|l| {
                    let spec = ListenerSpec {
                        instance_port: l.instance_port,
                        ssl_certificate_id: l.ssl_certificate_id.clone(),
                    };
                    (l.load_balancer_port.to_string(), spec)
                })
                .collect(),
            scheme: lb.scheme.clone(),
            health_check: lb.health_check.as_ref().map(HealthCheckSpec::from),
            tags: cloud.user_tags(&self.name, &tags),
            shared: self.shared,
            ..Default::default()
        };

        if let Some(attributes) = cloud.find_elb_attributes(&lb_name).await? {
            tracing::debug!("ELB attributes: {:?}", attributes);
            actual.apply_attributes(&attributes);
        }

        if self.dns_name.is_none() {
            self.dns_name = actual.dns_name.clone();
        }
        if self.hosted_zone_id.is_none() {
            self.hosted_zone_id = actual.hosted_zone_id.clone();
        }
        if self.load_balancer_name.is_none() {
            self.load_balancer_name = actual.load_balancer_name.clone();
        }
        if self.load_balancer_name != actual.load_balancer_name {
            tracing::warn!("Reusing existing load balancer with name: {:?}", lb_name);
            self.load_balancer_name = actual.load_balancer_name.clone();
        }

        tracing::debug!("Found ELB {:?} for {:?}", lb_name, self.name);
        Ok(Some(actual))
    }

    fn normalize(&mut self) {
        sort_refs(&mut self.subnets);
        sort_refs(&mut self.security_groups);
    }

    fn diff(actual: Option<&Self>, desired: &Self) -> LoadBalancerChanges {
        LoadBalancerChanges {
            load_balancer_name: diff_field(
                actual.map(|a| &a.load_balancer_name),
                &desired.load_balancer_name,
            ),
            dns_name: diff_field(actual.map(|a| &a.dns_name), &desired.dns_name),
            hosted_zone_id: diff_field(actual.map(|a| &a.hosted_zone_id), &desired.hosted_zone_id),
            subnets: diff_refs(actual.map(|a| a.subnets.as_slice()), &desired.subnets),
            security_groups: diff_refs(
                actual.map(|a| a.security_groups.as_slice()),
                &desired.security_groups,
            ),
            listeners: diff_field(actual.map(|a| &a.listeners), &desired.listeners),
            scheme: diff_field(actual.map(|a| &a.scheme), &desired.scheme),
            health_check: diff_field(actual.map(|a| &a.health_check), &desired.health_check),
            access_log: diff_field(actual.map(|a| &a.access_log), &desired.access_log),
            connection_draining: diff_field(
                actual.map(|a| &a.connection_draining),
                &desired.connection_draining,
            ),
            connection_settings: diff_field(
                actual.map(|a| &a.connection_settings),
                &desired.connection_settings,
            ),
            cross_zone_load_balancing: diff_field(
                actual.map(|a| &a.cross_zone_load_balancing),
                &desired.cross_zone_load_balancing,
            ),
            tags: diff_map(actual.map(|a| &a.tags), &desired.tags),
        }
    }

    fn should_create(
        _actual: Option<&Self>,
        desired: &Self,
        _changes: &LoadBalancerChanges,
    ) -> bool {
        !desired.is_shared()
    }

    fn check_changes(
        actual: Option<&Self>,
        desired: &Self,
        _changes: &LoadBalancerChanges,
    ) -> Result<()> {
        if actual.is_some() {
            return Ok(());
        }

        if desired.name.is_empty() {
            return Err(CloudError::required("Name"));
        }
        if !desired.is_shared() {
            if desired.security_groups.is_empty() {
                return Err(CloudError::required("SecurityGroups"));
            }
            if desired.subnets.is_empty() {
                return Err(CloudError::required("Subnets"));
            }
        }

        if let Some(access_log) = &desired.access_log {
            match access_log.enabled {
                None => return Err(CloudError::required("AccessLog.Enabled")),
                Some(true) if access_log.s3_bucket_name.is_none() => {
                    return Err(CloudError::required("AccessLog.S3BucketName"));
                }
                _ => {}
            }
        }
        if desired
            .connection_draining
            .as_ref()
            .is_some_and(|d| d.enabled.is_none())
        {
            return Err(CloudError::required("ConnectionDraining.Enabled"));
        }
        if desired
            .cross_zone_load_balancing
            .as_ref()
            .is_some_and(|c| c.enabled.is_none())
        {
            return Err(CloudError::required("CrossZoneLoadBalancing.Enabled"));
        }
        Ok(())
    }

    async fn render_api(
        cloud: &AwsCloud,
        actual: Option<&Self>,
        desired: &mut Self,
        changes: &LoadBalancerChanges,
    ) -> Result<()> {
        if desired.is_shared() {
            return Ok(());
        }
        let api = cloud.api();

        let lb_name = match actual {
            None => {
                let lb_name = desired
                    .load_balancer_name
                    .clone()
                    .ok_or_else(|| CloudError::required("LoadBalancerName"))?;

                let request = CreateLoadBalancerRequest {
                    load_balancer_name: lb_name.clone(),
                    scheme: desired.scheme.clone(),
                    subnets: resolved_ids(&desired.subnets, "Subnets")?,
                    security_groups: resolved_ids(&desired.security_groups, "SecurityGroups")?,
                    listeners: api_listeners(&desired.listeners)?,
                };

                tracing::info!("Creating ELB with Name: {:?}", lb_name);
                let dns_name = api
                    .create_load_balancer(&request)
                    .await
                    .map_err(|e| provider_error("error creating ELB", &lb_name, e))?;
                desired.dns_name = Some(dns_name);

                // The create response has no hosted zone id
                let created = cloud
                    .find_load_balancer_by_name(&lb_name)
                    .await?
                    .ok_or_else(|| {
                        provider_error(
                            "unable to find newly created ELB",
                            &lb_name,
                            AwsError::NotFound(format!("LoadBalancer {}", lb_name)),
                        )
                    })?;
                desired.hosted_zone_id = created.canonical_hosted_zone_name_id;
                lb_name
            }
            Some(actual) => {
                let lb_name = actual
                    .load_balancer_name
                    .clone()
                    .ok_or_else(|| CloudError::required("LoadBalancerName"))?;

                if !changes.subnets.is_empty() {
                    let expected = resolved_ids(&desired.subnets, "Subnets")?;
                    let current = resolved_ids(&actual.subnets, "Subnets")?;

                    let detach = difference(&current, &expected);
                    if !detach.is_empty() {
                        tracing::info!("Detaching ELB {:?} from subnets {:?}", lb_name, detach);
                        api.detach_load_balancer_from_subnets(&lb_name, &detach)
                            .await
                            .map_err(|e| provider_error("error detaching ELB from subnets", &lb_name, e))?;
                    }

                    let attach = difference(&expected, &current);
                    if !attach.is_empty() {
                        tracing::info!("Attaching ELB {:?} to subnets {:?}", lb_name, attach);
                        api.attach_load_balancer_to_subnets(&lb_name, &attach)
                            .await
                            .map_err(|e| provider_error("error attaching ELB to subnets", &lb_name, e))?;
                    }
                }

                if !changes.security_groups.is_empty() {
                    let security_groups = resolved_ids(&desired.security_groups, "SecurityGroups")?;
                    tracing::info!("Updating security groups on ELB {:?}", lb_name);
                    api.apply_security_groups(&lb_name, &security_groups)
                        .await
                        .map_err(|e| provider_error("error updating security groups on ELB", &lb_name, e))?;
                }

                if !changes.listeners.is_empty() {
                    let ports = actual
                        .listeners
                        .keys()
                        .map(|p| parse_port(p))
                        .collect::<Result<Vec<_>>>()?;
                    if !ports.is_empty() {
                        api.delete_load_balancer_listeners(&lb_name, &ports)
                            .await
                            .map_err(|e| provider_error("error deleting ELB listeners", &lb_name, e))?;
                    }

                    let listeners = api_listeners(&changes.listeners)?;
                    tracing::info!("Creating listeners on ELB {:?}", lb_name);
                    api.create_load_balancer_listeners(&lb_name, &listeners)
                        .await
                        .map_err(|e| provider_error("error creating ELB listeners", &lb_name, e))?;
                }
                lb_name
            }
        };

        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);
        cloud.add_elb_tags(&lb_name, &tags).await?;
        cloud.remove_elb_tags(&lb_name, &tags).await?;

        if let (Some(_), Some(health_check)) = (&changes.health_check, &desired.health_check) {
            tracing::info!("Configuring health checks on ELB {:?}", lb_name);
            api.configure_health_check(&lb_name, &HealthCheck::from(health_check))
                .await
                .map_err(|e| provider_error("error configuring health checks on ELB", &lb_name, e))?;
        }

        if changes.has_attribute_changes() {
            tracing::info!("Modifying attributes of ELB {:?}", lb_name);
            api.modify_load_balancer_attributes(&lb_name, &desired.desired_attributes())
                .await
                .map_err(|e| provider_error("error modifying ELB attributes", &lb_name, e))?;
        }

        Ok(())
    }

    fn render_config(
        cloud: &AwsCloud,
        target: &ConfigTarget,
        _actual: Option<&Self>,
        desired: &Self,
        _changes: &LoadBalancerChanges,
    ) -> Result<()> {
        if desired.is_shared() {
            return Ok(());
        }
        let lb_name = desired
            .load_balancer_name
            .as_ref()
            .ok_or_else(|| CloudError::required("LoadBalancerName"))?;

        let mut fields: Vec<(&str, Value)> = vec![
            ("name", Value::from(lb_name)),
            ("subnets", Value::literals(config_links(&desired.subnets)?)),
            (
                "security_groups",
                Value::literals(config_links(&desired.security_groups)?),
            ),
        ];

        let listeners = sorted_listeners(&desired.listeners)?
            .into_iter()
            .map(|(port, spec)| {
                let mut listener = vec![
                    ("instance_port", Value::from(spec.instance_port)),
                    ("instance_protocol", Value::from(spec.protocol())),
                    ("lb_port", Value::from(port)),
                    ("lb_protocol", Value::from(spec.protocol())),
                ];
                if let Some(cert) = spec.certificate() {
                    listener.push(("ssl_certificate_id", Value::from(cert)));
                }
                Value::object(listener)
            })
            .collect();
        fields.push(("listener", Value::List(listeners)));

        if desired.scheme.as_deref() == Some(INTERNAL_SCHEME) {
            fields.push(("internal", Value::from(true)));
        }

        if let Some(check) = &desired.health_check {
            fields.push((
                "health_check",
                Value::object([
                    ("target", Value::from(check.target.clone())),
                    ("healthy_threshold", Value::from(check.healthy_threshold)),
                    ("unhealthy_threshold", Value::from(check.unhealthy_threshold)),
                    ("interval", Value::from(check.interval)),
                    ("timeout", Value::from(check.timeout)),
                ]),
            ));
        }

        if let Some(log) = desired.access_log.as_ref().filter(|l| l.enabled == Some(true)) {
            fields.push((
                "access_logs",
                Value::object([
                    ("enabled", Value::from(log.enabled)),
                    ("interval", Value::from(log.emit_interval)),
                    ("bucket", Value::from(log.s3_bucket_name.clone())),
                    ("bucket_prefix", Value::from(log.s3_bucket_prefix.clone())),
                ]),
            ));
        }

        if let Some(draining) = &desired.connection_draining {
            fields.push(("connection_draining", Value::from(draining.enabled)));
            fields.push(("connection_draining_timeout", Value::from(draining.timeout)));
        }
        if let Some(settings) = &desired.connection_settings {
            fields.push(("idle_timeout", Value::from(settings.idle_timeout)));
        }
        if let Some(cross_zone) = &desired.cross_zone_load_balancing {
            fields.push(("cross_zone_load_balancing", Value::from(cross_zone.enabled)));
        }

        let tags = merged_tags(cloud.build_tags(Some(desired.name.as_str())), &desired.tags);
        fields.push(("tags", Value::from(tags)));

        target.render_resource("aws_elb", &desired.name, &Value::object(fields))
    }
}
