//! Classic Load Balancer reconciliation against the in-memory API

use stackflow_cloud::{
    ActionType, Executor, ResourceGraph, RunContext, RunReport, Target, TaskKey, TaskOutcome,
    TaskRef,
};
use stackflow_cloud_aws::api::{CreateLoadBalancerRequest, Listener};
use stackflow_cloud_aws::{
    ApiCall, AwsApi, AwsCloud, ClassicLoadBalancer, ConnectionDrainingSpec, HealthCheckSpec,
    InMemoryAws, ListenerSpec, SecurityGroup, Subnet,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_test::assert_ok;

const CLUSTER: &str = "prod.example.com";
const ELB: &str = "api.prod.example.com";
const ELB_NAME: &str = "api-prod";

fn cloud(api: &Arc<InMemoryAws>) -> Arc<AwsCloud> {
    Arc::new(AwsCloud::new(api.clone(), CLUSTER, "us-east-1"))
}

async fn apply(graph: &ResourceGraph<AwsCloud>, api: &Arc<InMemoryAws>) -> RunReport {
    let ctx = RunContext::new(cloud(api), Target::Api);
    assert_ok!(Executor::with_max_concurrency(4).run(graph, ctx).await)
}

fn load_balancer(
    subnets: Vec<TaskRef<Subnet>>,
    security_groups: Vec<TaskRef<SecurityGroup>>,
) -> ClassicLoadBalancer {
    ClassicLoadBalancer {
        subnets,
        security_groups,
        listeners: BTreeMap::from([
            ("443".to_string(), ListenerSpec::tcp(443)),
            ("80".to_string(), ListenerSpec::tcp(8080)),
        ]),
        health_check: Some(HealthCheckSpec {
            target: Some("TCP:8080".to_string()),
            healthy_threshold: Some(2),
            unhealthy_threshold: Some(2),
            interval: Some(10),
            timeout: Some(5),
        }),
        connection_draining: Some(ConnectionDrainingSpec {
            enabled: Some(true),
            timeout: Some(300),
        }),
        tags: BTreeMap::from([("team".to_string(), "api".to_string())]),
        ..ClassicLoadBalancer::new(ELB, ELB_NAME)
    }
}

/// Subnets by zone letter, one security group and the ELB using them all
fn graph_with_zones(
    zones: &[&str],
) -> (
    ResourceGraph<AwsCloud>,
    BTreeMap<String, TaskRef<Subnet>>,
    TaskRef<ClassicLoadBalancer>,
) {
    graph_with(zones, |_| {})
}

fn graph_with(
    zones: &[&str],
    edit: impl FnOnce(&mut ClassicLoadBalancer),
) -> (
    ResourceGraph<AwsCloud>,
    BTreeMap<String, TaskRef<Subnet>>,
    TaskRef<ClassicLoadBalancer>,
) {
    let mut graph = ResourceGraph::new();
    let mut subnets = BTreeMap::new();
    for (i, zone) in zones.iter().enumerate() {
        let subnet = Subnet::new(
            format!("us-east-1{}.{}", zone, CLUSTER),
            format!("10.0.{}.0/24", i + 1),
        );
        subnets.insert(zone.to_string(), graph.add(subnet).unwrap());
    }
    let sg = graph
        .add(SecurityGroup::new(format!("api-elb.{}", CLUSTER), "api ELB"))
        .unwrap();
    let mut lb = load_balancer(subnets.values().cloned().collect(), vec![sg]);
    edit(&mut lb);
    let elb = graph.add(lb).unwrap();
    (graph, subnets, elb)
}

fn outcome(report: &RunReport, kind: &str, name: &str) -> TaskOutcome {
    report
        .outcome(&TaskKey::new(kind, name))
        .cloned()
        .unwrap_or_else(|| panic!("no outcome for {}/{}", kind, name))
}

#[tokio::test]
async fn test_create_backfills_dns_and_zone() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, subnets, elb) = graph_with_zones(&["a", "b"]);

    let report = apply(&graph, &api).await;
    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(report.summary().create, 4);

    let elb = elb.snapshot();
    let dns_name = elb.dns_name.clone().unwrap();
    assert!(dns_name.starts_with("api-prod-"));
    assert!(dns_name.ends_with(".us-east-1.elb.amazonaws.com"));
    assert_eq!(elb.hosted_zone_id.as_deref(), Some(InMemoryAws::HOSTED_ZONE_ID));

    let created = api.load_balancer(ELB_NAME).unwrap();
    let mut expected: Vec<String> = subnets.values().filter_map(TaskRef::id).collect();
    expected.sort();
    assert_eq!(created.subnets, expected);
    assert_eq!(created.listeners.len(), 2);
    assert_eq!(created.health_check.and_then(|h| h.target).as_deref(), Some("TCP:8080"));

    let tags = api.load_balancer_tags(ELB_NAME);
    assert_eq!(tags.get("Name").map(String::as_str), Some(ELB));
    assert_eq!(tags.get("stackflow/cluster").map(String::as_str), Some(CLUSTER));
    assert_eq!(tags.get("team").map(String::as_str), Some("api"));

    let attributes = api.load_balancer_attributes(ELB_NAME).unwrap();
    assert!(attributes.connection_draining.enabled);
    assert_eq!(attributes.connection_settings.idle_timeout, Some(60));
}

#[tokio::test]
async fn test_second_run_is_noop() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, _, _) = graph_with_zones(&["a", "b"]);
    apply(&graph, &api).await;
    api.clear_calls();

    let (graph, _, elb) = graph_with_zones(&["a", "b"]);
    let report = apply(&graph, &api).await;

    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(report.summary().no_change, 4);
    assert!(api.calls().is_empty(), "{:?}", api.calls());
    assert_eq!(elb.id().as_deref(), Some(ELB_NAME));
}

#[tokio::test]
async fn test_subnet_change_detaches_and_attaches_difference() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, before, _) = graph_with_zones(&["a", "b"]);
    apply(&graph, &api).await;
    api.clear_calls();

    // Same subnet b, a swapped for c
    let mut graph = ResourceGraph::new();
    let b = graph.add(Subnet::new(format!("us-east-1b.{}", CLUSTER), "10.0.2.0/24")).unwrap();
    let c = graph.add(Subnet::new(format!("us-east-1c.{}", CLUSTER), "10.0.3.0/24")).unwrap();
    let sg = graph
        .add(SecurityGroup::new(format!("api-elb.{}", CLUSTER), "api ELB"))
        .unwrap();
    graph.add(load_balancer(vec![c.clone(), b.clone()], vec![sg])).unwrap();

    let report = apply(&graph, &api).await;
    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(
        outcome(&report, "ClassicLoadBalancer", ELB).action(),
        Some(ActionType::Update)
    );

    let id_a = before["a"].id().unwrap();
    let id_b = b.id().unwrap();
    let id_c = c.id().unwrap();
    assert_eq!(before["b"].id().as_deref(), Some(id_b.as_str()));

    let calls = api.calls();
    let detach = calls
        .iter()
        .position(|call| {
            *call
                == ApiCall::DetachSubnets {
                    name: ELB_NAME.to_string(),
                    subnets: vec![id_a.clone()],
                }
        })
        .expect("detach call");
    let attach = calls
        .iter()
        .position(|call| {
            *call
                == ApiCall::AttachSubnets {
                    name: ELB_NAME.to_string(),
                    subnets: vec![id_c.clone()],
                }
        })
        .expect("attach call");
    assert!(detach < attach);
    assert!(!calls.iter().any(|call| matches!(
        call,
        ApiCall::DetachSubnets { subnets, .. } | ApiCall::AttachSubnets { subnets, .. }
            if subnets.contains(&id_b)
    )));

    let mut expected = vec![id_b, id_c];
    expected.sort();
    let mut actual = api.load_balancer(ELB_NAME).unwrap().subnets;
    actual.sort();
    assert_eq!(actual, expected);
}

#[tokio::test]
async fn test_listener_change_replaces_all_listeners() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, _, _) = graph_with_zones(&["a"]);
    apply(&graph, &api).await;
    api.clear_calls();

    let (graph, _, _) = graph_with(&["a"], |lb| {
        lb.listeners = BTreeMap::from([("443".to_string(), ListenerSpec::ssl(8443, "arn:cert"))]);
    });
    let report = apply(&graph, &api).await;
    assert!(report.is_success(), "{:?}", report.failures());

    let calls = api.calls();
    let deleted = calls.iter().find_map(|call| match call {
        ApiCall::DeleteListeners { ports, .. } => {
            let mut ports = ports.clone();
            ports.sort();
            Some(ports)
        }
        _ => None,
    });
    assert_eq!(deleted, Some(vec![80, 443]));
    assert!(calls.contains(&ApiCall::CreateListeners {
        name: ELB_NAME.to_string(),
        ports: vec![443],
    }));

    let listeners = api.load_balancer(ELB_NAME).unwrap().listeners;
    assert_eq!(
        listeners,
        vec![Listener {
            load_balancer_port: 443,
            instance_port: 8443,
            protocol: "SSL".to_string(),
            instance_protocol: "SSL".to_string(),
            ssl_certificate_id: Some("arn:cert".to_string()),
        }]
    );
}

#[tokio::test]
async fn test_removed_tag_is_removed() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, _, _) = graph_with_zones(&["a"]);
    apply(&graph, &api).await;
    api.clear_calls();

    let (graph, _, _) = graph_with(&["a"], |lb| lb.tags.clear());
    apply(&graph, &api).await;

    assert!(api.calls().contains(&ApiCall::RemoveTags {
        name: ELB_NAME.to_string(),
        keys: vec!["team".to_string()],
    }));
    let tags = api.load_balancer_tags(ELB_NAME);
    assert!(!tags.contains_key("team"));
    assert!(tags.contains_key("Name"));
}

#[tokio::test]
async fn test_shared_load_balancer_is_discovered_but_not_touched() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, _, _) = graph_with_zones(&["a"]);
    apply(&graph, &api).await;
    api.clear_calls();

    let mut graph = ResourceGraph::new();
    let shared = graph
        .add(ClassicLoadBalancer {
            name: ELB.to_string(),
            shared: Some(true),
            ..Default::default()
        })
        .unwrap();
    let report = apply(&graph, &api).await;

    assert_eq!(
        outcome(&report, "ClassicLoadBalancer", ELB).action(),
        Some(ActionType::Skip)
    );
    assert!(api.calls().is_empty());
    assert_eq!(shared.id().as_deref(), Some(ELB_NAME));
    assert_eq!(shared.config_link().unwrap().token(), "\"api-prod\"");
}

#[tokio::test]
async fn test_find_by_alias_without_name_tag() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let dns_name = api
        .create_load_balancer(&CreateLoadBalancerRequest {
            load_balancer_name: "legacy".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut graph = ResourceGraph::new();
    let legacy = graph
        .add(ClassicLoadBalancer {
            name: "legacy.prod.example.com".to_string(),
            dns_name: Some(format!("dualstack.{}.", dns_name)),
            hosted_zone_id: Some(InMemoryAws::HOSTED_ZONE_ID.to_string()),
            shared: Some(true),
            ..Default::default()
        })
        .unwrap();
    let report = apply(&graph, &api).await;

    assert!(report.is_success(), "{:?}", report.failures());
    assert_eq!(legacy.id().as_deref(), Some("legacy"));
}

#[tokio::test]
async fn test_missing_subnets_fail_only_the_load_balancer() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let mut graph = ResourceGraph::new();
    let sg = graph
        .add(SecurityGroup::new(format!("api-elb.{}", CLUSTER), "api ELB"))
        .unwrap();
    graph.add(load_balancer(vec![], vec![sg])).unwrap();

    let report = apply(&graph, &api).await;

    assert!(!report.is_success());
    assert!(outcome(&report, "SecurityGroup", &format!("api-elb.{}", CLUSTER)).is_done());
    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, &TaskKey::new("ClassicLoadBalancer", ELB));
    assert_eq!(failures[0].1.to_string(), "Field is required: Subnets");
    assert!(api.load_balancer(ELB_NAME).is_none());
}

#[tokio::test]
async fn test_bad_listener_port_is_a_parse_error() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, _, _) = graph_with(&["a"], |lb| {
        lb.listeners = BTreeMap::from([("https".to_string(), ListenerSpec::tcp(443))]);
    });

    let report = apply(&graph, &api).await;

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.to_string().contains("https"));
    assert!(api.load_balancer(ELB_NAME).is_none());
}
