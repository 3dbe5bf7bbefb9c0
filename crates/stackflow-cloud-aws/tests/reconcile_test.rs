//! Whole-stack runs in each mode

use stackflow_cloud::value::sanitize_name;
use stackflow_cloud::{
    ActionType, ConfigTarget, DryRunTarget, Executor, OutputWriter, ResourceGraph, RunContext,
    RunReport, Target, Task, TaskKey, TaskOutcome, TaskRef,
};
use stackflow_cloud_aws::api::Tag;
use stackflow_cloud_aws::{
    ApiCall, AwsCloud, CLUSTER_TAG, ClassicLoadBalancer, ConnectionDrainingSpec,
    CrossZoneLoadBalancingSpec, HealthCheckSpec, InMemoryAws, ListenerSpec, NAME_TAG,
    SecurityGroup, Subnet,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tempfile::tempdir;
use tokio_test::assert_ok;

const CLUSTER: &str = "prod.example.com";
const ELB: &str = "api.prod.example.com";

/// The ELB without its references
fn api_prod() -> ClassicLoadBalancer {
    ClassicLoadBalancer {
        listeners: BTreeMap::from([
            ("443".to_string(), ListenerSpec::ssl(8443, "arn:aws:acm:cert")),
            ("80".to_string(), ListenerSpec::tcp(8080)),
        ]),
        scheme: Some("internal".to_string()),
        health_check: Some(HealthCheckSpec {
            target: Some("TCP:8080".to_string()),
            healthy_threshold: Some(2),
            unhealthy_threshold: Some(2),
            interval: Some(10),
            timeout: Some(5),
        }),
        connection_draining: Some(ConnectionDrainingSpec {
            enabled: Some(true),
            timeout: Some(120),
        }),
        cross_zone_load_balancing: Some(CrossZoneLoadBalancingSpec {
            enabled: Some(false),
        }),
        ..ClassicLoadBalancer::new(ELB, "api-prod")
    }
}

fn stack() -> ResourceGraph<AwsCloud> {
    stack_with_elb().0
}

fn stack_with_elb() -> (ResourceGraph<AwsCloud>, TaskRef<ClassicLoadBalancer>) {
    let mut graph = ResourceGraph::new();
    let a = graph
        .add(Subnet::new("us-east-1a.prod.example.com", "10.0.1.0/24"))
        .unwrap();
    let b = graph
        .add(Subnet::new("us-east-1b.prod.example.com", "10.0.2.0/24"))
        .unwrap();
    let sg = graph
        .add(SecurityGroup::new("api-elb.prod.example.com", "api ELB"))
        .unwrap();
    let elb = graph
        .add(ClassicLoadBalancer {
            subnets: vec![b, a],
            security_groups: vec![sg],
            ..api_prod()
        })
        .unwrap();
    (graph, elb)
}

async fn run(graph: &ResourceGraph<AwsCloud>, api: &Arc<InMemoryAws>, target: Target) -> RunReport {
    let cloud = Arc::new(AwsCloud::new(api.clone(), CLUSTER, "us-east-1"));
    let report = assert_ok!(
        Executor::with_max_concurrency(2)
            .run(graph, RunContext::new(cloud, target))
            .await
    );
    assert!(report.is_success(), "{:?}", report.failures());
    report
}

async fn render_config(api: &Arc<InMemoryAws>) -> String {
    render_graph(&stack(), api).await
}

async fn render_graph(graph: &ResourceGraph<AwsCloud>, api: &Arc<InMemoryAws>) -> String {
    let target = Arc::new(ConfigTarget::new());
    run(graph, api, Target::Config(target.clone())).await;
    target.finish()
}

/// Lines of one resource block, without its header and closing brace
fn block<'a>(config: &'a str, kind: &str, name: &str) -> Vec<&'a str> {
    let header = format!("resource \"{}\" \"{}\" {{", kind, sanitize_name(name));
    config
        .lines()
        .skip_while(|line| *line != header)
        .skip(1)
        .take_while(|line| *line != "}")
        .collect()
}

/// Tokens of a top-level `key = [a, b]` attribute
fn list_tokens(block: &[&str], key: &str) -> Vec<String> {
    let prefix = format!("  {} = [", key);
    let line = block
        .iter()
        .find_map(|line| line.strip_prefix(prefix.as_str()))
        .unwrap_or_else(|| panic!("no {} in block", key));
    line.trim_end_matches(']')
        .split(", ")
        .map(String::from)
        .collect()
}

#[tokio::test]
async fn test_dry_run_does_not_mutate() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let target = Arc::new(DryRunTarget::new());

    let report = run(&stack(), &api, Target::DryRun(target.clone())).await;

    assert!(api.calls().is_empty(), "{:?}", api.calls());
    assert!(api.load_balancer("api-prod").is_none());
    assert_eq!(report.summary().create, 4);

    let plan = target.plan();
    assert!(plan.has_changes);
    assert_eq!(plan.actions.len(), 4);
    assert_eq!(plan.actions_by_type(ActionType::Create).len(), 4);

    let elb = &plan.actions[0];
    assert_eq!(elb.task, TaskKey::new("ClassicLoadBalancer", ELB));
    for field in ["load_balancer_name", "subnets", "security_groups", "listeners", "health_check"] {
        assert!(elb.changed_fields.iter().any(|f| f == field), "missing {}", field);
    }
}

#[tokio::test]
async fn test_dry_run_after_apply_reports_update() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    run(&stack(), &api, Target::Api).await;
    api.clear_calls();

    // b dropped from the ELB
    let mut graph = ResourceGraph::new();
    let a = graph
        .add(Subnet::new("us-east-1a.prod.example.com", "10.0.1.0/24"))
        .unwrap();
    let sg = graph
        .add(SecurityGroup::new("api-elb.prod.example.com", "api ELB"))
        .unwrap();
    graph
        .add(ClassicLoadBalancer {
            subnets: vec![a],
            security_groups: vec![sg],
            ..api_prod()
        })
        .unwrap();

    let target = Arc::new(DryRunTarget::new());
    run(&graph, &api, Target::DryRun(target.clone())).await;

    assert!(api.calls().is_empty());
    let plan = target.plan();
    let updates = plan.actions_by_type(ActionType::Update);
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].task, TaskKey::new("ClassicLoadBalancer", ELB));
    assert_eq!(updates[0].changed_fields, vec!["subnets".to_string()]);
}

#[tokio::test]
async fn test_config_output() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let config = render_config(&api).await;

    assert!(api.calls().is_empty());
    assert!(config.contains("resource \"aws_elb\" \"api-prod-example-com\" {\n"));
    assert!(config.contains("  name = \"api-prod\"\n"));
    assert!(config.contains("  internal = true\n"));
    assert!(config.contains(
        "  subnets = [aws_subnet.us-east-1a-prod-example-com.id, aws_subnet.us-east-1b-prod-example-com.id]\n"
    ));
    assert!(config.contains("  security_groups = [aws_security_group.api-elb-prod-example-com.id]\n"));
    assert!(config.contains("  connection_draining = true\n"));
    assert!(config.contains("  connection_draining_timeout = 120\n"));
    assert!(config.contains("  cross_zone_load_balancing = false\n"));
    assert!(config.contains("    target = \"TCP:8080\"\n"));
    assert!(config.contains("    ssl_certificate_id = \"arn:aws:acm:cert\"\n"));
    assert!(config.contains("    \"stackflow/cluster\" = \"prod.example.com\"\n"));
    assert!(!config.contains("access_logs"));

    // Listener blocks by numeric port
    let port_80 = config.find("    lb_port = 80\n").unwrap();
    let port_443 = config.find("    lb_port = 443\n").unwrap();
    assert!(port_80 < port_443);

    assert!(config.contains("resource \"aws_subnet\" \"us-east-1a-prod-example-com\" {\n"));
    assert!(config.contains("  cidr_block = \"10.0.1.0/24\"\n"));
    assert!(config.contains("resource \"aws_security_group\" \"api-elb-prod-example-com\" {\n"));
    assert!(config.contains("output \"subnet_ids\" {\n"));
    assert!(config.contains(
        "  value = [aws_subnet.us-east-1a-prod-example-com.id, aws_subnet.us-east-1b-prod-example-com.id]\n"
    ));
}

#[tokio::test]
async fn test_config_output_is_deterministic() {
    let first = render_config(&Arc::new(InMemoryAws::new("us-east-1"))).await;
    let second = render_config(&Arc::new(InMemoryAws::new("us-east-1"))).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_config_renders_existing_resources() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    run(&stack(), &api, Target::Api).await;
    api.clear_calls();

    let config = render_config(&api).await;

    assert!(api.calls().is_empty());
    assert!(config.contains("resource \"aws_elb\" \"api-prod-example-com\" {\n"));
    assert!(config.contains("resource \"aws_subnet\" \"us-east-1b-prod-example-com\" {\n"));
}

#[tokio::test]
async fn test_outputs_are_written_to_disk() {
    let temp = tempdir().unwrap();
    let writer = OutputWriter::new(temp.path());
    let api = Arc::new(InMemoryAws::new("us-east-1"));

    let config = render_config(&api).await;
    let path = assert_ok!(writer.write_config(&config).await);
    assert_eq!(path, writer.config_path());
    assert_eq!(assert_ok!(writer.read_config().await), Some(config));

    let target = Arc::new(DryRunTarget::new());
    run(&stack(), &api, Target::DryRun(target.clone())).await;
    let plan_path = assert_ok!(writer.write_plan(&target.plan()).await);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(plan_path).unwrap()).unwrap();
    assert_eq!(json["has_changes"], serde_json::Value::Bool(true));
    assert_eq!(json["actions"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["actions"][0]["action_type"], "create");
}

#[tokio::test]
async fn test_config_references_match_dependencies() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let (graph, elb) = stack_with_elb();
    let config = render_graph(&graph, &api).await;

    let lines = block(&config, "aws_elb", ELB);
    let mut referenced = BTreeSet::new();
    for key in ["subnets", "security_groups"] {
        for token in list_tokens(&lines, key) {
            let parts: Vec<&str> = token.split('.').collect();
            assert_eq!(parts.len(), 3, "{}", token);
            assert_eq!(parts[2], "id");
            let kind = match parts[0] {
                "aws_subnet" => "Subnet",
                "aws_security_group" => "SecurityGroup",
                other => panic!("unexpected reference {}", other),
            };
            referenced.insert((kind.to_string(), parts[1].to_string()));
        }
    }

    let dependencies: BTreeSet<(String, String)> = elb
        .snapshot()
        .dependencies()
        .into_iter()
        .map(|key| (key.kind, sanitize_name(&key.name)))
        .collect();
    assert_eq!(dependencies.len(), 3);
    assert_eq!(referenced, dependencies);

    // Every referenced block is part of the same output
    for (kind, label) in &referenced {
        let resource = if kind == "Subnet" { "aws_subnet" } else { "aws_security_group" };
        assert!(config.contains(&format!("resource \"{}\" \"{}\" {{\n", resource, label)));
    }
}

fn missing_shared_elb() -> (ResourceGraph<AwsCloud>, TaskRef<ClassicLoadBalancer>) {
    let mut graph = ResourceGraph::new();
    let elb = graph
        .add(ClassicLoadBalancer {
            name: "gone.prod.example.com".to_string(),
            shared: Some(true),
            ..Default::default()
        })
        .unwrap();
    (graph, elb)
}

#[tokio::test]
async fn test_missing_shared_elb_is_skipped() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let key = TaskKey::new("ClassicLoadBalancer", "gone.prod.example.com");

    let (graph, elb) = missing_shared_elb();
    let report = run(&graph, &api, Target::Api).await;
    assert_eq!(report.outcome(&key).and_then(TaskOutcome::action), Some(ActionType::Skip));
    assert!(api.calls().is_empty(), "{:?}", api.calls());
    assert_eq!(elb.id(), None);

    let (graph, _) = missing_shared_elb();
    let target = Arc::new(ConfigTarget::new());
    let report = run(&graph, &api, Target::Config(target.clone())).await;
    assert_eq!(report.outcome(&key).and_then(TaskOutcome::action), Some(ActionType::Skip));
    assert!(target.is_empty());
    assert!(!target.finish().contains("aws_elb"));
}

#[tokio::test]
async fn test_stale_subnet_tag_is_deleted() {
    let api = Arc::new(InMemoryAws::new("us-east-1"));
    let name = "us-east-1a.prod.example.com";
    let id = api.insert_subnet(
        "10.0.1.0/24",
        &[
            Tag::new(NAME_TAG, name),
            Tag::new(CLUSTER_TAG, CLUSTER),
            Tag::new("owner", "legacy"),
        ],
    );

    let mut graph = ResourceGraph::new();
    let subnet = graph.add(Subnet::new(name, "10.0.1.0/24")).unwrap();
    let report = run(&graph, &api, Target::Api).await;

    assert_eq!(
        report.outcome(&TaskKey::new("Subnet", name)).and_then(TaskOutcome::action),
        Some(ActionType::Update)
    );
    assert_eq!(subnet.id().as_deref(), Some(id.as_str()));
    assert!(api.calls().contains(&ApiCall::DeleteTags {
        resource: id.clone(),
        keys: vec!["owner".to_string()],
    }));
    let tags: BTreeMap<String, String> = api
        .subnets()
        .into_iter()
        .find(|s| s.subnet_id == id)
        .map(|s| s.tags.into_iter().map(|t| (t.key, t.value)).collect())
        .unwrap_or_default();
    assert!(!tags.contains_key("owner"));
    assert_eq!(tags.get(NAME_TAG).map(String::as_str), Some(name));

    api.clear_calls();
    let mut graph = ResourceGraph::new();
    graph.add(Subnet::new(name, "10.0.1.0/24")).unwrap();
    let report = run(&graph, &api, Target::Api).await;
    assert_eq!(report.summary().no_change, 1);
    assert!(api.calls().is_empty(), "{:?}", api.calls());
}
