// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Exposure Tests
//!
//! Verifies listener routing, priority allocation and the ordering edges
//! between image build, task definition, listener rule and service.

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;

use cim_infrastructure_aws::constructs::exposure::LB_NAME_LIMIT;
use cim_infrastructure_aws::constructs::{
    ExposeServiceParams, ListenerConfig, PortMapping, SecurityGroupSpec, SecurityRule,
    ServiceExposer, WorkloadConfig, WorkloadParams,
};
use cim_infrastructure_aws::domain::ValidationError;
use cim_infrastructure_aws::graph::kinds::{LbListenerRule, LbTargetGroup};
use cim_infrastructure_aws::graph::{Expr, Value};
use cim_infrastructure_aws::SynthError;

fn service_group(deployed: &mut Deployed) -> Expr {
    SecurityGroupSpec::new(deployed.network.vpc_id())
        .ingress(SecurityRule::tcp(80).anywhere_ipv4())
        .egress(SecurityRule::all_traffic().anywhere())
        .declare(&mut deployed.stack, "service-sg")
        .unwrap()
        .id()
}

#[test]
fn test_root_path_routes_everything() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    let exposure = exposer
        .expose_service(stack, ExposeServiceParams::new("svc", workload, group, "/"))
        .unwrap();

    assert_eq!(exposure.path_pattern, "/*");
    assert_eq!(exposure.priority, 100);
    assert_eq!(exposure.health_check_path, "/ready");

    let target_group = stack.resource(&exposure.target_group.address()).unwrap();
    assert_eq!(
        target_group.attribute("health_check").and_then(|h| h.get("path")),
        Some(&Value::from("/ready"))
    );
    assert!(target_group.waits_for(&exposer.load_balancer().handle()));
}

#[test]
fn test_distinct_prefixes_get_distinct_rules() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    let api = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("api", workload, group.clone(), "/api/"),
        )
        .unwrap();
    let admin = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("admin", workload, group, "/admin/"),
        )
        .unwrap();

    assert_ne!(api.priority, admin.priority);
    assert_ne!(api.target_group, admin.target_group);
    assert_eq!(stack.resources_of::<LbListenerRule>().count(), 2);
    assert_eq!(stack.resources_of::<LbTargetGroup>().count(), 2);
    assert_eq!(exposer.exposures().len(), 2);
    assert_eq!(exposer.next_priority(), 102);
}

#[test]
fn test_duplicate_routes_rejected_without_declaring() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("one", workload, group.clone(), "/").with_priority(7),
        )
        .unwrap();
    let declared = stack.resources().len();

    let same_path = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("two", workload, group.clone(), "/"),
        )
        .unwrap_err();
    assert!(matches!(
        same_path,
        SynthError::Validation(ValidationError::DuplicatePathPattern(_))
    ));

    let same_priority = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("three", workload, group, "/three").with_priority(7),
        )
        .unwrap_err();
    assert!(matches!(
        same_priority,
        SynthError::Validation(ValidationError::DuplicatePriority(7))
    ));

    assert_eq!(stack.resources().len(), declared);
}

#[test]
fn test_invalid_prefix_and_priority_rejected() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();

    let no_slash = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("svc", workload, group.clone(), "api"),
        )
        .unwrap_err();
    assert!(matches!(
        no_slash,
        SynthError::Validation(ValidationError::InvalidPathPrefix(_))
    ));

    let too_high = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("svc", workload, group, "/api").with_priority(50_001),
        )
        .unwrap_err();
    assert!(matches!(
        too_high,
        SynthError::Validation(ValidationError::PriorityOutOfRange(50_001))
    ));
}

#[test]
fn test_service_waits_for_listener_and_rule() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    let exposure = exposer
        .expose_service(stack, ExposeServiceParams::new("svc", workload, group, "/"))
        .unwrap();

    let service = stack.resource(&exposure.service.address()).unwrap();
    assert!(service.waits_for(&exposer.listener().handle()));
    assert!(service.waits_for(&exposure.listener_rule.handle()));
    assert_eq!(service.attribute("launch_type"), Some(&Value::from("FARGATE")));
}

#[test]
fn test_task_definition_waits_for_image_build() {
    let deployed = deployed("ecs");

    let task = deployed
        .stack
        .resource(&deployed.workload.task_definition.address())
        .unwrap();
    assert!(task.waits_for(&deployed.image.build_handle()));
}

#[test]
fn test_configured_priority_start() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let config = ListenerConfig {
        priority_start: 500,
        priority_step: 10,
        ..ListenerConfig::default()
    };
    let mut exposer = ServiceExposer::new(stack, "app", network, cluster, config, &tags()).unwrap();
    let first = exposer
        .expose_service(
            stack,
            ExposeServiceParams::new("a", workload, group.clone(), "/a"),
        )
        .unwrap();
    let second = exposer
        .expose_service(stack, ExposeServiceParams::new("b", workload, group, "/b"))
        .unwrap();

    assert_eq!((first.priority, second.priority), (500, 510));
}

#[test]
fn test_load_balancer_targets_declared_container_port() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    let exposure = exposer
        .expose_service(stack, ExposeServiceParams::new("svc", workload, group, "/"))
        .unwrap();

    let task = stack.resource(&workload.task_definition.address()).unwrap();
    let mapping = match task.attribute("container_definitions") {
        Some(Value::Encoded(containers)) => match &**containers {
            Value::List(containers) => match containers[0].get("portMappings") {
                Some(Value::List(mappings)) => mappings[0].clone(),
                other => panic!("unexpected port mappings: {other:?}"),
            },
            other => panic!("unexpected containers: {other:?}"),
        },
        other => panic!("unexpected container definitions: {other:?}"),
    };
    let declared = mapping.get("containerPort").cloned().unwrap();
    assert_eq!(mapping.get("hostPort"), Some(&declared));
    assert_eq!(task.attribute("network_mode"), Some(&Value::from("awsvpc")));

    let service = stack.resource(&exposure.service.address()).unwrap();
    let binding = match service.attribute("load_balancer") {
        Some(Value::List(bindings)) => bindings[0].clone(),
        other => panic!("unexpected load balancer binding: {other:?}"),
    };
    assert_eq!(binding.get("container_port"), Some(&declared));

    let target_group = stack.resource(&exposure.target_group.address()).unwrap();
    assert_eq!(target_group.attribute("port"), Some(&declared));
}

#[test]
fn test_split_port_mapping_rejected_without_declaring() {
    let mut deployed = deployed("ecs");
    let declared = deployed.stack.resources().len();
    let config = WorkloadConfig {
        port: PortMapping {
            container_port: 8080,
            host_port: 80,
        },
        ..WorkloadConfig::default()
    };

    let err = deployed
        .cluster
        .deploy_workload(
            &mut deployed.stack,
            WorkloadParams::new("split", &deployed.image, REGION).with_config(config),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        SynthError::Validation(ValidationError::InvalidPortMapping {
            container_port: 8080,
            host_port: 80
        })
    ));
    assert_eq!(deployed.stack.resources().len(), declared);
}

#[test]
fn test_long_service_names_fit_target_group_limit() {
    let mut deployed = deployed("ecs");
    let group = service_group(&mut deployed);
    let Deployed {
        stack,
        network,
        cluster,
        workload,
        ..
    } = &mut deployed;

    let mut exposer =
        ServiceExposer::new(stack, "app", network, cluster, ListenerConfig::default(), &tags())
            .unwrap();
    let mut names = Vec::new();
    for (service, prefix) in [
        ("url-shortener-ecs-url-shortener-service", "/"),
        ("url-shortener-ecs-url-shortener-worker", "/worker/"),
    ] {
        let exposure = exposer
            .expose_service(
                stack,
                ExposeServiceParams::new(service, workload, group.clone(), prefix),
            )
            .unwrap();
        let target_group = stack.resource(&exposure.target_group.address()).unwrap();
        let name = target_group
            .attribute("name")
            .and_then(Value::as_expr)
            .and_then(|expr| expr.as_literal())
            .unwrap();
        assert!(name.len() <= LB_NAME_LIMIT, "{name} is {} characters", name.len());
        names.push(name);
    }
    assert_ne!(names[0], names[1]);
}
