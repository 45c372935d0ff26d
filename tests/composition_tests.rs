// Copyright (c) 2025 - Cowboy AI, Inc.
//! Composition Tests
//!
//! Composes the full deployment, synthesizes it into a temporary directory
//! and inspects the written documents.

mod fixtures;

use std::fs;

use fixtures::*;
use pretty_assertions::assert_eq;
use serde_json::Value as Json;

use cim_infrastructure_aws::composer::StackIds;
use cim_infrastructure_aws::config::{
    AwsCredentials, ControlPlaneConfig, CredentialSource, ProjectConfig,
};
use cim_infrastructure_aws::constructs::exposure::LB_NAME_LIMIT;
use cim_infrastructure_aws::domain::StackId;
use cim_infrastructure_aws::graph::{Manifest, MANIFEST_FILE, STACK_DOCUMENT};
use cim_infrastructure_aws::{SynthError, TopLevelComposer};

struct Synthesized {
    ids: StackIds,
    manifest: Manifest,
    out: tempfile::TempDir,
    _project: tempfile::TempDir,
}

impl Synthesized {
    fn document(&self, id: &StackId) -> Json {
        let path = self
            .out
            .path()
            .join("stacks")
            .join(id.as_str())
            .join(STACK_DOCUMENT);
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }
}

fn synthesize(control_plane: bool) -> Synthesized {
    let mut config = ProjectConfig::default();
    if control_plane {
        config.control_plane = Some(ControlPlaneConfig::default());
    }
    synthesize_with(config, credentials())
}

fn synthesize_with(mut config: ProjectConfig, credentials: AwsCredentials) -> Synthesized {
    let project = project_dir();
    config.application.project_path = project.path().to_path_buf();

    let composer = TopLevelComposer::new(config, credentials);
    let ids = composer.stack_ids().unwrap();
    let out = tempfile::tempdir().unwrap();
    let manifest = composer.compose().unwrap().synth(out.path()).unwrap();

    Synthesized {
        ids,
        manifest,
        out,
        _project: project,
    }
}

#[test]
fn test_manifest_lists_stacks_in_dependency_order() {
    let synthesized = synthesize(false);
    let ids = &synthesized.ids;

    assert_eq!(
        synthesized.manifest.order,
        vec![ids.backend.clone(), ids.network.clone(), ids.application.clone()]
    );

    let written: Manifest = serde_json::from_str(
        &fs::read_to_string(synthesized.out.path().join(MANIFEST_FILE)).unwrap(),
    )
    .unwrap();
    assert_eq!(written.order, synthesized.manifest.order);

    let application = &written.stacks[&ids.application];
    assert_eq!(application.dependencies, vec![ids.network.clone()]);
    assert_eq!(application.assets.len(), 1);
}

#[test]
fn test_application_reads_network_through_remote_state() {
    let synthesized = synthesize(false);
    let ids = &synthesized.ids;
    let application = synthesized.document(&ids.application);
    let network = synthesized.document(&ids.network);

    let lookup = format!("cross-stack-reference-input-{}", ids.network);
    let remote = &application["data"]["terraform_remote_state"][&lookup];
    assert_eq!(remote["backend"], "s3");
    assert_eq!(
        remote["config"]["key"],
        format!("{}/url-shortener-terraform-state.tfstate", ids.network)
    );

    let asg = &application["resource"]["aws_autoscaling_group"]
        [&format!("{}-ecs-ec2-asg", ids.application)];
    let subnet = asg["vpc_zone_identifier"][0].as_str().unwrap();
    let outputs = format!("${{data.terraform_remote_state.{}.outputs.", lookup);
    let export = subnet
        .strip_prefix(&outputs)
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap();
    assert!(export.starts_with("cross-stack-output-"), "unexpected subnet ref {subnet}");

    // The exported name must exist in the network document
    assert!(network["output"].get(export).is_some(), "missing export {export}");
}

#[test]
fn test_backend_stack_keeps_local_state() {
    let synthesized = synthesize(false);
    let backend = synthesized.document(&synthesized.ids.backend);

    assert!(backend["terraform"]["backend"]["local"].is_object());
    assert_eq!(backend["resource"]["aws_dynamodb_table"].as_object().unwrap().len(), 1);
    assert!(backend["resource"]["aws_s3_bucket_versioning"].is_object());
}

#[test]
fn test_provider_carries_no_secrets() {
    let synthesized = synthesize(false);
    let application = synthesized.document(&synthesized.ids.application);

    let aws = &application["provider"]["aws"][0];
    assert_eq!(aws["region"], REGION);
    assert_eq!(aws["profile"], "ops");
    assert!(aws.get("secret_key").is_none());
    assert!(aws.get("access_key").is_none());
    assert!(application["terraform"]["required_providers"]["null"].is_object());
}

#[test]
fn test_control_plane_stack() {
    let synthesized = synthesize(true);
    let ids = &synthesized.ids;
    let control_plane = ids.control_plane.clone().unwrap();

    assert_eq!(synthesized.manifest.order.len(), 4);
    let position = |id: &StackId| {
        synthesized
            .manifest
            .order
            .iter()
            .position(|candidate| candidate == id)
            .unwrap()
    };
    assert!(position(&ids.network) < position(&control_plane));

    let document = synthesized.document(&control_plane);
    let wait = &document["resource"]["null_resource"]["wait-for-cluster"];
    let command = wait["provisioner"][0]["local-exec"]["command"].as_str().unwrap();
    assert!(command.contains("seq 1 60"));
    assert!(command.ends_with("echo TIMEOUT && exit 1"));
    assert_eq!(wait["depends_on"][0], "aws_eks_cluster.eks-cluster");
}

fn subnet_zones(document: &Json) -> Vec<String> {
    document["resource"]["aws_subnet"]
        .as_object()
        .unwrap()
        .values()
        .map(|subnet| subnet["availability_zone"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_subnets_follow_configured_region() {
    let config: ProjectConfig = serde_json::from_str(r#"{ "region": "us-east-1" }"#).unwrap();
    let credentials = AwsCredentials::from_vars(&config, |_| None).unwrap();
    let synthesized = synthesize_with(config, credentials);
    let network = synthesized.document(&synthesized.ids.network);

    assert_eq!(network["provider"]["aws"][0]["region"], "us-east-1");
    let zones = subnet_zones(&network);
    assert_eq!(zones.len(), 4);
    assert!(zones.iter().all(|zone| zone.starts_with("us-east-1")), "{zones:?}");
}

#[test]
fn test_subnets_follow_region_override() {
    let config = ProjectConfig::default();
    let credentials = AwsCredentials::from_vars(&config, |key| {
        (key == "AWS_DEFAULT_REGION").then(|| "ap-south-1".to_string())
    })
    .unwrap();
    let synthesized = synthesize_with(config, credentials);
    let network = synthesized.document(&synthesized.ids.network);

    let mut zones = subnet_zones(&network);
    zones.sort();
    assert_eq!(
        zones,
        vec!["ap-south-1a", "ap-south-1a", "ap-south-1b", "ap-south-1b"]
    );
}

#[test]
fn test_explicit_zones_from_other_region_rejected() {
    let project = project_dir();
    let mut config = ProjectConfig::default();
    config.application.project_path = project.path().to_path_buf();
    config.availability_zones = Some(vec!["eu-west-1a".to_string(), "eu-west-1b".to_string()]);
    let credentials = AwsCredentials::new(CredentialSource::Environment, "us-east-1");

    let err = TopLevelComposer::new(config, credentials).compose().unwrap_err();
    assert!(matches!(err, SynthError::Network(_)), "{err}");
}

#[test]
fn test_default_target_group_name_fits_limit() {
    let synthesized = synthesize(false);
    let application = synthesized.document(&synthesized.ids.application);

    let target_groups = application["resource"]["aws_lb_target_group"]
        .as_object()
        .unwrap();
    assert_eq!(target_groups.len(), 1);
    for target_group in target_groups.values() {
        let name = target_group["name"].as_str().unwrap();
        assert!(name.len() <= LB_NAME_LIMIT, "{name}");
    }
    for balancer in application["resource"]["aws_lb"].as_object().unwrap().values() {
        assert!(balancer["name"].as_str().unwrap().len() <= LB_NAME_LIMIT);
    }
}

#[test]
fn test_environment_values_are_not_interpolated() {
    let mut config = ProjectConfig::default();
    config
        .application
        .env
        .insert("GREETING".to_string(), "${var.secret} %{ if x }".to_string());
    let synthesized = synthesize_with(config, credentials());
    let application = synthesized.document(&synthesized.ids.application);

    let task = application["resource"]["aws_ecs_task_definition"]
        .as_object()
        .unwrap()
        .values()
        .next()
        .unwrap();
    let containers: Json =
        serde_json::from_str(task["container_definitions"].as_str().unwrap()).unwrap();
    let greeting = containers[0]["environment"]
        .as_array()
        .unwrap()
        .iter()
        .find(|var| var["name"] == "GREETING")
        .unwrap();

    assert_eq!(greeting["value"], "$${var.secret} %%{ if x }");
}
