// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-infrastructure-aws
//!
//! Deterministic inputs shared by the integration tests: the three-zone
//! CIDR plan, fixed credentials, and a throwaway build context.
#![allow(dead_code)]

use std::fs;

use tempfile::TempDir;

use cim_infrastructure_aws::config::{AwsCredentials, CredentialSource};
use cim_infrastructure_aws::constructs::{
    Cluster, ClusterProvisioner, ClusterSpec, ImageArtifact, ImagePublisher, NetworkSpec,
    NetworkTopology, NetworkTopologyBuilder, WorkloadDefinition, WorkloadParams,
};
use cim_infrastructure_aws::domain::{StackId, Tags};
use cim_infrastructure_aws::graph::Stack;

pub const REGION: &str = "eu-west-1";

pub const VPC_CIDR: &str = "10.0.0.0/16";
pub const PUBLIC_CIDRS: [&str; 3] = ["10.0.96.0/19", "10.0.128.0/19", "10.0.160.0/19"];
pub const PRIVATE_CIDRS: [&str; 3] = ["10.0.0.0/19", "10.0.32.0/19", "10.0.64.0/19"];

/// Three public and three private /19 blocks in a /16
pub fn three_zone_spec() -> NetworkSpec {
    NetworkSpec::new(VPC_CIDR, PUBLIC_CIDRS, PRIVATE_CIDRS)
}

pub fn zones() -> Vec<String> {
    vec![
        "eu-west-1a".to_string(),
        "eu-west-1b".to_string(),
        "eu-west-1c".to_string(),
    ]
}

pub fn stack(id: &str) -> Stack {
    Stack::new(StackId::new(id).expect("Invalid stack id in test fixture"))
}

pub fn credentials() -> AwsCredentials {
    AwsCredentials::new(CredentialSource::Profile("ops".to_string()), REGION)
}

pub fn tags() -> Tags {
    [("project", "fixture")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Build context holding a minimal Dockerfile
pub fn project_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::write(dir.path().join("Dockerfile"), "FROM scratch\nCOPY . /app\n")
        .expect("Failed to write Dockerfile");
    dir
}

/// Three-zone network declared into `stack` under the label `main`
pub fn network(stack: &mut Stack) -> NetworkTopology {
    NetworkTopologyBuilder::new(zones())
        .build(stack, "main", &three_zone_spec(), &tags())
        .expect("Fixture network must build")
}

/// Everything up to a deployed workload, in one stack
pub struct Deployed {
    pub stack: Stack,
    pub network: NetworkTopology,
    pub cluster: Cluster,
    pub image: ImageArtifact,
    pub workload: WorkloadDefinition,
    pub project: TempDir,
}

pub fn deployed(id: &str) -> Deployed {
    let mut stack = stack(id);
    let network = network(&mut stack);
    let cluster = ClusterProvisioner::new(ClusterSpec::new("app").with_tags(tags()))
        .provision(&mut stack, &network)
        .expect("Fixture cluster must provision");

    let project = project_dir();
    let image = ImagePublisher::default()
        .publish(&mut stack, "app", project.path(), &tags())
        .expect("Fixture image must publish");

    let workload = cluster
        .deploy_workload(&mut stack, WorkloadParams::new("app-workload", &image, REGION))
        .expect("Fixture workload must deploy");

    Deployed {
        stack,
        network,
        cluster,
        image,
        workload,
        project,
    }
}
