// Copyright (c) 2025 - Cowboy AI, Inc.
//! Infrastructure constructs
//!
//! Each construct declares a related set of blocks into a [`Stack`] and hands
//! back typed references for the next stage. Constructs validate their inputs
//! before the first declaration and stage their declarations, so a failure
//! leaves the target stack untouched.

pub mod cluster;
pub mod control_plane;
pub mod exposure;
pub mod iam;
pub mod image;
pub mod network;
pub mod security;

use crate::backend::Backend;
use crate::config::{AwsCredentials, CommonStackProps};
use crate::domain::{merge_tags, Tags};
use crate::errors::SynthResult;
use crate::graph::{Provider, Stack};

pub use cluster::{
    Cluster, ClusterProvisioner, ClusterSpec, InstanceConfig, PortMapping, ResourceShape,
    ScalingBounds, WorkloadConfig, WorkloadDefinition, WorkloadParams,
};
pub use control_plane::{ControlPlane, ControlPlaneBuilder};
pub use exposure::{ExposeServiceParams, ListenerConfig, ServiceExposer, ServiceExposure};
pub use image::{ImageArtifact, ImagePublisher, ImagePublisherConfig};
pub use network::{NatRoute, NetworkSpec, NetworkTopology, NetworkTopologyBuilder, SubnetPlacement};
pub use security::{SecurityGroupSpec, SecurityRule};

/// Version constraint of the AWS provider
pub const AWS_PROVIDER_VERSION: &str = "~> 5.0";

pub fn aws_provider(credentials: &AwsCredentials) -> Provider {
    let mut provider = Provider::new("aws", "hashicorp/aws", AWS_PROVIDER_VERSION);
    provider.config = credentials.provider_config();
    provider
}

/// Provider of `null_resource` steps
pub fn null_provider() -> Provider {
    Provider::new("null", "hashicorp/null", "~> 3.2")
}

/// Provider of the `tls_certificate` data source
pub fn tls_provider() -> Provider {
    Provider::new("tls", "hashicorp/tls", "~> 4.0")
}

/// Empty stack with the AWS provider and, when given, a state backend
pub fn new_aws_stack(props: &CommonStackProps, backend: Option<Backend>) -> Stack {
    let mut stack = Stack::new(props.id.clone());
    stack.add_provider(aws_provider(&props.credentials));
    if let Some(backend) = backend {
        stack.set_backend(backend);
    }
    stack
}

/// `tags` plus a `Name` tag
pub fn named(tags: &Tags, name: &str) -> Tags {
    merge_tags(tags, [("Name", name)])
}

/// Run `build` against a copy of `stack` and keep the copy only on success
pub(crate) fn staged<T>(
    stack: &mut Stack,
    build: impl FnOnce(&mut Stack) -> SynthResult<T>,
) -> SynthResult<T> {
    let mut draft = stack.clone();
    let built = build(&mut draft)?;
    *stack = draft;
    Ok(built)
}
