// Copyright (c) 2025 - Cowboy AI, Inc.
//! Managed Kubernetes control plane
//!
//! Declares the control plane with its service role, security group and
//! OIDC identity provider, followed by a readiness step that blocks every
//! dependent until the API endpoint answers.
//!
//! # Invariants
//!
//! - The cluster waits on both managed policy attachments of its role
//! - The readiness step is the only wait loop and is bounded by its
//!   [`PollPolicy`](crate::probe::PollPolicy)

use tracing::info;

use crate::config::ControlPlaneConfig;
use crate::domain::invariants::validate_non_empty;
use crate::errors::{SynthError, SynthResult};
use crate::graph::kinds::{
    EksCluster, IamOpenidConnectProvider, IamRole, IamRolePolicyAttachment, NullResource,
    SecurityGroup, TlsCertificate,
};
use crate::graph::{Block, Expr, Handle, LocalExec, ResourceRef, Stack, Value};

use super::iam::{attach_managed_policy, declare_service_role};
use super::network::NetworkTopology;
use super::security::{SecurityGroupSpec, SecurityRule};
use super::{named, null_provider, staged, tls_provider};

/// Service principal of the control plane
pub const EKS_SERVICE: &str = "eks.amazonaws.com";

/// Audience of tokens exchanged through the OIDC provider
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

const CLUSTER_POLICIES: [&str; 2] = ["AmazonEKSClusterPolicy", "AmazonEKSServicePolicy"];

/// Declared control plane
#[derive(Debug, Clone, PartialEq)]
pub struct ControlPlane {
    role: ResourceRef<IamRole>,
    policy_attachments: Vec<ResourceRef<IamRolePolicyAttachment>>,
    security_group: ResourceRef<SecurityGroup>,
    cluster: ResourceRef<EksCluster>,
    oidc_provider: ResourceRef<IamOpenidConnectProvider>,
    ready: ResourceRef<NullResource>,
}

impl ControlPlane {
    pub fn role(&self) -> &ResourceRef<IamRole> {
        &self.role
    }

    pub fn policy_attachments(&self) -> &[ResourceRef<IamRolePolicyAttachment>] {
        &self.policy_attachments
    }

    pub fn security_group(&self) -> &ResourceRef<SecurityGroup> {
        &self.security_group
    }

    pub fn cluster(&self) -> &ResourceRef<EksCluster> {
        &self.cluster
    }

    pub fn oidc_provider(&self) -> &ResourceRef<IamOpenidConnectProvider> {
        &self.oidc_provider
    }

    /// API server URL
    pub fn endpoint(&self) -> Expr {
        self.cluster.attr("endpoint")
    }

    /// Completes once the API server answered the readiness probe
    pub fn ready_handle(&self) -> Handle {
        self.ready.handle()
    }
}

/// Declares a control plane from a [`ControlPlaneConfig`]
#[derive(Debug, Clone, Default)]
pub struct ControlPlaneBuilder {
    config: ControlPlaneConfig,
}

impl ControlPlaneBuilder {
    pub fn new(config: ControlPlaneConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ControlPlaneConfig {
        &self.config
    }

    /// Declare the control plane into `stack` over every subnet of `network`
    pub fn build(&self, stack: &mut Stack, network: &NetworkTopology) -> SynthResult<ControlPlane> {
        let config = &self.config;
        validate_non_empty(&config.cluster_name, "control plane name")?;
        validate_non_empty(&config.kubernetes_version, "kubernetes version")?;
        config
            .readiness
            .validate()
            .map_err(|e| SynthError::Configuration(e.to_string()))?;

        staged(stack, |stack| {
            stack.add_provider(tls_provider());
            stack.add_provider(null_provider());

            let role = declare_service_role(
                stack,
                "eks-cluster-main-role",
                EKS_SERVICE,
                None,
                &config.tags,
            )?;

            let policy_attachments = CLUSTER_POLICIES
                .iter()
                .map(|policy| attach_managed_policy(stack, &role, policy))
                .collect::<Result<Vec<_>, _>>()?;

            let security_group = SecurityGroupSpec::new(network.vpc_id())
                .named("eks-main-security-group")
                .described("Control plane communication")
                .ingress(
                    SecurityRule::all_traffic()
                        .within_group()
                        .described("Allow all traffic within the group"),
                )
                .egress(SecurityRule::all_traffic().anywhere_ipv4())
                .tagged(&config.tags)
                .ignore_rule_changes()
                .declare(stack, "eks-main-security-group")?;

            let subnet_ids = network
                .public_subnet_ids()
                .into_iter()
                .chain(network.private_subnet_ids());

            let cluster = stack.declare::<EksCluster>(
                "eks-cluster",
                policy_attachments.iter().fold(
                    Block::new()
                        .attr("name", &config.cluster_name)
                        .attr("version", &config.kubernetes_version)
                        .attr("role_arn", role.arn())
                        .attr(
                            "vpc_config",
                            Value::map([
                                ("subnet_ids", Value::list(subnet_ids)),
                                (
                                    "security_group_ids",
                                    Value::list([security_group.id()]),
                                ),
                            ]),
                        )
                        .tags(&named(&config.tags, &config.cluster_name)),
                    |block, attachment| block.depends_on(attachment.handle()),
                ),
            )?;

            let issuer = cluster.attr("identity[0].oidc[0].issuer");

            let certificate = stack.declare::<TlsCertificate>(
                "eks-oidc-issuer",
                Block::new().attr("url", &issuer),
            )?;

            let oidc_provider = stack.declare::<IamOpenidConnectProvider>(
                "eks-oidc-provider",
                Block::new()
                    .attr("client_id_list", Value::list([STS_AUDIENCE]))
                    .attr(
                        "thumbprint_list",
                        Value::list([certificate.attr("certificates[0].sha1_fingerprint")]),
                    )
                    .attr("url", &issuer)
                    .tags(&config.tags),
            )?;

            let ready = stack.declare::<NullResource>(
                "wait-for-cluster",
                Block::new().depends_on(cluster.handle()).provisioner(
                    LocalExec::new(config.readiness.shell_command())
                        .interpreter(["/bin/sh", "-c"])
                        .env("ENDPOINT", cluster.attr("endpoint")),
                ),
            )?;

            info!(
                stack = %stack.id(),
                cluster = %config.cluster_name,
                version = %config.kubernetes_version,
                attempts = config.readiness.attempts,
                "Declared control plane"
            );

            Ok(ControlPlane {
                role,
                policy_attachments,
                security_group,
                cluster,
                oidc_provider,
                ready,
            })
        })
    }
}
