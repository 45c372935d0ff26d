// Copyright (c) 2025 - Cowboy AI, Inc.
//! Top-level composition
//!
//! Wires the constructs into stacks in a fixed order:
//!
//! 1. state backend (bucket and lock table, local state)
//! 2. network topology
//! 3. cluster, load balancer and service security group
//! 4. image publish, workload deployment, service exposure
//! 5. control plane, when configured
//!
//! Every stack after the first keeps its state in the shared backend.
//! Application and control-plane stacks consume the network through typed
//! references, which synthesis turns into remote-state lookups.

use tracing::info;

use crate::backend::{declare_state_store, Backend, S3Backend};
use crate::config::{AwsCredentials, CommonStackProps, ProjectConfig};
use crate::constructs::{
    new_aws_stack, ClusterProvisioner, ClusterSpec, ControlPlaneBuilder, ExposeServiceParams,
    ImagePublisher, NetworkTopology, NetworkTopologyBuilder, SecurityGroupSpec, SecurityRule,
    ServiceExposer, WorkloadParams,
};
use crate::domain::{merge_tags, StackId, Tags};
use crate::errors::SynthResult;
use crate::graph::{App, Stack};

/// Stack id suffixes
pub const BACKEND_SUFFIX: &str = "terraform-state-backend";
pub const NETWORK_SUFFIX: &str = "vpc";
pub const APPLICATION_SUFFIX: &str = "ecs";
pub const CONTROL_PLANE_SUFFIX: &str = "eks";

/// Ids of the composed stacks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackIds {
    pub backend: StackId,
    pub network: StackId,
    pub application: StackId,
    pub control_plane: Option<StackId>,
}

/// Builds the whole deployment from a [`ProjectConfig`]
#[derive(Debug, Clone)]
pub struct TopLevelComposer {
    config: ProjectConfig,
    credentials: AwsCredentials,
}

impl TopLevelComposer {
    pub fn new(config: ProjectConfig, credentials: AwsCredentials) -> Self {
        Self {
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn stack_ids(&self) -> SynthResult<StackIds> {
        let config = &self.config;
        Ok(StackIds {
            backend: config.stack_id(BACKEND_SUFFIX)?,
            network: config.stack_id(NETWORK_SUFFIX)?,
            application: config.stack_id(APPLICATION_SUFFIX)?,
            control_plane: match config.control_plane {
                Some(_) => Some(config.stack_id(CONTROL_PLANE_SUFFIX)?),
                None => None,
            },
        })
    }

    /// Compose every stack and its ordering edges
    pub fn compose(&self) -> SynthResult<App> {
        self.config.validate()?;
        let ids = self.stack_ids()?;
        let mut app = App::new();

        app.add_stack(self.backend_stack(&ids.backend)?)?;

        let (network_stack, topology) = self.network_stack(&ids.network)?;
        let application = self.application_stack(&ids.application, &topology)?;
        let control_plane = match &ids.control_plane {
            Some(id) => Some(self.control_plane_stack(id, &topology)?),
            None => None,
        };

        app.add_stack(network_stack)?;
        app.add_dependency(&ids.network, &ids.backend)?;

        app.add_stack(application)?;
        app.add_dependency(&ids.application, &ids.network)?;

        if let (Some(stack), Some(id)) = (control_plane, &ids.control_plane) {
            app.add_stack(stack)?;
            app.add_dependency(id, &ids.network)?;
        }

        info!(
            project = %self.config.project,
            region = %self.credentials.region(),
            stacks = app.stacks().len(),
            "Composed application"
        );
        Ok(app)
    }

    fn props(&self, id: &StackId, tags: &Tags) -> CommonStackProps {
        CommonStackProps::new(id.clone(), self.credentials.clone(), tags.clone())
    }

    fn shared_backend(&self, id: &StackId) -> Backend {
        Backend::S3(S3Backend::for_stack(
            &self.config.state_backend,
            id,
            &self.credentials,
        ))
    }

    fn backend_stack(&self, id: &StackId) -> SynthResult<Stack> {
        let tags = merge_tags(&Tags::new(), [("project", self.config.project.as_str())]);
        let mut stack = new_aws_stack(&self.props(id, &tags), None);
        declare_state_store(&mut stack, &self.config.state_backend, &tags)?;
        Ok(stack)
    }

    fn network_stack(&self, id: &StackId) -> SynthResult<(Stack, NetworkTopology)> {
        let network = &self.config.network;
        let mut stack = new_aws_stack(
            &self.props(id, &network.tags),
            Some(self.shared_backend(id)),
        );
        let region = self.credentials.region();
        let topology = NetworkTopologyBuilder::new(self.config.availability_zones_in(region))
            .in_region(region)
            .build(&mut stack, id.as_str(), &network.spec, &network.tags)?;
        topology.export_outputs(&mut stack)?;
        Ok((stack, topology))
    }

    fn application_stack(&self, id: &StackId, network: &NetworkTopology) -> SynthResult<Stack> {
        let app = &self.config.application;
        let tags = &app.tags;
        let mut stack = new_aws_stack(&self.props(id, tags), Some(self.shared_backend(id)));

        let cluster = ClusterProvisioner::new(
            ClusterSpec::new(id.as_str())
                .with_instance(app.instance.clone())
                .with_scaling(app.scaling)
                .with_tags(tags.clone()),
        )
        .provision(&mut stack, network)?;

        let mut exposer = ServiceExposer::new(
            &mut stack,
            id.as_str(),
            network,
            &cluster,
            app.listener.clone(),
            tags,
        )?;

        // Tasks accept traffic only from the load balancer
        let service_security_group = SecurityGroupSpec::new(network.vpc_id())
            .ingress(
                SecurityRule::tcp(app.workload.port.container_port)
                    .from_group(exposer.security_group().id()),
            )
            .egress(SecurityRule::all_traffic().anywhere())
            .tagged(tags)
            .declare(&mut stack, "service-security-group")?;

        let image = ImagePublisher::new(app.image.clone()).publish(
            &mut stack,
            id.as_str(),
            &app.project_path,
            tags,
        )?;

        let workload = cluster.deploy_workload(
            &mut stack,
            WorkloadParams::new(
                format!("{}-url-shortener-image", id),
                &image,
                self.credentials.region(),
            )
            .with_env(app.env.clone())
            .with_config(app.workload)
            .with_tags(tags.clone()),
        )?;

        let mut params = ExposeServiceParams::new(
            format!("{}-url-shortener-service", id),
            &workload,
            service_security_group.id(),
            app.path_prefix.as_str(),
        )
        .with_desired_count(app.desired_count)
        .with_tags(tags.clone());
        if let Some(priority) = app.priority {
            params = params.with_priority(priority);
        }
        exposer.expose_service(&mut stack, params)?;

        stack.add_output(
            "load-balancer-dns",
            exposer.dns_name(),
            Some("Public DNS name of the load balancer"),
        )?;

        Ok(stack)
    }

    fn control_plane_stack(&self, id: &StackId, network: &NetworkTopology) -> SynthResult<Stack> {
        let config = self.config.control_plane.clone().unwrap_or_default();
        let mut stack = new_aws_stack(
            &self.props(id, &config.tags),
            Some(self.shared_backend(id)),
        );
        let plane = ControlPlaneBuilder::new(config).build(&mut stack, network)?;
        stack.add_output("cluster-endpoint", plane.endpoint(), Some("API server URL"))?;
        Ok(stack)
    }
}
