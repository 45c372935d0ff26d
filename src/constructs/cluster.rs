// Copyright (c) 2025 - Cowboy AI, Inc.
//! Container cluster and workloads
//!
//! [`ClusterProvisioner`] declares an ECS cluster backed by one capacity
//! provider over an autoscaling group in the private subnets.
//! [`Cluster::deploy_workload`] adds a task definition for a published image.
//!
//! # Invariants
//!
//! - Scaling bounds satisfy `min <= desired <= max`
//! - The cluster exists before any workload is declared on it
//! - A task definition always waits on the image build step
//! - Under `awsvpc` the host port equals the container port

use std::collections::BTreeMap;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::invariants::{
    validate_log_retention, validate_non_empty, validate_port_mapping, validate_resource_shape,
    validate_scaling_bounds,
};
use crate::domain::{Tags, ValidationError, ValidationResult};
use crate::errors::SynthResult;
use crate::graph::kinds::{
    AutoscalingGroup, CloudwatchLogGroup, EcsCapacityProvider, EcsCluster,
    EcsClusterCapacityProviders, EcsTaskDefinition, IamRole, LaunchTemplate, SecurityGroup,
};
use crate::graph::{Block, Expr, ResourceRef, Stack, Value};

use super::iam::declare_service_role;
use super::image::ImageArtifact;
use super::network::NetworkTopology;
use super::security::{SecurityGroupSpec, SecurityRule};
use super::staged;

/// Service principal of ECS tasks
pub const ECS_TASKS_SERVICE: &str = "ecs-tasks.amazonaws.com";

const EXECUTION_ACTIONS: [&str; 6] = [
    "ecr:GetAuthorizationToken",
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

const LOGGING_ACTIONS: [&str; 2] = ["logs:CreateLogStream", "logs:PutLogEvents"];

/// Autoscaling group bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    pub min: u32,
    pub desired: u32,
    pub max: u32,
}

impl ScalingBounds {
    pub fn new(min: u32, desired: u32, max: u32) -> Result<Self, ValidationError> {
        validate_scaling_bounds(min, desired, max)?;
        Ok(Self { min, desired, max })
    }

    pub fn validate(&self) -> ValidationResult {
        validate_scaling_bounds(self.min, self.desired, self.max)
    }
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self {
            min: 1,
            desired: 1,
            max: 1,
        }
    }
}

/// Machine image and size of cluster instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub image_id: String,
    pub instance_type: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            image_id: "ami-0aa204fea41b74213".to_string(),
            instance_type: "t2.micro".to_string(),
        }
    }
}

/// Desired compute cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Prefix of every declared label
    pub name: String,
    pub instance: InstanceConfig,
    pub scaling: ScalingBounds,
    pub tags: Tags,
}

impl ClusterSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instance: InstanceConfig::default(),
            scaling: ScalingBounds::default(),
            tags: Tags::new(),
        }
    }

    pub fn with_scaling(mut self, scaling: ScalingBounds) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn with_instance(mut self, instance: InstanceConfig) -> Self {
        self.instance = instance;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Name of the ECS cluster itself
    pub fn cluster_name(&self) -> String {
        format!("{}-ecs-cluster", self.name)
    }
}

/// Task CPU units and memory (MiB)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShape {
    pub cpu: u32,
    pub memory: u32,
}

impl ResourceShape {
    pub fn new(cpu: u32, memory: u32) -> Result<Self, ValidationError> {
        validate_resource_shape(cpu, memory)?;
        Ok(Self { cpu, memory })
    }
}

impl Default for ResourceShape {
    fn default() -> Self {
        Self {
            cpu: 256,
            memory: 512,
        }
    }
}

/// Container port published by a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

impl PortMapping {
    /// Same port on the container and its interface
    pub fn same(port: u16) -> Self {
        Self {
            container_port: port,
            host_port: port,
        }
    }

    pub fn validate(&self) -> ValidationResult {
        validate_port_mapping(self.container_port, self.host_port)
    }
}

impl Default for PortMapping {
    fn default() -> Self {
        Self::same(8080)
    }
}

/// Workload sizing and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub shape: ResourceShape,
    pub port: PortMapping,
    pub log_retention_days: u32,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            shape: ResourceShape::default(),
            port: PortMapping::default(),
            log_retention_days: 30,
        }
    }
}

/// Inputs of [`Cluster::deploy_workload`]
#[derive(Debug, Clone)]
pub struct WorkloadParams<'a> {
    /// Container and label prefix
    pub name: String,
    pub image: &'a ImageArtifact,
    pub env: BTreeMap<String, String>,
    pub region: String,
    pub config: WorkloadConfig,
    pub tags: Tags,
}

impl<'a> WorkloadParams<'a> {
    pub fn new(name: impl Into<String>, image: &'a ImageArtifact, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image,
            env: BTreeMap::new(),
            region: region.into(),
            config: WorkloadConfig::default(),
            tags: Tags::new(),
        }
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_config(mut self, config: WorkloadConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// Declared task definition and its supporting resources
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadDefinition {
    pub name: String,
    pub port: PortMapping,
    pub task_definition: ResourceRef<EcsTaskDefinition>,
    pub execution_role: ResourceRef<IamRole>,
    pub task_role: ResourceRef<IamRole>,
    pub log_group: ResourceRef<CloudwatchLogGroup>,
}

impl WorkloadDefinition {
    /// Name of the single container in the task
    pub fn container_name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> Expr {
        self.task_definition.arn()
    }
}

/// Declared cluster
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    spec: ClusterSpec,
    cluster: ResourceRef<EcsCluster>,
    instance_security_group: ResourceRef<SecurityGroup>,
    launch_template: ResourceRef<LaunchTemplate>,
    autoscaling_group: ResourceRef<AutoscalingGroup>,
    capacity_provider: ResourceRef<EcsCapacityProvider>,
    capacity_providers: ResourceRef<EcsClusterCapacityProviders>,
}

/// Declares clusters from a [`ClusterSpec`]
#[derive(Debug, Clone)]
pub struct ClusterProvisioner {
    spec: ClusterSpec,
}

impl ClusterProvisioner {
    pub fn new(spec: ClusterSpec) -> Self {
        Self { spec }
    }

    /// Declare the cluster into `stack`, placing instances in the private
    /// subnets of `network`
    pub fn provision(&self, stack: &mut Stack, network: &NetworkTopology) -> SynthResult<Cluster> {
        let spec = &self.spec;
        validate_non_empty(&spec.name, "cluster name")?;
        validate_non_empty(&spec.instance.image_id, "instance image id")?;
        validate_non_empty(&spec.instance.instance_type, "instance type")?;
        spec.scaling.validate()?;

        staged(stack, |stack| {
            let name = &spec.name;
            let cluster_name = spec.cluster_name();

            let instance_security_group = SecurityGroupSpec::new(network.vpc_id())
                .named(format!("{}-ecs-instance-sg", name))
                .ingress(
                    SecurityRule::all_traffic()
                        .within_group()
                        .described("Allow all inbound traffic"),
                )
                .egress(SecurityRule::all_traffic().anywhere_ipv4())
                .tagged(&spec.tags)
                .ignore_rule_changes()
                .declare(stack, &format!("{}-ecs-instance-sg", name))?;

            let launch_template = stack.declare::<LaunchTemplate>(
                format!("{}-ecs-launch-template", name),
                Block::new()
                    .attr("name_prefix", format!("{}-ecs-", name))
                    .attr("image_id", &spec.instance.image_id)
                    .attr("instance_type", &spec.instance.instance_type)
                    .attr(
                        "vpc_security_group_ids",
                        Value::list([instance_security_group.id()]),
                    )
                    .attr("user_data", instance_user_data(&cluster_name))
                    .tags(&spec.tags),
            )?;

            let cluster = stack.declare::<EcsCluster>(
                cluster_name.as_str(),
                Block::new().attr("name", &cluster_name).tags(&spec.tags),
            )?;

            let autoscaling_group = stack.declare::<AutoscalingGroup>(
                format!("{}-ecs-ec2-asg", name),
                Block::new()
                    .attr("min_size", spec.scaling.min)
                    .attr("max_size", spec.scaling.max)
                    .attr("desired_capacity", spec.scaling.desired)
                    .attr("vpc_zone_identifier", Value::list(network.private_subnet_ids()))
                    .attr(
                        "launch_template",
                        Value::map([
                            ("id", Value::from(launch_template.id())),
                            ("version", Value::from("$Latest")),
                        ]),
                    )
                    .attr("protect_from_scale_in", true)
                    .attr(
                        "tag",
                        Value::list([Value::map([
                            ("key", Value::from("AmazonECSManaged")),
                            ("value", Value::from("true")),
                            ("propagate_at_launch", Value::from(true)),
                        ])]),
                    )
                    .ignore_changes(["desired_capacity"]),
            )?;

            let capacity_provider = stack.declare::<EcsCapacityProvider>(
                format!("{}-ecs-capacity-provider", name),
                Block::new()
                    .attr("name", format!("{}-ecs-capacity-provider", name))
                    .attr(
                        "auto_scaling_group_provider",
                        Value::map([
                            ("auto_scaling_group_arn", Value::from(autoscaling_group.arn())),
                            ("managed_termination_protection", Value::from("ENABLED")),
                            (
                                "managed_scaling",
                                Value::map([("status", "ENABLED")]),
                            ),
                        ]),
                    )
                    .tags(&spec.tags),
            )?;

            let capacity_providers = stack.declare::<EcsClusterCapacityProviders>(
                format!("{}-ecs-cluster-capacity-providers", name),
                Block::new()
                    .attr("cluster_name", cluster.attr("name"))
                    .attr(
                        "capacity_providers",
                        Value::list([capacity_provider.attr("name")]),
                    ),
            )?;

            info!(
                stack = %stack.id(),
                cluster = %cluster_name,
                min = spec.scaling.min,
                desired = spec.scaling.desired,
                max = spec.scaling.max,
                "Provisioned cluster"
            );

            Ok(Cluster {
                spec: spec.clone(),
                cluster,
                instance_security_group,
                launch_template,
                autoscaling_group,
                capacity_provider,
                capacity_providers,
            })
        })
    }
}

impl Cluster {
    pub fn spec(&self) -> &ClusterSpec {
        &self.spec
    }

    pub fn cluster(&self) -> &ResourceRef<EcsCluster> {
        &self.cluster
    }

    /// Cluster identifier consumed by services
    pub fn id(&self) -> Expr {
        self.cluster.id()
    }

    pub fn name(&self) -> Expr {
        self.cluster.attr("name")
    }

    pub fn instance_security_group(&self) -> &ResourceRef<SecurityGroup> {
        &self.instance_security_group
    }

    pub fn launch_template(&self) -> &ResourceRef<LaunchTemplate> {
        &self.launch_template
    }

    pub fn autoscaling_group(&self) -> &ResourceRef<AutoscalingGroup> {
        &self.autoscaling_group
    }

    pub fn capacity_provider(&self) -> &ResourceRef<EcsCapacityProvider> {
        &self.capacity_provider
    }

    pub fn capacity_providers(&self) -> &ResourceRef<EcsClusterCapacityProviders> {
        &self.capacity_providers
    }

    /// Declare a task definition running `params.image` on this cluster
    ///
    /// Declares an execution role (image pull and logs), a task role (logs
    /// only), a log group `<cluster>/<workload>` and the task definition,
    /// which waits on the image build step.
    pub fn deploy_workload(
        &self,
        stack: &mut Stack,
        params: WorkloadParams<'_>,
    ) -> SynthResult<WorkloadDefinition> {
        let WorkloadParams {
            name,
            image,
            env,
            region,
            config,
            tags,
        } = params;

        validate_non_empty(&name, "workload name")?;
        validate_non_empty(&region, "region")?;
        validate_resource_shape(config.shape.cpu, config.shape.memory)?;
        validate_log_retention(config.log_retention_days)?;
        config.port.validate()?;
        if env.keys().any(|key| key.trim().is_empty()) {
            return Err(ValidationError::EmptyField("environment variable name").into());
        }

        staged(stack, |stack| {
            let execution_role = declare_service_role(
                stack,
                &format!("{}-execution-role", name),
                ECS_TASKS_SERVICE,
                Some(("allow-ecr-pull", &EXECUTION_ACTIONS[..])),
                &tags,
            )?;

            let task_role = declare_service_role(
                stack,
                &format!("{}-task-role", name),
                ECS_TASKS_SERVICE,
                Some(("allow-logging", &LOGGING_ACTIONS[..])),
                &tags,
            )?;

            let log_group = stack.declare::<CloudwatchLogGroup>(
                format!("{}-ecr-log-group", name),
                Block::new()
                    .attr("name", self.name().append(format!("/{}", name)))
                    .attr("retention_in_days", config.log_retention_days)
                    .tags(&tags),
            )?;

            // BTreeMap iteration keeps the variables sorted by name
            let environment = Value::list(env.iter().map(|(key, value)| {
                Value::map([("name", key.as_str()), ("value", value.as_str())])
            }));

            let container = Value::map([
                ("name", Value::from(&name)),
                ("image", Value::from(image.tag())),
                ("cpu", Value::from(config.shape.cpu)),
                ("memory", Value::from(config.shape.memory)),
                ("essential", Value::from(true)),
                ("environment", environment),
                (
                    "portMappings",
                    Value::list([Value::map([
                        ("containerPort", Value::from(config.port.container_port)),
                        ("hostPort", Value::from(config.port.host_port)),
                        ("protocol", Value::from("tcp")),
                    ])]),
                ),
                (
                    "logConfiguration",
                    Value::map([
                        ("logDriver", Value::from("awslogs")),
                        (
                            "options",
                            Value::map([
                                ("awslogs-group", Value::from(log_group.attr("name"))),
                                ("awslogs-region", Value::from(&region)),
                                ("awslogs-stream-prefix", Value::from(&name)),
                            ]),
                        ),
                    ]),
                ),
            ]);

            let task_definition = stack.declare::<EcsTaskDefinition>(
                format!("{}-task-definition", name),
                Block::new()
                    .attr("family", &name)
                    .attr("cpu", config.shape.cpu.to_string())
                    .attr("memory", config.shape.memory.to_string())
                    .attr("requires_compatibilities", Value::list(["FARGATE", "EC2"]))
                    .attr("network_mode", "awsvpc")
                    .attr("execution_role_arn", execution_role.arn())
                    .attr("task_role_arn", task_role.arn())
                    .attr("container_definitions", Value::encoded(Value::list([container])))
                    .depends_on(image.build_handle())
                    .tags(&tags),
            )?;

            info!(
                stack = %stack.id(),
                workload = %name,
                cpu = config.shape.cpu,
                memory = config.shape.memory,
                "Deployed workload"
            );

            Ok(WorkloadDefinition {
                name: name.clone(),
                port: config.port,
                task_definition,
                execution_role,
                task_role,
                log_group,
            })
        })
    }
}

/// Base64 user data joining an instance to `cluster_name`
fn instance_user_data(cluster_name: &str) -> String {
    let script = format!(
        "#!/bin/bash\necho ECS_CLUSTER={} >> /etc/ecs/ecs.config\n",
        cluster_name
    );
    base64::engine::general_purpose::STANDARD.encode(script)
}
