// Copyright (c) 2025 - Cowboy AI, Inc.
//! Service Exposure
//!
//! One application load balancer with a single HTTP listener answering 404 by
//! default. Each exposed service adds a target group, a path rule on the
//! listener and an ECS service registered with the target group.
//!
//! # Invariants
//!
//! - Rule priorities on the listener are distinct and within `1..=50000`
//! - Path patterns on the listener are distinct
//! - Exactly one target group and one listener rule per exposure
//! - A service starts only after both the listener and its rule exist
//! - Balancer and target group names fit [`LB_NAME_LIMIT`]
//! - Target groups and services address the container port

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::invariants::{path_pattern_for, validate_listener_priority, validate_non_empty};
use crate::domain::{fit_name, Tags, ValidationError};
use crate::errors::SynthResult;
use crate::graph::kinds::{EcsService, Lb, LbListener, LbListenerRule, LbTargetGroup, SecurityGroup};
use crate::graph::{Block, Expr, ResourceRef, Stack, Value};

use super::cluster::{Cluster, WorkloadDefinition};
use super::network::NetworkTopology;
use super::security::{SecurityGroupSpec, SecurityRule};
use super::staged;

/// Longest name the load balancing service accepts for balancers and target
/// groups
pub const LB_NAME_LIMIT: usize = 32;

/// Listener and routing defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub port: u16,
    /// First priority handed out when none is given
    pub priority_start: u32,
    pub priority_step: u32,
    pub health_check_path: String,
    /// Access logs are written here when set
    pub access_log_bucket: Option<String>,
    /// Body of the default 404 response
    pub not_found_message: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: 80,
            priority_start: 100,
            priority_step: 1,
            health_check_path: "/ready".to_string(),
            access_log_bucket: None,
            not_found_message: "Could not find the resource you are looking for".to_string(),
        }
    }
}

/// Hands out listener rule priorities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityAllocator {
    start: u32,
    step: u32,
    used: BTreeSet<u32>,
}

impl PriorityAllocator {
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            start,
            step: step.max(1),
            used: BTreeSet::new(),
        }
    }

    /// Next free priority in the `start + n * step` sequence
    pub fn peek(&self) -> u32 {
        let mut candidate = self.start;
        while self.used.contains(&candidate) {
            candidate = candidate.saturating_add(self.step);
        }
        candidate
    }

    pub fn is_used(&self, priority: u32) -> bool {
        self.used.contains(&priority)
    }

    pub fn commit(&mut self, priority: u32) {
        self.used.insert(priority);
    }
}

/// Inputs of [`ServiceExposer::expose_service`]
#[derive(Debug, Clone)]
pub struct ExposeServiceParams<'w> {
    pub name: String,
    pub workload: &'w WorkloadDefinition,
    /// Security group id of the service tasks
    pub security_group: Expr,
    pub path_prefix: String,
    /// Explicit rule priority; next free one when unset
    pub priority: Option<u32>,
    pub desired_count: u32,
    pub tags: Tags,
}

impl<'w> ExposeServiceParams<'w> {
    pub fn new(
        name: impl Into<String>,
        workload: &'w WorkloadDefinition,
        security_group: Expr,
        path_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            workload,
            security_group,
            path_prefix: path_prefix.into(),
            priority: None,
            desired_count: 1,
            tags: Tags::new(),
        }
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_desired_count(mut self, desired_count: u32) -> Self {
        self.desired_count = desired_count;
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// One routable endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceExposure {
    pub name: String,
    pub path_pattern: String,
    pub priority: u32,
    pub health_check_path: String,
    pub target_group: ResourceRef<LbTargetGroup>,
    pub listener_rule: ResourceRef<LbListenerRule>,
    pub service: ResourceRef<EcsService>,
}

/// Load balancer shared by every exposed service
///
/// Borrows the network and cluster it routes into.
#[derive(Debug)]
pub struct ServiceExposer<'a> {
    network: &'a NetworkTopology,
    cluster: &'a Cluster,
    config: ListenerConfig,
    security_group: ResourceRef<SecurityGroup>,
    load_balancer: ResourceRef<Lb>,
    listener: ResourceRef<LbListener>,
    priorities: PriorityAllocator,
    patterns: BTreeSet<String>,
    exposures: Vec<ServiceExposure>,
}

impl<'a> ServiceExposer<'a> {
    /// Declare the load balancer, its security group and the HTTP listener
    pub fn new(
        stack: &mut Stack,
        name: &str,
        network: &'a NetworkTopology,
        cluster: &'a Cluster,
        config: ListenerConfig,
        tags: &Tags,
    ) -> SynthResult<Self> {
        validate_non_empty(name, "load balancer name")?;
        validate_non_empty(&config.health_check_path, "health check path")?;
        validate_listener_priority(config.priority_start)?;

        let (security_group, load_balancer, listener) = staged(stack, |stack| {
            let security_group = SecurityGroupSpec::new(network.vpc_id())
                .ingress(SecurityRule::tcp(config.port).anywhere())
                .egress(SecurityRule::all_traffic().anywhere())
                .tagged(tags)
                .declare(stack, &format!("{}-load-balancer-sg", name))?;

            let mut lb = Block::new()
                .attr("name", fit_name(name, LB_NAME_LIMIT))
                .attr("internal", false)
                .attr("load_balancer_type", "application")
                .attr("security_groups", Value::list([security_group.id()]))
                .attr("subnets", Value::list(network.public_subnet_ids()))
                .tags(tags);
            if let Some(bucket) = &config.access_log_bucket {
                lb = lb.attr(
                    "access_logs",
                    Value::map([
                        ("enabled", Value::from(true)),
                        ("bucket", Value::from(bucket)),
                    ]),
                );
            }
            let load_balancer = stack.declare::<Lb>(format!("{}-load-balancer", name), lb)?;

            let listener = stack.declare::<LbListener>(
                format!("{}-lb-listener", name),
                Block::new()
                    .attr("load_balancer_arn", load_balancer.arn())
                    .attr("port", config.port)
                    .attr("protocol", "HTTP")
                    .attr(
                        "default_action",
                        Value::list([Value::map([
                            ("type", Value::from("fixed-response")),
                            (
                                "fixed_response",
                                Value::map([
                                    ("content_type", "text/plain"),
                                    ("status_code", "404"),
                                    ("message_body", config.not_found_message.as_str()),
                                ]),
                            ),
                        ])]),
                    )
                    .tags(tags),
            )?;

            info!(stack = %stack.id(), load_balancer = %name, port = config.port, "Declared load balancer");
            Ok((security_group, load_balancer, listener))
        })?;

        Ok(Self {
            network,
            cluster,
            priorities: PriorityAllocator::new(config.priority_start, config.priority_step),
            config,
            security_group,
            load_balancer,
            listener,
            patterns: BTreeSet::new(),
            exposures: Vec::new(),
        })
    }

    pub fn security_group(&self) -> &ResourceRef<SecurityGroup> {
        &self.security_group
    }

    pub fn load_balancer(&self) -> &ResourceRef<Lb> {
        &self.load_balancer
    }

    pub fn listener(&self) -> &ResourceRef<LbListener> {
        &self.listener
    }

    pub fn dns_name(&self) -> Expr {
        self.load_balancer.attr("dns_name")
    }

    pub fn exposures(&self) -> &[ServiceExposure] {
        &self.exposures
    }

    /// Priority the next exposure without an explicit one would get
    pub fn next_priority(&self) -> u32 {
        self.priorities.peek()
    }

    /// Route `<path_prefix>*` on the listener to a new service running
    /// `params.workload`
    pub fn expose_service(
        &mut self,
        stack: &mut Stack,
        params: ExposeServiceParams<'_>,
    ) -> SynthResult<ServiceExposure> {
        let ExposeServiceParams {
            name,
            workload,
            security_group,
            path_prefix,
            priority,
            desired_count,
            tags,
        } = params;

        validate_non_empty(&name, "service name")?;
        let path_pattern = path_pattern_for(&path_prefix)?;
        if self.patterns.contains(&path_pattern) {
            return Err(ValidationError::DuplicatePathPattern(path_pattern).into());
        }

        let priority = match priority {
            Some(explicit) => {
                if self.priorities.is_used(explicit) {
                    return Err(ValidationError::DuplicatePriority(explicit).into());
                }
                explicit
            }
            None => self.priorities.peek(),
        };
        validate_listener_priority(priority)?;

        let network = self.network;
        let cluster = self.cluster;
        let health_check_path = self.config.health_check_path.clone();
        let load_balancer = &self.load_balancer;
        let listener = &self.listener;

        let exposure = staged(stack, |stack| {
            let target_group = stack.declare::<LbTargetGroup>(
                format!("{}-target-group", name),
                Block::new()
                    .attr("name", fit_name(&format!("{}-tg", name), LB_NAME_LIMIT))
                    .attr("port", workload.port.container_port)
                    .attr("protocol", "HTTP")
                    .attr("target_type", "ip")
                    .attr("vpc_id", network.vpc_id())
                    .attr(
                        "health_check",
                        Value::map([
                            ("enabled", Value::from(true)),
                            ("path", Value::from(&health_check_path)),
                        ]),
                    )
                    .depends_on(load_balancer.handle())
                    .tags(&tags),
            )?;

            let listener_rule = stack.declare::<LbListenerRule>(
                format!("{}-lb-listener-rule", name),
                Block::new()
                    .attr("listener_arn", listener.arn())
                    .attr("priority", priority)
                    .attr(
                        "action",
                        Value::list([Value::map([
                            ("type", Value::from("forward")),
                            ("target_group_arn", Value::from(target_group.arn())),
                        ])]),
                    )
                    .attr(
                        "condition",
                        Value::list([Value::map([(
                            "path_pattern",
                            Value::map([("values", Value::list([path_pattern.as_str()]))]),
                        )])]),
                    )
                    .tags(&tags),
            )?;

            let service = stack.declare::<EcsService>(
                format!("{}-ecs-service", name),
                Block::new()
                    .attr("name", &name)
                    .attr("launch_type", "FARGATE")
                    .attr("cluster", cluster.id())
                    .attr("desired_count", desired_count)
                    .attr("task_definition", workload.arn())
                    .attr(
                        "network_configuration",
                        Value::map([
                            ("subnets", Value::list(network.public_subnet_ids())),
                            ("assign_public_ip", Value::from(true)),
                            ("security_groups", Value::list([security_group.clone()])),
                        ]),
                    )
                    .attr(
                        "load_balancer",
                        Value::list([Value::map([
                            ("container_name", Value::from(workload.container_name())),
                            ("container_port", Value::from(workload.port.container_port)),
                            ("target_group_arn", Value::from(target_group.arn())),
                        ])]),
                    )
                    .depends_on(listener.handle())
                    .depends_on(listener_rule.handle())
                    .tags(&tags),
            )?;

            Ok(ServiceExposure {
                name: name.clone(),
                path_pattern: path_pattern.clone(),
                priority,
                health_check_path: health_check_path.clone(),
                target_group,
                listener_rule,
                service,
            })
        })?;

        self.priorities.commit(priority);
        self.patterns.insert(exposure.path_pattern.clone());
        self.exposures.push(exposure.clone());

        debug!(next_priority = self.priorities.peek(), "Committed listener rule");
        info!(
            stack = %stack.id(),
            service = %exposure.name,
            path = %exposure.path_pattern,
            priority = exposure.priority,
            "Exposed service"
        );
        Ok(exposure)
    }
}
