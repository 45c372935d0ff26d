// Copyright (c) 2025 - Cowboy AI, Inc.
//! Security groups with inline rules

use crate::domain::{Tags, ANY_IPV4, ANY_IPV6};
use crate::graph::kinds::SecurityGroup;
use crate::graph::{Block, Expr, GraphError, ResourceRef, Stack, Value};

/// One inline ingress or egress rule
///
/// Every rule field is emitted, empty when unused, since the engine treats
/// inline rules as complete objects.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityRule {
    pub description: String,
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_blocks: Vec<String>,
    pub ipv6_cidr_blocks: Vec<String>,
    pub security_groups: Vec<Expr>,
    pub self_reference: bool,
}

impl SecurityRule {
    /// All protocols, all ports
    pub fn all_traffic() -> Self {
        Self {
            description: String::new(),
            protocol: "-1".to_string(),
            from_port: 0,
            to_port: 0,
            cidr_blocks: Vec::new(),
            ipv6_cidr_blocks: Vec::new(),
            security_groups: Vec::new(),
            self_reference: false,
        }
    }

    /// TCP on a single port
    pub fn tcp(port: u16) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            ..Self::all_traffic()
        }
    }

    /// Any IPv4 or IPv6 address
    pub fn anywhere(mut self) -> Self {
        self.cidr_blocks = vec![ANY_IPV4.to_string()];
        self.ipv6_cidr_blocks = vec![ANY_IPV6.to_string()];
        self
    }

    /// Any IPv4 address
    pub fn anywhere_ipv4(mut self) -> Self {
        self.cidr_blocks = vec![ANY_IPV4.to_string()];
        self
    }

    /// Members of another security group
    pub fn from_group(mut self, group_id: Expr) -> Self {
        self.security_groups.push(group_id);
        self
    }

    /// Members of the group itself
    pub fn within_group(mut self) -> Self {
        self.self_reference = true;
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    fn to_value(&self) -> Value {
        Value::map([
            ("description", Value::from(&self.description)),
            ("protocol", Value::from(&self.protocol)),
            ("from_port", Value::from(self.from_port)),
            ("to_port", Value::from(self.to_port)),
            ("cidr_blocks", Value::list(self.cidr_blocks.clone())),
            ("ipv6_cidr_blocks", Value::list(self.ipv6_cidr_blocks.clone())),
            ("prefix_list_ids", Value::empty_list()),
            ("security_groups", Value::list(self.security_groups.clone())),
            ("self", Value::from(self.self_reference)),
        ])
    }
}

/// Desired security group
#[derive(Debug, Clone)]
pub struct SecurityGroupSpec {
    pub name: Option<String>,
    pub description: Option<String>,
    pub vpc_id: Expr,
    pub ingress: Vec<SecurityRule>,
    pub egress: Vec<SecurityRule>,
    pub tags: Tags,
    /// Leave rule drift to out-of-band changes
    pub ignore_rule_changes: bool,
}

impl SecurityGroupSpec {
    pub fn new(vpc_id: Expr) -> Self {
        Self {
            name: None,
            description: None,
            vpc_id,
            ingress: Vec::new(),
            egress: Vec::new(),
            tags: Tags::new(),
            ignore_rule_changes: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn ingress(mut self, rule: SecurityRule) -> Self {
        self.ingress.push(rule);
        self
    }

    pub fn egress(mut self, rule: SecurityRule) -> Self {
        self.egress.push(rule);
        self
    }

    pub fn tagged(mut self, tags: &Tags) -> Self {
        self.tags = tags.clone();
        self
    }

    pub fn ignore_rule_changes(mut self) -> Self {
        self.ignore_rule_changes = true;
        self
    }

    /// Declare the group under `label`
    pub fn declare(
        &self,
        stack: &mut Stack,
        label: &str,
    ) -> Result<ResourceRef<SecurityGroup>, GraphError> {
        let mut block = Block::new()
            .attr("vpc_id", &self.vpc_id)
            .attr("name", self.name.clone())
            .attr(
                "ingress",
                Value::list(self.ingress.iter().map(SecurityRule::to_value)),
            )
            .attr(
                "egress",
                Value::list(self.egress.iter().map(SecurityRule::to_value)),
            )
            .tags(&self.tags);
        if let Some(description) = &self.description {
            block = block.attr("description", description);
        }
        if self.ignore_rule_changes {
            block = block.ignore_changes(["ingress", "egress"]);
        }
        stack.declare::<SecurityGroup>(label, block)
    }
}
