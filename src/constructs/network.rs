// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology
//!
//! Partitions a VPC into paired public/private subnets spread across
//! availability zones and wires their routing.
//!
//! # Layout
//!
//! For `k` subnets per tier:
//!
//! - one VPC with DNS support and hostnames enabled
//! - `k` public and `k` private subnets; subnet `i` of either tier lands in
//!   zone `i`
//! - one internet gateway and one public route table (`0.0.0.0/0` to the
//!   gateway) shared by every public subnet
//! - per index `i`: an elastic IP and NAT gateway in public subnet `i`, and a
//!   private route table sending `0.0.0.0/0` through that NAT gateway,
//!   associated with private subnet `i`
//!
//! # Invariants
//!
//! - Public and private lists are the same, non-zero length
//! - Zones are distinct and, when a region is given, belong to it
//! - No tier has more subnets than there are zones (no wrap-around)
//! - Every subnet is canonical, inside the VPC block, and disjoint from all
//!   others
//! - Subnet references are positional with their source CIDRs and zones

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::invariants::validate_network_spec;
use crate::domain::{
    validate_zones, Ipv4Cidr, SubnetTier, Tags, ValidatedNetwork, ValidationError, ANY_IPV4,
};
use crate::errors::SynthResult;
use crate::graph::kinds::{
    Eip, InternetGateway, NatGateway, RouteTable, RouteTableAssociation, Subnet, Vpc,
};
use crate::graph::{Block, Expr, GraphError, ResourceRef, Stack, Value};

use super::{named, staged};

/// Desired VPC shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub cidr_block: String,
    pub public_cidrs: Vec<String>,
    pub private_cidrs: Vec<String>,
}

impl NetworkSpec {
    pub fn new<S: Into<String>>(
        cidr_block: impl Into<String>,
        public_cidrs: impl IntoIterator<Item = S>,
        private_cidrs: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            cidr_block: cidr_block.into(),
            public_cidrs: public_cidrs.into_iter().map(Into::into).collect(),
            private_cidrs: private_cidrs.into_iter().map(Into::into).collect(),
        }
    }

    /// Check every invariant against `zone_count` zones
    pub fn validate(&self, zone_count: usize) -> Result<ValidatedNetwork, ValidationError> {
        validate_network_spec(
            &self.cidr_block,
            &self.public_cidrs,
            &self.private_cidrs,
            zone_count,
        )
    }
}

impl Default for NetworkSpec {
    fn default() -> Self {
        Self::new(
            "192.168.0.0/16",
            ["192.168.0.0/18", "192.168.64.0/18"],
            ["192.168.128.0/18", "192.168.192.0/18"],
        )
    }
}

/// A declared subnet and where it landed
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetPlacement {
    pub index: usize,
    pub tier: SubnetTier,
    pub cidr: Ipv4Cidr,
    pub availability_zone: String,
    pub subnet: ResourceRef<Subnet>,
}

/// Egress path of private subnet `index`
#[derive(Debug, Clone, PartialEq)]
pub struct NatRoute {
    pub index: usize,
    pub elastic_ip: ResourceRef<Eip>,
    pub nat_gateway: ResourceRef<NatGateway>,
    pub route_table: ResourceRef<RouteTable>,
}

/// Realized network
///
/// Immutable once built; downstream stages read identifiers from it.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTopology {
    name: String,
    vpc: ResourceRef<Vpc>,
    internet_gateway: ResourceRef<InternetGateway>,
    public_route_table: ResourceRef<RouteTable>,
    public: Vec<SubnetPlacement>,
    private: Vec<SubnetPlacement>,
    nat_routes: Vec<NatRoute>,
}

impl NetworkTopology {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vpc(&self) -> &ResourceRef<Vpc> {
        &self.vpc
    }

    pub fn vpc_id(&self) -> Expr {
        self.vpc.id()
    }

    pub fn internet_gateway(&self) -> &ResourceRef<InternetGateway> {
        &self.internet_gateway
    }

    pub fn public_route_table(&self) -> &ResourceRef<RouteTable> {
        &self.public_route_table
    }

    /// Public subnets in CIDR order
    pub fn public_subnets(&self) -> &[SubnetPlacement] {
        &self.public
    }

    /// Private subnets in CIDR order
    pub fn private_subnets(&self) -> &[SubnetPlacement] {
        &self.private
    }

    pub fn public_subnet_ids(&self) -> Vec<Expr> {
        self.public.iter().map(|p| p.subnet.id()).collect()
    }

    pub fn private_subnet_ids(&self) -> Vec<Expr> {
        self.private.iter().map(|p| p.subnet.id()).collect()
    }

    /// NAT path per private subnet, by index
    pub fn nat_routes(&self) -> &[NatRoute] {
        &self.nat_routes
    }

    /// Export the VPC and subnet ids as outputs of `stack`
    pub fn export_outputs(&self, stack: &mut Stack) -> Result<(), GraphError> {
        stack.add_output("vpc-id", self.vpc_id(), Some("VPC id"))?;
        stack.add_output(
            "public-subnet-ids",
            Value::list(self.public_subnet_ids()),
            Some("Public subnet ids, in CIDR order"),
        )?;
        stack.add_output(
            "private-subnet-ids",
            Value::list(self.private_subnet_ids()),
            Some("Private subnet ids, in CIDR order"),
        )?;
        Ok(())
    }
}

/// Builds a [`NetworkTopology`] from a [`NetworkSpec`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkTopologyBuilder {
    availability_zones: Vec<String>,
    region: Option<String>,
}

impl NetworkTopologyBuilder {
    /// Builder spreading subnets over `availability_zones`, in order
    pub fn new<S: Into<String>>(availability_zones: impl IntoIterator<Item = S>) -> Self {
        Self {
            availability_zones: availability_zones.into_iter().map(Into::into).collect(),
            region: None,
        }
    }

    /// Zones `a`, `b` and `c` of `region`
    pub fn for_region(region: &str) -> Self {
        Self::new(crate::config::zones_for(region)).in_region(region)
    }

    /// Require every zone to belong to `region`
    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn availability_zones(&self) -> &[String] {
        &self.availability_zones
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Declare the network described by `spec` into `stack`
    ///
    /// `name` labels the VPC and prefixes every other block. Nothing is
    /// declared unless the whole topology is valid.
    pub fn build(
        &self,
        stack: &mut Stack,
        name: &str,
        spec: &NetworkSpec,
        tags: &Tags,
    ) -> SynthResult<NetworkTopology> {
        validate_zones(&self.availability_zones, self.region())?;
        let validated = spec.validate(self.availability_zones.len())?;

        staged(stack, |stack| {
            let topology = self.declare(stack, name, &validated, tags)?;
            info!(
                stack = %stack.id(),
                vpc = %validated.vpc,
                subnets_per_tier = validated.public.len(),
                "Built network topology"
            );
            Ok(topology)
        })
    }

    fn declare(
        &self,
        stack: &mut Stack,
        name: &str,
        network: &ValidatedNetwork,
        tags: &Tags,
    ) -> Result<NetworkTopology, GraphError> {
        let vpc = stack.declare::<Vpc>(
            name,
            Block::new()
                .attr("cidr_block", network.vpc.to_string())
                .attr("enable_dns_hostnames", true)
                .attr("enable_dns_support", true)
                .tags(&named(tags, name)),
        )?;

        let public = self.declare_subnets(stack, name, &vpc, SubnetTier::Public, &network.public, tags)?;
        let private =
            self.declare_subnets(stack, name, &vpc, SubnetTier::Private, &network.private, tags)?;

        let internet_gateway = stack.declare::<InternetGateway>(
            format!("{}-internet-gateway", name),
            Block::new()
                .attr("vpc_id", vpc.id())
                .tags(&named(tags, &format!("{}-internet-gateway", name))),
        )?;

        let public_route_table = stack.declare::<RouteTable>(
            format!("{}-public-route-table", name),
            Block::new()
                .attr("vpc_id", vpc.id())
                .attr(
                    "route",
                    Value::list([Value::map([
                        ("cidr_block", Value::from(ANY_IPV4)),
                        ("gateway_id", Value::from(internet_gateway.id())),
                    ])]),
                )
                .tags(&named(tags, &format!("{}-public-route-table", name))),
        )?;

        let mut nat_routes = Vec::with_capacity(public.len());
        for (public_subnet, private_subnet) in public.iter().zip(&private) {
            let i = public_subnet.index;

            let elastic_ip = stack.declare::<Eip>(
                format!("{}-eip-{}", name, i),
                Block::new()
                    .attr("domain", "vpc")
                    .depends_on(internet_gateway.handle())
                    .tags(&named(tags, &format!("{}-eip-{}", name, i))),
            )?;

            let nat_gateway = stack.declare::<NatGateway>(
                format!("{}-nat-gateway-{}", name, i),
                Block::new()
                    .attr("allocation_id", elastic_ip.attr("allocation_id"))
                    .attr("subnet_id", public_subnet.subnet.id())
                    .depends_on(internet_gateway.handle())
                    .tags(&named(tags, &format!("{}-nat-gateway-{}", name, i))),
            )?;

            stack.declare::<RouteTableAssociation>(
                format!("{}-public-route-table-association-{}", name, i),
                Block::new()
                    .attr("route_table_id", public_route_table.id())
                    .attr("subnet_id", public_subnet.subnet.id()),
            )?;

            let route_table = stack.declare::<RouteTable>(
                format!("{}-private-route-table-{}", name, i),
                Block::new()
                    .attr("vpc_id", vpc.id())
                    .attr(
                        "route",
                        Value::list([Value::map([
                            ("cidr_block", Value::from(ANY_IPV4)),
                            ("nat_gateway_id", Value::from(nat_gateway.id())),
                        ])]),
                    )
                    .tags(&named(tags, &format!("{}-private-route-table-{}", name, i))),
            )?;

            stack.declare::<RouteTableAssociation>(
                format!("{}-private-route-table-association-{}", name, i),
                Block::new()
                    .attr("route_table_id", route_table.id())
                    .attr("subnet_id", private_subnet.subnet.id()),
            )?;

            debug!(index = i, zone = %public_subnet.availability_zone, "Wired NAT route");
            nat_routes.push(NatRoute {
                index: i,
                elastic_ip,
                nat_gateway,
                route_table,
            });
        }

        Ok(NetworkTopology {
            name: name.to_string(),
            vpc,
            internet_gateway,
            public_route_table,
            public,
            private,
            nat_routes,
        })
    }

    fn declare_subnets(
        &self,
        stack: &mut Stack,
        name: &str,
        vpc: &ResourceRef<Vpc>,
        tier: SubnetTier,
        cidrs: &[Ipv4Cidr],
        tags: &Tags,
    ) -> Result<Vec<SubnetPlacement>, GraphError> {
        cidrs
            .iter()
            .zip(&self.availability_zones)
            .enumerate()
            .map(|(index, (cidr, zone))| {
                let label = format!("{}-{}-{}", name, tier, index);
                let subnet = stack.declare::<Subnet>(
                    label.as_str(),
                    Block::new()
                        .attr("vpc_id", vpc.id())
                        .attr("cidr_block", cidr.to_string())
                        .attr("availability_zone", zone)
                        .attr("map_public_ip_on_launch", tier == SubnetTier::Public)
                        .tags(&named(tags, &label)),
                )?;
                Ok(SubnetPlacement {
                    index,
                    tier,
                    cidr: *cidr,
                    availability_zone: zone.clone(),
                    subnet,
                })
            })
            .collect()
    }
}
