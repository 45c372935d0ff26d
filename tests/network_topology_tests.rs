// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology Tests
//!
//! Verifies subnet placement, NAT pairing and validation of the network
//! builder against the three-zone plan.

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;

use cim_infrastructure_aws::constructs::{NetworkSpec, NetworkTopologyBuilder};
use cim_infrastructure_aws::domain::{SubnetTier, ValidationError};
use cim_infrastructure_aws::graph::kinds::{
    Eip, InternetGateway, NatGateway, RouteTable, RouteTableAssociation, Subnet, Vpc,
};
use cim_infrastructure_aws::graph::{App, Value};
use cim_infrastructure_aws::SynthError;

#[test]
fn test_three_zone_plan_counts() {
    let mut stack = stack("vpc");
    let topology = network(&mut stack);

    assert_eq!(topology.public_subnet_ids().len(), 3);
    assert_eq!(topology.private_subnet_ids().len(), 3);

    assert_eq!(stack.resources_of::<Vpc>().count(), 1);
    assert_eq!(stack.resources_of::<Subnet>().count(), 6);
    assert_eq!(stack.resources_of::<InternetGateway>().count(), 1);
    assert_eq!(stack.resources_of::<Eip>().count(), 3);
    assert_eq!(stack.resources_of::<NatGateway>().count(), 3);
    // One shared public table plus one per private subnet
    assert_eq!(stack.resources_of::<RouteTable>().count(), 4);
    assert_eq!(stack.resources_of::<RouteTableAssociation>().count(), 6);
}

#[test]
fn test_subnets_follow_cidr_and_zone_order() {
    let mut stack = stack("vpc");
    let topology = network(&mut stack);

    let public: Vec<String> = topology
        .public_subnets()
        .iter()
        .map(|s| s.cidr.to_string())
        .collect();
    let private: Vec<String> = topology
        .private_subnets()
        .iter()
        .map(|s| s.cidr.to_string())
        .collect();
    assert_eq!(public, PUBLIC_CIDRS.to_vec());
    assert_eq!(private, PRIVATE_CIDRS.to_vec());

    for (i, placement) in topology.private_subnets().iter().enumerate() {
        assert_eq!(placement.index, i);
        assert_eq!(placement.tier, SubnetTier::Private);
        assert_eq!(placement.availability_zone, zones()[i]);
    }
}

#[test]
fn test_private_route_table_uses_matching_nat() {
    let mut stack = stack("vpc");
    let topology = network(&mut stack);

    for route in topology.nat_routes() {
        let public_subnet = &topology.public_subnets()[route.index];
        let nat = stack.resource(&route.nat_gateway.address()).unwrap();
        assert_eq!(
            nat.attribute("subnet_id"),
            Some(&Value::from(public_subnet.subnet.id()))
        );
        assert_eq!(
            nat.attribute("allocation_id"),
            Some(&Value::from(route.elastic_ip.attr("allocation_id")))
        );

        let table = stack.resource(&route.route_table.address()).unwrap();
        let first_route = match table.attribute("route") {
            Some(Value::List(routes)) => routes[0].clone(),
            other => panic!("unexpected route attribute: {other:?}"),
        };
        assert_eq!(
            first_route.get("nat_gateway_id"),
            Some(&Value::from(route.nat_gateway.id()))
        );
        assert_eq!(first_route.get("cidr_block"), Some(&Value::from("0.0.0.0/0")));
    }
}

#[test]
fn test_private_associations_pair_table_and_subnet_by_index() {
    let mut stack = stack("vpc");
    let topology = network(&mut stack);
    let id = stack.id().clone();

    let mut app = App::new();
    app.add_stack(stack).unwrap();
    let synthesis = app.synthesize().unwrap();
    let document = synthesis.document(&id).unwrap();
    let associations = document["resource"]["aws_route_table_association"]
        .as_object()
        .unwrap();

    let private: Vec<_> = associations
        .iter()
        .filter(|(label, _)| label.contains("-private-"))
        .collect();
    assert_eq!(private.len(), topology.private_subnets().len());

    for (i, route) in topology.nat_routes().iter().enumerate() {
        let label = format!("main-private-route-table-association-{i}");
        let association = &associations[&label];
        assert_eq!(
            association["route_table_id"],
            route.route_table.id().to_string()
        );
        assert_eq!(
            association["subnet_id"],
            topology.private_subnets()[i].subnet.id().to_string()
        );
    }

    for (i, subnet) in topology.public_subnets().iter().enumerate() {
        let label = format!("main-public-route-table-association-{i}");
        assert_eq!(
            associations[&label]["route_table_id"],
            topology.public_route_table().id().to_string()
        );
        assert_eq!(associations[&label]["subnet_id"], subnet.subnet.id().to_string());
    }
}

#[test]
fn test_gateways_wait_for_internet_gateway() {
    let mut stack = stack("vpc");
    let topology = network(&mut stack);
    let igw = topology.internet_gateway().handle();

    for route in topology.nat_routes() {
        assert!(stack.resource(&route.elastic_ip.address()).unwrap().waits_for(&igw));
        assert!(stack.resource(&route.nat_gateway.address()).unwrap().waits_for(&igw));
    }
}

#[test]
fn test_mismatched_tiers_rejected() {
    let mut stack = stack("vpc");
    let spec = NetworkSpec::new(VPC_CIDR, PUBLIC_CIDRS, ["10.0.0.0/19", "10.0.32.0/19"]);

    let err = NetworkTopologyBuilder::new(zones())
        .build(&mut stack, "main", &spec, &tags())
        .unwrap_err();

    assert!(matches!(
        err,
        SynthError::Validation(ValidationError::MismatchedSubnetCounts {
            public: 3,
            private: 2
        })
    ));
    assert!(stack.resources().is_empty());
}

#[test]
fn test_overlapping_subnets_rejected() {
    let mut stack = stack("vpc");
    let spec = NetworkSpec::new(VPC_CIDR, ["10.0.0.0/19"], ["10.0.16.0/20"]);

    let err = NetworkTopologyBuilder::new(zones())
        .build(&mut stack, "main", &spec, &tags())
        .unwrap_err();

    assert!(matches!(
        err,
        SynthError::Validation(ValidationError::OverlappingSubnets { .. })
    ));
}
