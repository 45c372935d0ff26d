// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Subnet Pairing
//!
//! For any plan of `k` public and `k` private /24 blocks inside a /16, the
//! builder yields `k` subnets per tier in input order, and NAT path `i`
//! joins public subnet `i` to private subnet `i`.

use cim_infrastructure_aws::constructs::{NetworkSpec, NetworkTopologyBuilder};
use cim_infrastructure_aws::domain::{StackId, Tags, ValidationError};
use cim_infrastructure_aws::graph::kinds::{Eip, NatGateway, Subnet};
use cim_infrastructure_aws::graph::{Stack, Value};
use cim_infrastructure_aws::SynthError;
use proptest::prelude::*;

const ZONES: [&str; 3] = ["eu-west-1a", "eu-west-1b", "eu-west-1c"];

// ============================================================================
// Strategies
// ============================================================================

/// (vpc, public blocks, private blocks) with distinct /24s inside one /16
fn plan() -> impl Strategy<Value = (String, Vec<String>, Vec<String>)> {
    (1usize..=3, any::<u8>()).prop_flat_map(|(k, second)| {
        prop::sample::subsequence((0u8..=255).collect::<Vec<_>>(), 2 * k)
            .prop_shuffle()
            .prop_map(move |octets| {
                let block = |third: &u8| format!("10.{}.{}.0/24", second, third);
                (
                    format!("10.{}.0.0/16", second),
                    octets[..k].iter().map(block).collect(),
                    octets[k..].iter().map(block).collect(),
                )
            })
    })
}

fn stack() -> Stack {
    Stack::new(StackId::new("vpc").unwrap())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_tiers_pair_positionally((vpc, public, private) in plan()) {
        let k = public.len();
        let mut stack = stack();
        let topology = NetworkTopologyBuilder::new(ZONES)
            .build(
                &mut stack,
                "main",
                &NetworkSpec::new(vpc, public.clone(), private.clone()),
                &Tags::new(),
            )
            .unwrap();

        prop_assert_eq!(topology.public_subnet_ids().len(), k);
        prop_assert_eq!(topology.private_subnet_ids().len(), k);
        prop_assert_eq!(stack.resources_of::<Subnet>().count(), 2 * k);
        prop_assert_eq!(stack.resources_of::<NatGateway>().count(), k);
        prop_assert_eq!(stack.resources_of::<Eip>().count(), k);

        for i in 0..k {
            prop_assert_eq!(topology.public_subnets()[i].cidr.to_string(), public[i].clone());
            prop_assert_eq!(topology.private_subnets()[i].cidr.to_string(), private[i].clone());
            prop_assert_eq!(&topology.private_subnets()[i].availability_zone, ZONES[i]);

            let route = &topology.nat_routes()[i];
            prop_assert_eq!(route.index, i);

            let nat = stack.resource(&route.nat_gateway.address()).unwrap();
            let expected_subnet = Value::from(topology.public_subnets()[i].subnet.id());
            prop_assert_eq!(nat.attribute("subnet_id"), Some(&expected_subnet));
        }
    }

    #[test]
    fn prop_mismatched_tiers_declare_nothing(
        (vpc, public, private) in plan(),
        drop_public in any::<bool>(),
    ) {
        let (mut public, mut private) = (public, private);
        if drop_public {
            public.pop();
        } else {
            private.pop();
        }
        prop_assume!(!public.is_empty() && !private.is_empty());

        let mut stack = stack();
        let err = NetworkTopologyBuilder::new(ZONES)
            .build(&mut stack, "main", &NetworkSpec::new(vpc, public, private), &Tags::new())
            .unwrap_err();

        let is_mismatch = matches!(
            err,
            SynthError::Validation(ValidationError::MismatchedSubnetCounts { .. })
        );
        prop_assert!(is_mismatch);
        prop_assert!(stack.resources().is_empty());
    }

    #[test]
    fn prop_blocks_outside_vpc_rejected((_, public, private) in plan(), other in 11u8..=200) {
        let mut stack = stack();
        let vpc = format!("{}.0.0.0/16", other);
        let err = NetworkTopologyBuilder::new(ZONES)
            .build(&mut stack, "main", &NetworkSpec::new(vpc, public, private), &Tags::new())
            .unwrap_err();

        let is_outside = matches!(
            err,
            SynthError::Validation(ValidationError::SubnetOutsideVpc { .. })
        );
        prop_assert!(is_outside);
        prop_assert!(stack.resources().is_empty());
    }
}
