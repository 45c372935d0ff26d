// Copyright (c) 2025 - Cowboy AI, Inc.
//! Infrastructure Domain Models
//!
//! Value objects and pure invariants shared by every construct.
//!
//! # Value Objects with Invariants
//!
//! - [`Ipv4Cidr`] - canonical IPv4 network blocks with containment/overlap checks
//! - [`StackId`] - identifiers usable as engine block labels
//! - [`Tags`] - ordered resource tag sets
//!
//! # Invariants
//!
//! [`invariants`] holds every check that must pass before a declaration is
//! emitted: subnet pairing, zone capacity, scaling bounds, listener routing.

pub mod identifiers;
pub mod invariants;
pub mod network;

pub use identifiers::{fit_name, is_engine_identifier, merge_tags, StackId, Tags};
pub use invariants::{SubnetTier, ValidatedNetwork, ValidationError, ValidationResult};
pub use network::{validate_zones, Ipv4Cidr, NetworkError, ANY_IPV4, ANY_IPV6};
