// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! Subnet pairing and validation properties of the network builder.

mod topology_pairing;
