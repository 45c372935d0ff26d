// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify properties of the network
//! builder that must hold for every valid CIDR plan.

mod property;
