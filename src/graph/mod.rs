// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Graph
//!
//! Declarative model consumed by the provisioning engine.
//!
//! # Structure
//!
//! - [`App`] owns [`Stack`]s and the ordering edges between them
//! - [`Stack::declare`] adds a block and returns a typed [`ResourceRef`]
//! - [`ResourceRef::attr`] yields an [`Expr`] for wiring attributes
//! - [`ResourceRef::handle`] yields a [`Handle`], the only thing `depends_on`
//!   accepts
//!
//! # Invariants
//!
//! - Block addresses are unique within a stack
//! - A handle is only usable inside the stack that declared it
//! - References to other stacks become remote-state lookups and order the
//!   reading stack after the origin
//! - The stack dependency graph is acyclic

pub mod app;
pub mod asset;
pub mod expr;
pub mod kinds;
pub mod resource;
pub mod stack;
pub mod value;

use thiserror::Error;

use crate::domain::StackId;

pub use app::{App, Manifest, StackManifest, Synthesis, MANIFEST_FILE, STACK_DOCUMENT};
pub use asset::AssetFingerprint;
pub use expr::{Expr, Part, Reference};
pub use kinds::ResourceKind;
pub use resource::{Block, Handle, Lifecycle, LocalExec, Resource, ResourceRef};
pub use stack::{Output, Provider, Stack};
pub use value::Value;

/// Inconsistencies in the declared graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("Invalid block label: {0:?}")]
    InvalidName(String),

    #[error("Duplicate block {address} in stack {stack}")]
    DuplicateResource { stack: StackId, address: String },

    #[error("Duplicate output {name} in stack {stack}")]
    DuplicateOutput { stack: StackId, name: String },

    #[error("Duplicate stack: {0}")]
    DuplicateStack(StackId),

    #[error("Unknown stack: {0}")]
    UnknownStack(StackId),

    /// `depends_on` received a handle declared by another stack
    #[error("Stack {stack} cannot wait on {handle}: handle belongs to another stack")]
    ForeignHandle { stack: StackId, handle: String },

    #[error("Unknown block {address} in stack {stack}")]
    UnknownResource { stack: StackId, address: String },

    #[error("Stack dependency cycle between: {}", join_ids(.0))]
    DependencyCycle(Vec<StackId>),

    #[error("Stack {0} cannot depend on itself")]
    SelfDependency(StackId),

    /// Two exported attributes map to the same output name
    #[error("Export {name} of stack {stack} is claimed by more than one attribute")]
    ExportCollision { stack: StackId, name: String },
}

fn join_ids(ids: &[StackId]) -> String {
    ids.iter()
        .map(StackId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
