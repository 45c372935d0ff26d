// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declared blocks, typed references and dependency handles

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::domain::{StackId, Tags};

use super::expr::{Expr, Reference};
use super::kinds::ResourceKind;
use super::value::Value;

/// Completion token of a provisioning step
///
/// Handles are only produced by declaring a resource, and `depends_on`
/// accepts nothing else. Holding a handle says "wait for this step", which is
/// distinct from reading one of its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle {
    origin: StackId,
    address: String,
}

impl Handle {
    /// Stack that declared the step
    pub fn origin(&self) -> &StackId {
        &self.origin
    }

    /// Engine address of the step
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.origin, self.address)
    }
}

/// Typed reference to a declared resource
pub struct ResourceRef<K: ResourceKind> {
    origin: StackId,
    name: String,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> ResourceRef<K> {
    pub(crate) fn new(origin: StackId, name: String) -> Self {
        Self {
            origin,
            name,
            _kind: PhantomData,
        }
    }

    /// Stack that declared the resource
    pub fn origin(&self) -> &StackId {
        &self.origin
    }

    /// Block label
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Engine address
    pub fn address(&self) -> String {
        block_address::<K>(&self.name)
    }

    /// Reference to an attribute of the resource
    pub fn attr(&self, attribute: &str) -> Expr {
        Expr::reference(Reference::new(
            self.origin.clone(),
            self.address(),
            attribute,
        ))
    }

    pub fn id(&self) -> Expr {
        self.attr("id")
    }

    pub fn arn(&self) -> Expr {
        self.attr("arn")
    }

    /// Completion token for `depends_on`
    pub fn handle(&self) -> Handle {
        Handle {
            origin: self.origin.clone(),
            address: self.address(),
        }
    }
}

impl<K: ResourceKind> Clone for ResourceRef<K> {
    fn clone(&self) -> Self {
        Self::new(self.origin.clone(), self.name.clone())
    }
}

impl<K: ResourceKind> fmt::Debug for ResourceRef<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRef")
            .field("origin", &self.origin)
            .field("address", &self.address())
            .finish()
    }
}

impl<K: ResourceKind> PartialEq for ResourceRef<K> {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.name == other.name
    }
}

impl<K: ResourceKind> Eq for ResourceRef<K> {}

pub(crate) fn block_address<K: ResourceKind>(name: &str) -> String {
    if K::DATA {
        format!("data.{}.{}", K::TYPE, name)
    } else {
        format!("{}.{}", K::TYPE, name)
    }
}

/// Lifecycle customisation of a block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Lifecycle {
    pub ignore_changes: Vec<String>,
    pub create_before_destroy: bool,
}

/// Command run by the provisioning engine on the machine applying the plan
#[derive(Debug, Clone, PartialEq)]
pub struct LocalExec {
    pub command: Expr,
    pub working_dir: Option<String>,
    pub interpreter: Option<Vec<String>>,
    pub environment: BTreeMap<String, Expr>,
}

impl LocalExec {
    pub fn new(command: impl Into<Expr>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            interpreter: None,
            environment: BTreeMap::new(),
        }
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn interpreter<S: Into<String>>(mut self, args: impl IntoIterator<Item = S>) -> Self {
        self.interpreter = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<Expr>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub(crate) fn to_value(&self) -> Value {
        let mut body = BTreeMap::new();
        body.insert("command".to_string(), Value::from(&self.command));
        if let Some(dir) = &self.working_dir {
            body.insert("working_dir".to_string(), Value::from(dir));
        }
        if let Some(interpreter) = &self.interpreter {
            body.insert("interpreter".to_string(), Value::list(interpreter.clone()));
        }
        if !self.environment.is_empty() {
            body.insert(
                "environment".to_string(),
                Value::map(self.environment.iter().map(|(k, v)| (k.clone(), v.clone()))),
            );
        }
        Value::map([("local-exec", Value::Map(body))])
    }
}

/// Body of a declaration: attributes plus meta-arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) depends_on: Vec<Handle>,
    pub(crate) lifecycle: Option<Lifecycle>,
    pub(crate) provisioners: Vec<LocalExec>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute
    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Set `tags`, skipped when empty
    pub fn tags(self, tags: &Tags) -> Self {
        if tags.is_empty() {
            return self;
        }
        self.attr("tags", tags)
    }

    /// Wait for `handle` before this block is created
    pub fn depends_on(mut self, handle: Handle) -> Self {
        if !self.depends_on.contains(&handle) {
            self.depends_on.push(handle);
        }
        self
    }

    pub fn ignore_changes<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        let lifecycle = self.lifecycle.get_or_insert_with(Lifecycle::default);
        lifecycle
            .ignore_changes
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn create_before_destroy(mut self) -> Self {
        self.lifecycle
            .get_or_insert_with(Lifecycle::default)
            .create_before_destroy = true;
        self
    }

    pub fn provisioner(mut self, exec: LocalExec) -> Self {
        self.provisioners.push(exec);
        self
    }
}

/// A declared block inside a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    resource_type: &'static str,
    name: String,
    data: bool,
    block: Block,
}

impl Resource {
    pub(crate) fn new<K: ResourceKind>(name: String, block: Block) -> Self {
        Self {
            resource_type: K::TYPE,
            name,
            data: K::DATA,
            block,
        }
    }

    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_data(&self) -> bool {
        self.data
    }

    pub fn address(&self) -> String {
        if self.data {
            format!("data.{}.{}", self.resource_type, self.name)
        } else {
            format!("{}.{}", self.resource_type, self.name)
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.block.attributes.get(key)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.block.attributes
    }

    pub fn depends_on(&self) -> &[Handle] {
        &self.block.depends_on
    }

    /// Whether this block waits on `handle`
    pub fn waits_for(&self, handle: &Handle) -> bool {
        self.block.depends_on.contains(handle)
    }

    pub fn lifecycle(&self) -> Option<&Lifecycle> {
        self.block.lifecycle.as_ref()
    }

    pub fn provisioners(&self) -> &[LocalExec] {
        &self.block.provisioners
    }

    /// Every reference in attributes and provisioners
    pub fn references(&self) -> Vec<&Reference> {
        let mut found = Vec::new();
        for value in self.block.attributes.values() {
            found.extend(value.references());
        }
        for exec in &self.block.provisioners {
            found.extend(exec.command.references());
            for value in exec.environment.values() {
                found.extend(value.references());
            }
        }
        found
    }

    /// Body as a value tree, meta-arguments included
    pub(crate) fn body(&self) -> Value {
        let mut body = self.block.attributes.clone();

        if !self.block.depends_on.is_empty() {
            body.insert(
                "depends_on".to_string(),
                Value::list(
                    self.block
                        .depends_on
                        .iter()
                        .map(|handle| handle.address().to_string()),
                ),
            );
        }

        if let Some(lifecycle) = &self.block.lifecycle {
            let mut rendered = BTreeMap::new();
            if !lifecycle.ignore_changes.is_empty() {
                rendered.insert(
                    "ignore_changes".to_string(),
                    Value::list(lifecycle.ignore_changes.clone()),
                );
            }
            if lifecycle.create_before_destroy {
                rendered.insert("create_before_destroy".to_string(), Value::Bool(true));
            }
            body.insert("lifecycle".to_string(), Value::Map(rendered));
        }

        if !self.block.provisioners.is_empty() {
            body.insert(
                "provisioner".to_string(),
                Value::list(self.block.provisioners.iter().map(LocalExec::to_value)),
            );
        }

        Value::Map(body)
    }
}
