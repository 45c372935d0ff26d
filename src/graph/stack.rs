// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stacks
//!
//! A [`Stack`] is one independently planned and applied unit: providers, an
//! optional state backend, declared blocks, outputs and the build inputs its
//! steps consume. Resources can only enter a stack through [`Stack::declare`],
//! which is also the only way to obtain a [`ResourceRef`] or [`Handle`].

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::backend::Backend;
use crate::domain::{is_engine_identifier, StackId};

use super::asset::AssetFingerprint;
use super::kinds::ResourceKind;
use super::resource::{block_address, Block, Handle, Resource, ResourceRef};
use super::value::Value;
use super::GraphError;

/// Provider plugin required by a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    /// Local name, e.g. `aws`
    pub name: String,
    /// Registry source, e.g. `hashicorp/aws`
    pub source: String,
    /// Version constraint
    pub version: String,
    /// Provider block body
    pub config: BTreeMap<String, Value>,
}

impl Provider {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            version: version.into(),
            config: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.config.insert(key.to_string(), value.into());
        self
    }
}

/// Named value exported by a stack
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Value,
    pub description: Option<String>,
    pub sensitive: bool,
}

/// One independently applied unit of infrastructure
#[derive(Debug, Clone)]
pub struct Stack {
    id: StackId,
    backend: Option<Backend>,
    providers: BTreeMap<String, Provider>,
    resources: Vec<Resource>,
    addresses: HashSet<String>,
    outputs: BTreeMap<String, Output>,
    assets: BTreeMap<String, AssetFingerprint>,
}

impl Stack {
    pub fn new(id: StackId) -> Self {
        Self {
            id,
            backend: None,
            providers: BTreeMap::new(),
            resources: Vec::new(),
            addresses: HashSet::new(),
            outputs: BTreeMap::new(),
            assets: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &StackId {
        &self.id
    }

    /// Where the engine keeps this stack's state
    ///
    /// Stacks without an explicit backend keep state in a local file named
    /// after the stack.
    pub fn backend(&self) -> Backend {
        self.backend
            .clone()
            .unwrap_or_else(|| Backend::local_for(&self.id))
    }

    pub fn set_backend(&mut self, backend: Backend) {
        self.backend = Some(backend);
    }

    /// Add a provider, replacing any provider of the same name
    pub fn add_provider(&mut self, provider: Provider) {
        self.providers.insert(provider.name.clone(), provider);
    }

    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Declare a block of kind `K` labelled `name`
    ///
    /// Fails on labels the engine cannot address, on a second block with the
    /// same address, and on `depends_on` handles declared by another stack.
    pub fn declare<K: ResourceKind>(
        &mut self,
        name: impl Into<String>,
        block: Block,
    ) -> Result<ResourceRef<K>, GraphError> {
        let name = name.into();
        if !is_engine_identifier(&name) {
            return Err(GraphError::InvalidName(name));
        }

        let address = block_address::<K>(&name);
        if self.addresses.contains(&address) {
            return Err(GraphError::DuplicateResource {
                stack: self.id.clone(),
                address,
            });
        }

        if let Some(foreign) = block
            .depends_on
            .iter()
            .find(|handle| handle.origin() != &self.id)
        {
            return Err(GraphError::ForeignHandle {
                stack: self.id.clone(),
                handle: foreign.to_string(),
            });
        }

        debug!(stack = %self.id, address = %address, "Declared block");
        self.addresses.insert(address);
        self.resources.push(Resource::new::<K>(name.clone(), block));
        Ok(ResourceRef::new(self.id.clone(), name))
    }

    /// Export a value under `name`
    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        description: Option<&str>,
    ) -> Result<(), GraphError> {
        let name = name.into();
        if !is_engine_identifier(&name) {
            return Err(GraphError::InvalidName(name));
        }
        if self.outputs.contains_key(&name) {
            return Err(GraphError::DuplicateOutput {
                stack: self.id.clone(),
                name,
            });
        }
        self.outputs.insert(
            name,
            Output {
                value: value.into(),
                description: description.map(str::to_string),
                sensitive: false,
            },
        );
        Ok(())
    }

    pub(crate) fn insert_output(&mut self, name: String, output: Output) {
        self.outputs.insert(name, output);
    }

    /// Record a build input consumed by one of this stack's steps
    pub fn add_asset(&mut self, name: impl Into<String>, asset: AssetFingerprint) {
        self.assets.insert(name.into(), asset);
    }

    pub fn assets(&self) -> &BTreeMap<String, AssetFingerprint> {
        &self.assets
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Look up a declared block by engine address
    pub fn resource(&self, address: &str) -> Option<&Resource> {
        if !self.addresses.contains(address) {
            return None;
        }
        self.resources.iter().find(|r| r.address() == address)
    }

    /// All blocks of one engine type, in declaration order
    pub fn resources_of<K: ResourceKind>(&self) -> impl Iterator<Item = &Resource> {
        self.resources
            .iter()
            .filter(|r| r.resource_type() == K::TYPE && r.is_data() == K::DATA)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    /// Whether `handle` was declared in this stack
    pub fn owns(&self, handle: &Handle) -> bool {
        handle.origin() == &self.id && self.addresses.contains(handle.address())
    }

    pub fn outputs(&self) -> &BTreeMap<String, Output> {
        &self.outputs
    }
}
