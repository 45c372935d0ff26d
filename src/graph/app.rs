// Copyright (c) 2025 - Cowboy AI, Inc.
//! Application: the set of stacks and their ordering
//!
//! Synthesis turns every stack into one engine document. A reference to a
//! resource in another stack is rewritten into a remote-state lookup: the
//! origin stack exports the attribute as an output, and the reading stack
//! declares a `terraform_remote_state` data source for the origin. Each such
//! reference also orders the reading stack after the origin.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use tracing::{debug, info};

use crate::domain::StackId;
use crate::errors::{SynthError, SynthResult};

use super::asset::AssetFingerprint;
use super::expr::Reference;
use super::stack::{Output, Stack};
use super::value::Value;
use super::GraphError;

/// File name of each synthesized stack document
pub const STACK_DOCUMENT: &str = "cdk.tf.json";

/// File name of the synthesis manifest
pub const MANIFEST_FILE: &str = "manifest.json";

const REMOTE_STATE_TYPE: &str = "terraform_remote_state";

/// Output name under which an origin stack exports a referenced attribute
pub fn export_name(reference: &Reference) -> String {
    let sanitized: String = reference
        .traversal()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("cross-stack-output-{}", sanitized)
}

/// Label of the remote-state data source reading `origin`
pub fn remote_state_name(origin: &StackId) -> String {
    format!("cross-stack-reference-input-{}", origin)
}

/// Per-stack entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackManifest {
    /// Document path relative to the output directory
    pub path: String,
    /// Stacks that must be applied first
    pub dependencies: Vec<StackId>,
    /// Build inputs consumed by the stack
    pub assets: BTreeMap<String, AssetFingerprint>,
}

/// Summary of one synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub synthesized_at: DateTime<Utc>,
    /// Stacks in an order where every stack follows its dependencies
    pub order: Vec<StackId>,
    pub stacks: BTreeMap<StackId, StackManifest>,
}

/// Rendered documents plus their manifest
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub documents: BTreeMap<StackId, serde_json::Value>,
    pub manifest: Manifest,
}

impl Synthesis {
    pub fn document(&self, stack: &StackId) -> Option<&serde_json::Value> {
        self.documents.get(stack)
    }
}

/// Set of stacks with explicit ordering edges
#[derive(Debug, Clone, Default)]
pub struct App {
    stacks: Vec<Stack>,
    /// (dependent, dependency)
    edges: BTreeSet<(StackId, StackId)>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stack(&mut self, stack: Stack) -> Result<(), GraphError> {
        if self.stack(stack.id()).is_some() {
            return Err(GraphError::DuplicateStack(stack.id().clone()));
        }
        debug!(stack = %stack.id(), resources = stack.resources().len(), "Added stack");
        self.stacks.push(stack);
        Ok(())
    }

    pub fn stack(&self, id: &StackId) -> Option<&Stack> {
        self.stacks.iter().find(|s| s.id() == id)
    }

    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Apply `dependent` only after `dependency`
    pub fn add_dependency(
        &mut self,
        dependent: &StackId,
        dependency: &StackId,
    ) -> Result<(), GraphError> {
        if dependent == dependency {
            return Err(GraphError::SelfDependency(dependent.clone()));
        }
        for id in [dependent, dependency] {
            if self.stack(id).is_none() {
                return Err(GraphError::UnknownStack(id.clone()));
            }
        }
        self.edges.insert((dependent.clone(), dependency.clone()));
        Ok(())
    }

    /// Explicit dependencies of `id` plus those implied by its references
    pub fn dependencies(&self, id: &StackId) -> Result<BTreeSet<StackId>, GraphError> {
        let stack = self
            .stack(id)
            .ok_or_else(|| GraphError::UnknownStack(id.clone()))?;

        let mut deps: BTreeSet<StackId> = self
            .edges
            .iter()
            .filter(|(dependent, _)| dependent == id)
            .map(|(_, dependency)| dependency.clone())
            .collect();

        for reference in foreign_references(stack) {
            let origin = self
                .stack(reference.origin())
                .ok_or_else(|| GraphError::UnknownStack(reference.origin().clone()))?;
            if !origin.contains(reference.address()) {
                return Err(GraphError::UnknownResource {
                    stack: origin.id().clone(),
                    address: reference.address().to_string(),
                });
            }
            deps.insert(reference.origin().clone());
        }

        Ok(deps)
    }

    /// Stacks ordered so that every stack follows all of its dependencies
    pub fn stack_order(&self) -> Result<Vec<StackId>, GraphError> {
        let mut graph: DiGraph<StackId, ()> = DiGraph::new();
        let indices: BTreeMap<StackId, NodeIndex> = self
            .stacks
            .iter()
            .map(|stack| (stack.id().clone(), graph.add_node(stack.id().clone())))
            .collect();

        for stack in &self.stacks {
            let to = indices[stack.id()];
            for dependency in self.dependencies(stack.id())? {
                if let Some(&from) = indices.get(&dependency) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|idx| graph[idx].clone()).collect()),
            Err(_) => {
                let mut cycle: Vec<StackId> = tarjan_scc(&graph)
                    .into_iter()
                    .find(|scc| scc.len() > 1)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|idx| graph[idx].clone())
                    .collect();
                cycle.sort();
                Err(GraphError::DependencyCycle(cycle))
            }
        }
    }

    /// Render every stack document and the manifest
    pub fn synthesize(&self) -> SynthResult<Synthesis> {
        let order = self.stack_order()?;

        // Attributes each origin stack must export, keyed by output name
        let mut exports: BTreeMap<StackId, BTreeMap<String, Reference>> = BTreeMap::new();
        for stack in &self.stacks {
            for reference in foreign_references(stack) {
                let origin = reference.origin();
                let name = export_name(reference);
                let taken = self
                    .stack(origin)
                    .is_some_and(|origin| origin.outputs().contains_key(&name));
                let origin_exports = exports.entry(origin.clone()).or_default();
                match origin_exports.get(&name) {
                    Some(existing) if existing != reference => {
                        return Err(GraphError::ExportCollision {
                            stack: origin.clone(),
                            name,
                        }
                        .into())
                    }
                    Some(_) => {}
                    None if taken => {
                        return Err(GraphError::ExportCollision {
                            stack: origin.clone(),
                            name,
                        }
                        .into())
                    }
                    None => {
                        origin_exports.insert(name, reference.clone());
                    }
                }
            }
        }

        let mut documents = BTreeMap::new();
        let mut entries = BTreeMap::new();

        for id in &order {
            let Some(stack) = self.stack(id) else {
                return Err(GraphError::UnknownStack(id.clone()).into());
            };
            let stack_exports = exports.get(id).cloned().unwrap_or_default();
            documents.insert(id.clone(), self.render_stack(stack, &stack_exports)?);

            entries.insert(
                id.clone(),
                StackManifest {
                    path: format!("stacks/{}/{}", id, STACK_DOCUMENT),
                    dependencies: self.dependencies(id)?.into_iter().collect(),
                    assets: stack.assets().clone(),
                },
            );
        }

        info!(stacks = order.len(), "Synthesized application");

        Ok(Synthesis {
            documents,
            manifest: Manifest {
                version: env!("CARGO_PKG_VERSION").to_string(),
                synthesized_at: Utc::now(),
                order,
                stacks: entries,
            },
        })
    }

    /// Synthesize and write `stacks/<id>/cdk.tf.json` plus `manifest.json`
    pub fn synth(&self, out_dir: impl AsRef<Path>) -> SynthResult<Manifest> {
        let out_dir = out_dir.as_ref();
        let synthesis = self.synthesize()?;

        for (id, document) in &synthesis.documents {
            let dir = out_dir.join("stacks").join(id.as_str());
            fs::create_dir_all(&dir).map_err(|e| SynthError::io(&dir, e))?;
            let path = dir.join(STACK_DOCUMENT);
            fs::write(&path, serde_json::to_string_pretty(document)?)
                .map_err(|e| SynthError::io(&path, e))?;
            debug!(stack = %id, path = %path.display(), "Wrote stack document");
        }

        let path = out_dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(&synthesis.manifest)?)
            .map_err(|e| SynthError::io(&path, e))?;

        info!(
            out_dir = %out_dir.display(),
            stacks = synthesis.documents.len(),
            "Wrote synthesis output"
        );

        Ok(synthesis.manifest)
    }

    fn render_stack(
        &self,
        stack: &Stack,
        exports: &BTreeMap<String, Reference>,
    ) -> SynthResult<serde_json::Value> {
        let resolve: &mut dyn FnMut(&Reference) -> Result<String, SynthError> =
            &mut |reference: &Reference| resolve_in(stack, reference);

        let backend = stack.backend();
        let mut document = Map::new();
        document.insert(
            "//".to_string(),
            json!({
                "metadata": {
                    "stackName": stack.id(),
                    "backend": backend.kind(),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        );

        let mut required = Map::new();
        let mut providers = Map::new();
        for provider in stack.providers() {
            required.insert(
                provider.name.clone(),
                json!({ "source": provider.source, "version": provider.version }),
            );
            let config = Value::Map(provider.config.clone()).render(&mut *resolve)?;
            providers.insert(provider.name.clone(), json!([config]));
        }

        let mut backend_block = Map::new();
        backend_block.insert(backend.kind().to_string(), backend.config());
        let mut terraform = Map::new();
        terraform.insert(
            "backend".to_string(),
            serde_json::Value::Object(backend_block),
        );
        if !required.is_empty() {
            terraform.insert(
                "required_providers".to_string(),
                serde_json::Value::Object(required),
            );
        }
        document.insert("terraform".to_string(), serde_json::Value::Object(terraform));
        if !providers.is_empty() {
            document.insert("provider".to_string(), serde_json::Value::Object(providers));
        }

        let mut resources: BTreeMap<&str, Map<String, serde_json::Value>> = BTreeMap::new();
        let mut data: BTreeMap<&str, Map<String, serde_json::Value>> = BTreeMap::new();
        for resource in stack.resources() {
            let body = resource.body().render(&mut *resolve)?;
            let section = if resource.is_data() {
                &mut data
            } else {
                &mut resources
            };
            section
                .entry(resource.resource_type())
                .or_default()
                .insert(resource.name().to_string(), body);
        }

        let origins: BTreeSet<&StackId> = foreign_references(stack)
            .into_iter()
            .map(Reference::origin)
            .collect();
        for origin in origins {
            let origin_backend = self
                .stack(origin)
                .ok_or_else(|| GraphError::UnknownStack(origin.clone()))?
                .backend();
            data.entry(REMOTE_STATE_TYPE).or_default().insert(
                remote_state_name(origin),
                json!({
                    "backend": origin_backend.kind(),
                    "config": origin_backend.remote_state_config(origin),
                }),
            );
        }

        if !resources.is_empty() {
            document.insert("resource".to_string(), json!(resources));
        }
        if !data.is_empty() {
            document.insert("data".to_string(), json!(data));
        }

        let mut outputs = Map::new();
        for (name, output) in stack.outputs() {
            outputs.insert(name.clone(), render_output(output, &mut *resolve)?);
        }
        for (name, reference) in exports {
            outputs.insert(name.clone(), json!({ "value": format!("${{{}}}", reference.traversal()) }));
        }
        if !outputs.is_empty() {
            document.insert("output".to_string(), serde_json::Value::Object(outputs));
        }

        debug!(stack = %stack.id(), exports = exports.len(), "Rendered stack");
        Ok(serde_json::Value::Object(document))
    }
}

/// Interpolation body for `reference` as seen from `stack`
fn resolve_in(stack: &Stack, reference: &Reference) -> Result<String, SynthError> {
    if reference.origin() != stack.id() {
        return Ok(format!(
            "data.{}.{}.outputs.{}",
            REMOTE_STATE_TYPE,
            remote_state_name(reference.origin()),
            export_name(reference)
        ));
    }
    if !stack.contains(reference.address()) {
        return Err(GraphError::UnknownResource {
            stack: stack.id().clone(),
            address: reference.address().to_string(),
        }
        .into());
    }
    Ok(reference.traversal())
}

fn render_output(
    output: &Output,
    resolve: &mut dyn FnMut(&Reference) -> Result<String, SynthError>,
) -> SynthResult<serde_json::Value> {
    let mut body = Map::new();
    body.insert("value".to_string(), output.value.render(resolve)?);
    if let Some(description) = &output.description {
        body.insert("description".to_string(), json!(description));
    }
    if output.sensitive {
        body.insert("sensitive".to_string(), json!(true));
    }
    Ok(serde_json::Value::Object(body))
}

/// References in `stack` to resources declared by other stacks
fn foreign_references(stack: &Stack) -> Vec<&Reference> {
    let mut found: Vec<&Reference> = stack
        .resources()
        .iter()
        .flat_map(|resource| resource.references())
        .collect();
    for output in stack.outputs().values() {
        found.extend(output.value.references());
    }
    for provider in stack.providers() {
        for value in provider.config.values() {
            found.extend(value.references());
        }
    }
    found.retain(|reference| reference.origin() != stack.id());
    found
}
