// Copyright (c) 2025 - Cowboy AI, Inc.
//! Container image build and publish
//!
//! The image is built and pushed by the provisioning engine through a local
//! command; this module only declares the registry, the short-lived registry
//! credential and the build step. Consumers wait on the build step's handle.
//! The tag is a static label, so change detection rides on the build step's
//! `asset_hash` trigger rather than on the tag.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::invariants::validate_non_empty;
use crate::domain::Tags;
use crate::errors::{SynthError, SynthResult};
use crate::graph::kinds::{EcrAuthorizationToken, EcrRepository, NullResource};
use crate::graph::{AssetFingerprint, Block, Expr, Handle, LocalExec, ResourceRef, Stack, Value};

use super::{null_provider, staged};

/// Build tool and tag label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagePublisherConfig {
    /// Tag label appended to the repository URL
    pub label: String,
    /// CLI used to log in, build and push
    pub build_tool: String,
}

impl Default for ImagePublisherConfig {
    fn default() -> Self {
        Self {
            label: "latest".to_string(),
            build_tool: "docker".to_string(),
        }
    }
}

/// Published image reference
#[derive(Debug, Clone, PartialEq)]
pub struct ImageArtifact {
    name: String,
    tag: Expr,
    repository: ResourceRef<EcrRepository>,
    authorization: ResourceRef<EcrAuthorizationToken>,
    build: ResourceRef<NullResource>,
    asset: AssetFingerprint,
}

impl ImageArtifact {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `<repository-url>:<label>`; valid only once the build step completed
    pub fn tag(&self) -> &Expr {
        &self.tag
    }

    pub fn repository(&self) -> &ResourceRef<EcrRepository> {
        &self.repository
    }

    pub fn authorization(&self) -> &ResourceRef<EcrAuthorizationToken> {
        &self.authorization
    }

    pub fn build(&self) -> &ResourceRef<NullResource> {
        &self.build
    }

    /// Completion token of the build-and-push step
    pub fn build_handle(&self) -> Handle {
        self.build.handle()
    }

    pub fn asset(&self) -> &AssetFingerprint {
        &self.asset
    }
}

/// Declares registry, credential and build step for a project directory
#[derive(Debug, Clone, Default)]
pub struct ImagePublisher {
    config: ImagePublisherConfig,
}

impl ImagePublisher {
    pub fn new(config: ImagePublisherConfig) -> Self {
        Self { config }
    }

    /// Declare the publish pipeline for the image built from `project_path`
    ///
    /// Fails with [`SynthError::Asset`] before declaring anything when the
    /// path is missing or not a directory.
    pub fn publish(
        &self,
        stack: &mut Stack,
        name: &str,
        project_path: &Path,
        tags: &Tags,
    ) -> SynthResult<ImageArtifact> {
        validate_non_empty(name, "image name")?;
        validate_non_empty(&self.config.label, "image label")?;
        validate_non_empty(&self.config.build_tool, "build tool")?;

        let asset = AssetFingerprint::of_directory(project_path)?;
        let working_dir = project_path
            .canonicalize()
            .map_err(|e| SynthError::io(project_path, e))?;

        staged(stack, |stack| {
            let repository = stack.declare::<EcrRepository>(
                format!("{}-ecr", name),
                Block::new().attr("name", name).tags(tags),
            )?;

            let authorization = stack.declare::<EcrAuthorizationToken>(
                format!("{}-auth", name),
                Block::new()
                    .attr("registry_id", repository.attr("registry_id"))
                    .depends_on(repository.handle()),
            )?;

            let tag = repository
                .attr("repository_url")
                .append(format!(":{}", self.config.label));

            let tool = &self.config.build_tool;
            let command = format!(
                "echo \"$REGISTRY_PASSWORD\" | {tool} login --username \"$REGISTRY_USERNAME\" --password-stdin \"$REGISTRY_ENDPOINT\" && {tool} build -t \"$IMAGE_TAG\" . && {tool} push \"$IMAGE_TAG\""
            );

            let build = stack.declare::<NullResource>(
                format!("{}-image", name),
                Block::new()
                    .attr("triggers", Value::map([("asset_hash", asset.hash.as_str())]))
                    .depends_on(repository.handle())
                    .depends_on(authorization.handle())
                    .provisioner(
                        LocalExec::new(command)
                            .working_dir(working_dir.to_string_lossy())
                            .env("REGISTRY_USERNAME", authorization.attr("user_name"))
                            .env("REGISTRY_PASSWORD", authorization.attr("password"))
                            .env("REGISTRY_ENDPOINT", authorization.attr("proxy_endpoint"))
                            .env("IMAGE_TAG", &tag),
                    ),
            )?;

            stack.add_asset(name, asset.clone());
            stack.add_provider(null_provider());

            info!(
                stack = %stack.id(),
                image = %name,
                asset_hash = %asset.hash,
                files = asset.files,
                "Declared image publish"
            );

            Ok(ImageArtifact {
                name: name.to_string(),
                tag,
                repository,
                authorization,
                build,
                asset,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StackId;
    use crate::graph::Part;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        dir
    }

    #[test]
    fn test_publish_declares_gated_build_step() {
        let dir = project();
        let mut stack = Stack::new(StackId::new("ecs").unwrap());
        let artifact = ImagePublisher::default()
            .publish(&mut stack, "svc", dir.path(), &Tags::new())
            .unwrap();

        let build = stack.resource(&artifact.build().address()).unwrap();
        assert!(build.waits_for(&artifact.repository().handle()));
        assert!(build.waits_for(&artifact.authorization().handle()));
        assert_eq!(
            build.attribute("triggers").and_then(|t| t.get("asset_hash")),
            Some(&Value::from(artifact.asset().hash.as_str()))
        );
        assert_eq!(stack.assets().len(), 1);
        assert!(stack.providers().any(|p| p.name == "null"));
    }

    #[test]
    fn test_password_never_on_command_line() {
        let dir = project();
        let mut stack = Stack::new(StackId::new("ecs").unwrap());
        let artifact = ImagePublisher::default()
            .publish(&mut stack, "svc", dir.path(), &Tags::new())
            .unwrap();

        let build = stack.resource(&artifact.build().address()).unwrap();
        let exec = &build.provisioners()[0];
        assert!(exec
            .command
            .parts()
            .iter()
            .all(|part| matches!(part, Part::Literal(_))));
        assert!(exec.command.to_string().contains("--password-stdin"));
        assert!(exec.environment.contains_key("REGISTRY_PASSWORD"));
    }

    #[test]
    fn test_tag_uses_label() {
        let dir = project();
        let mut stack = Stack::new(StackId::new("ecs").unwrap());
        let publisher = ImagePublisher::new(ImagePublisherConfig {
            label: "v1".to_string(),
            ..ImagePublisherConfig::default()
        });
        let artifact = publisher
            .publish(&mut stack, "svc", dir.path(), &Tags::new())
            .unwrap();
        assert_eq!(
            artifact.tag().to_string(),
            "${aws_ecr_repository.svc-ecr.repository_url}:v1"
        );
    }

    #[test]
    fn test_missing_project_declares_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut stack = Stack::new(StackId::new("ecs").unwrap());
        let err = ImagePublisher::default()
            .publish(&mut stack, "svc", &dir.path().join("absent"), &Tags::new())
            .unwrap_err();
        assert!(matches!(err, SynthError::Asset { .. }));
        assert!(stack.resources().is_empty());
    }
}
