// Copyright (c) 2025 - Cowboy AI, Inc.
//! Synthesizer
//!
//! Composes the deployment described by the project configuration and writes
//! one engine document per stack plus a manifest.
//!
//! Run with: cargo run --bin cim-synth
//!
//! Environment:
//! 1. `CIM_SYNTH_CONFIG` - JSON configuration file (defaults apply when unset)
//! 2. `CIM_SYNTH_OUT` - output directory (default: `cdktf.out`)
//! 3. `AWS_PROFILE` or `AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`, and
//!    `AWS_DEFAULT_REGION` - credentials handed to the engine
//! 4. `CIM_SYNTH_WAIT_ENDPOINT` - with the `probe` feature, wait for this
//!    endpoint to become ready after synthesis

use std::path::PathBuf;

use anyhow::{Context, Result};
use cim_infrastructure_aws::config::{CONFIG_ENV, DEFAULT_OUT_DIR, OUT_DIR_ENV};
use cim_infrastructure_aws::{AwsCredentials, ProjectConfig, TopLevelComposer};
use tracing::info;

/// Configuration for the synthesizer
#[derive(Debug, Clone)]
struct SynthConfig {
    /// Configuration file, if any
    config_path: Option<PathBuf>,
    /// Directory receiving the documents
    out_dir: PathBuf,
}

impl SynthConfig {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let config_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let out_dir = std::env::var(OUT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUT_DIR));
        Self {
            config_path,
            out_dir,
        }
    }

    fn project(&self) -> Result<ProjectConfig> {
        match &self.config_path {
            Some(path) => ProjectConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display())),
            None => {
                let config = ProjectConfig::default();
                config.validate().context("Invalid default configuration")?;
                Ok(config)
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting synthesis");

    let settings = SynthConfig::from_env();
    let project = settings.project()?;
    info!("Configuration loaded:");
    info!("  - Project: {}", project.project);
    info!("  - Region: {}", project.region);
    info!("  - Output: {}", settings.out_dir.display());

    let credentials =
        AwsCredentials::from_env(&project).context("Failed to resolve AWS credentials")?;

    let composer = TopLevelComposer::new(project, credentials);
    let app = composer.compose().context("Failed to compose stacks")?;
    let manifest = app
        .synth(&settings.out_dir)
        .with_context(|| format!("Failed to write {}", settings.out_dir.display()))?;

    for (position, id) in manifest.order.iter().enumerate() {
        info!("  {}. {}", position + 1, id);
    }
    info!("Synthesized {} stacks", manifest.order.len());

    #[cfg(feature = "probe")]
    wait_for_endpoint(composer.config()).await?;

    Ok(())
}

#[cfg(feature = "probe")]
async fn wait_for_endpoint(project: &ProjectConfig) -> Result<()> {
    use cim_infrastructure_aws::probe::{wait_until_ready, HttpProbe};
    use std::time::Duration;

    let Ok(endpoint) = std::env::var("CIM_SYNTH_WAIT_ENDPOINT") else {
        return Ok(());
    };

    let policy = project
        .control_plane
        .as_ref()
        .map(|plane| plane.readiness.clone())
        .unwrap_or_default();

    let probe = HttpProbe::new(Duration::from_secs(10)).context("Failed to create probe")?;
    let attempt = wait_until_ready(&probe, &endpoint, &policy)
        .await
        .with_context(|| format!("Endpoint {} never became ready", endpoint))?;
    info!("Endpoint {} ready after {} attempts", endpoint, attempt);
    Ok(())
}
