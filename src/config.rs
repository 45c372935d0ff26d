// Copyright (c) 2025 - Cowboy AI, Inc.
//! Project configuration
//!
//! Every constant of a deployment (CIDR plan, zones, state bucket, listener
//! priorities, image label) is a field here with a default matching the
//! reference deployment. Credentials are resolved separately from the
//! environment and never written into synthesized output.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::StateBackendConfig;
use crate::constructs::cluster::{InstanceConfig, ScalingBounds, WorkloadConfig};
use crate::constructs::exposure::ListenerConfig;
use crate::constructs::image::ImagePublisherConfig;
use crate::constructs::network::NetworkSpec;
use crate::domain::invariants::validate_non_empty;
use crate::domain::{validate_zones, StackId, Tags};
use crate::errors::{SynthError, SynthResult};
use crate::graph::Value;
use crate::probe::PollPolicy;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "CIM_SYNTH_CONFIG";
/// Environment variable naming the output directory
pub const OUT_DIR_ENV: &str = "CIM_SYNTH_OUT";
/// Output directory when none is configured
pub const DEFAULT_OUT_DIR: &str = "cdktf.out";

/// How the provisioning engine authenticates against the cloud provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Named profile from the local credentials file
    Profile(String),
    /// Keys taken by the engine from its own environment
    Environment,
}

/// Credentials and region passed uniformly to every stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    source: CredentialSource,
    region: String,
}

impl AwsCredentials {
    pub fn new(source: CredentialSource, region: impl Into<String>) -> Self {
        Self {
            source,
            region: region.into(),
        }
    }

    /// Resolve credentials from the process environment
    pub fn from_env(config: &ProjectConfig) -> SynthResult<Self> {
        Self::from_vars(config, |key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup`
    ///
    /// `AWS_PROFILE` wins over static keys; static keys must come as a pair;
    /// with neither present the configured profile is used, and failing that
    /// the engine's default credential chain.
    pub fn from_vars(
        config: &ProjectConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> SynthResult<Self> {
        let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let region = present("AWS_DEFAULT_REGION").unwrap_or_else(|| config.region.clone());

        let source = if let Some(profile) = present("AWS_PROFILE") {
            CredentialSource::Profile(profile)
        } else {
            match (
                present("AWS_ACCESS_KEY_ID"),
                present("AWS_SECRET_ACCESS_KEY"),
            ) {
                (Some(_), Some(_)) => CredentialSource::Environment,
                (Some(_), None) => {
                    return Err(SynthError::Configuration(
                        "AWS_ACCESS_KEY_ID is set but AWS_SECRET_ACCESS_KEY is not".to_string(),
                    ))
                }
                (None, Some(_)) => {
                    return Err(SynthError::Configuration(
                        "AWS_SECRET_ACCESS_KEY is set but AWS_ACCESS_KEY_ID is not".to_string(),
                    ))
                }
                (None, None) => match &config.profile {
                    Some(profile) => CredentialSource::Profile(profile.clone()),
                    None => CredentialSource::Environment,
                },
            }
        };

        debug!(region = %region, source = ?source, "Resolved credentials");
        Ok(Self { source, region })
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn profile(&self) -> Option<&str> {
        match &self.source {
            CredentialSource::Profile(profile) => Some(profile),
            CredentialSource::Environment => None,
        }
    }

    /// Body of the provider block
    pub fn provider_config(&self) -> BTreeMap<String, Value> {
        let mut config = BTreeMap::new();
        config.insert("region".to_string(), Value::from(&self.region));
        if let Some(profile) = self.profile() {
            config.insert("profile".to_string(), Value::from(profile));
        }
        config
    }
}

/// Properties every stack receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonStackProps {
    pub id: StackId,
    pub credentials: AwsCredentials,
    pub tags: Tags,
}

impl CommonStackProps {
    pub fn new(id: StackId, credentials: AwsCredentials, tags: Tags) -> Self {
        Self {
            id,
            credentials,
            tags,
        }
    }
}

/// Network stack settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(flatten)]
    pub spec: NetworkSpec,
    pub tags: Tags,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            spec: NetworkSpec::default(),
            tags: tags([
                ("name", "url-shortener-vpc"),
                ("costCenter", "cost-tag-example-vpc"),
                ("project", "url-shortener"),
                ("service", "url-shortener-vpc"),
                ("owner", "profile-name"),
            ]),
        }
    }
}

/// Application stack settings: cluster, image, workload and routing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApplicationConfig {
    pub tags: Tags,
    /// Directory holding the container build context
    pub project_path: PathBuf,
    /// Environment of the workload container
    pub env: BTreeMap<String, String>,
    pub instance: InstanceConfig,
    pub scaling: ScalingBounds,
    pub workload: WorkloadConfig,
    pub image: ImagePublisherConfig,
    pub listener: ListenerConfig,
    /// Route prefix of the exposed service
    pub path_prefix: String,
    /// Explicit listener priority; next free one when unset
    pub priority: Option<u32>,
    pub desired_count: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            tags: tags([
                ("Name", "url-shortener-ecs"),
                ("costCenter", "url-shortener-ecs-cost-center-tag"),
                ("project", "url-shortener"),
                ("service", "url-shortener-service"),
                ("owner", "profile-name"),
            ]),
            project_path: PathBuf::from("app"),
            env: [
                ("ENV_TEST", "test-value"),
                ("ROLE", "iam-role-for-application-to-use"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
            instance: InstanceConfig::default(),
            scaling: ScalingBounds::default(),
            workload: WorkloadConfig::default(),
            image: ImagePublisherConfig::default(),
            listener: ListenerConfig::default(),
            path_prefix: "/".to_string(),
            priority: None,
            desired_count: 1,
        }
    }
}

/// Managed Kubernetes control plane settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControlPlaneConfig {
    pub tags: Tags,
    pub cluster_name: String,
    pub kubernetes_version: String,
    /// Readiness wait after the control plane is created
    pub readiness: PollPolicy,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            tags: tags([
                ("name", "url-shortener-eks"),
                ("costCenter", "cost-tag-example-eks"),
                ("project", "url-shortener"),
                ("service", "url-shortener-eks"),
                ("owner", "profile-name"),
            ]),
            cluster_name: "url-shortener-eks-cluster".to_string(),
            kubernetes_version: "1.28".to_string(),
            readiness: PollPolicy::default(),
        }
    }
}

/// Whole-deployment configuration
///
/// Unknown keys are rejected, so a misspelled field never silently falls
/// back to its default.
///
/// # Example
///
/// ```rust
/// use cim_infrastructure_aws::config::ProjectConfig;
///
/// let config: ProjectConfig = serde_json::from_str(r#"{ "project": "demo" }"#).unwrap();
/// assert_eq!(config.region, "eu-west-1");
/// assert_eq!(config.stack_id("vpc").unwrap().as_str(), "demo-vpc");
/// assert_eq!(config.availability_zones_in("us-east-1")[0], "us-east-1a");
///
/// assert!(serde_json::from_str::<ProjectConfig>(r#"{ "regoin": "us-east-1" }"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Prefix of every stack id
    pub project: String,
    pub region: String,
    /// Profile used when the environment supplies no credentials
    pub profile: Option<String>,
    /// Ordered zones subnets are spread across; zones `a`, `b` and `c` of
    /// the effective region when unset
    pub availability_zones: Option<Vec<String>>,
    pub state_backend: StateBackendConfig,
    pub network: NetworkConfig,
    pub application: ApplicationConfig,
    /// Control plane stack, omitted when unset
    pub control_plane: Option<ControlPlaneConfig>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project: "url-shortener".to_string(),
            region: "eu-west-1".to_string(),
            availability_zones: None,
            profile: None,
            state_backend: StateBackendConfig::default(),
            network: NetworkConfig::default(),
            application: ApplicationConfig::default(),
            control_plane: None,
        }
    }
}

impl ProjectConfig {
    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> SynthResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| SynthError::io(path, e))?;
        let mut config: Self = serde_json::from_str(&raw)?;

        // Relative build contexts are relative to the config file
        if config.application.project_path.is_relative() {
            if let Some(dir) = path.parent() {
                config.application.project_path = dir.join(&config.application.project_path);
            }
        }

        config.validate()?;
        info!(path = %path.display(), project = %config.project, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> SynthResult<()> {
        validate_non_empty(&self.region, "region")?;
        for suffix in ["terraform-state-backend", "vpc", "ecs", "eks"] {
            self.stack_id(suffix)?;
        }
        // Region membership is checked once the effective region is known
        if let Some(zones) = &self.availability_zones {
            validate_zones(zones, None)?;
        }
        Ok(())
    }

    /// Zones for `region`, the region the provider actually targets
    pub fn availability_zones_in(&self, region: &str) -> Vec<String> {
        match &self.availability_zones {
            Some(zones) => zones.clone(),
            None => zones_for(region),
        }
    }

    /// `<project>-<suffix>` as a stack id
    pub fn stack_id(&self, suffix: &str) -> SynthResult<StackId> {
        Ok(StackId::new(format!("{}-{}", self.project, suffix))?)
    }
}

/// Zones `a`, `b` and `c` of `region`
pub fn zones_for(region: &str) -> Vec<String> {
    ["a", "b", "c"]
        .iter()
        .map(|suffix| format!("{}{}", region, suffix))
        .collect()
}

fn tags<const N: usize>(pairs: [(&str, &str); N]) -> Tags {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
