// Copyright (c) 2025 - Cowboy AI, Inc.
//! Readiness Probe
//!
//! The one bounded wait loop: poll an endpoint at a fixed interval for a fixed
//! number of attempts, stop on the first success, fail with a timeout when the
//! attempts run out. No other retry happens anywhere.
//!
//! The loop exists in two forms:
//!
//! - [`PollPolicy::shell_command`] renders it as a shell loop the provisioning
//!   engine runs after creating a control plane
//! - [`wait_until_ready`] runs it in-process over any [`EndpointProbe`]
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use cim_infrastructure_aws::probe::{wait_until_ready, EndpointProbe, PollPolicy, ProbeError};
//!
//! struct AlwaysReady;
//!
//! #[async_trait]
//! impl EndpointProbe for AlwaysReady {
//!     async fn check(&self, _endpoint: &str, _path: &str) -> Result<bool, ProbeError> {
//!         Ok(true)
//!     }
//! }
//!
//! # async fn run() -> Result<(), ProbeError> {
//! let attempts = wait_until_ready(&AlwaysReady, "https://cluster", &PollPolicy::default()).await?;
//! assert_eq!(attempts, 1);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors of the readiness loop
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Every attempt failed
    #[error("Endpoint {endpoint} not ready after {attempts} attempts")]
    Timeout { endpoint: String, attempts: u32 },

    /// Policy cannot run
    #[error("Invalid poll policy: {0}")]
    InvalidPolicy(String),

    /// A single probe could not be sent
    #[error("Probe request failed: {0}")]
    Request(String),
}

/// Attempt count, interval and path of the readiness loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval_secs: u64,
    /// Path appended to the endpoint
    pub path: String,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 60,
            interval_secs: 5,
            path: "/healthz".to_string(),
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.attempts == 0 {
            return Err(ProbeError::InvalidPolicy(
                "at least one attempt is required".to_string(),
            ));
        }
        if !self.path.starts_with('/') {
            return Err(ProbeError::InvalidPolicy(format!(
                "path {:?} must start with '/'",
                self.path
            )));
        }
        if let Some(c) = self.path.chars().find(|c| !is_path_char(*c)) {
            return Err(ProbeError::InvalidPolicy(format!(
                "path {:?} contains {:?}",
                self.path, c
            )));
        }
        Ok(())
    }

    /// POSIX shell loop polling `$ENDPOINT<path>`
    ///
    /// Exits 0 on the first successful fetch; prints `TIMEOUT` and exits 1
    /// once every attempt failed. The endpoint and path are quoted, so only
    /// a validated policy should be rendered.
    pub fn shell_command(&self) -> String {
        format!(
            "for i in `seq 1 {}`; do wget --no-check-certificate -O - -q \"$ENDPOINT\"'{}' >/dev/null && exit 0 || true; sleep {}; done; echo TIMEOUT && exit 1",
            self.attempts, self.path, self.interval_secs
        )
    }
}

/// Unreserved, percent and query characters of a URL path
fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "/-._~%?=&".contains(c)
}

/// One readiness check against an endpoint
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    /// `Ok(true)` when `endpoint` + `path` answers as ready
    async fn check(&self, endpoint: &str, path: &str) -> Result<bool, ProbeError>;
}

/// Poll `endpoint` until `probe` reports ready
///
/// Returns the attempt number that succeeded. A failed request counts as a
/// not-ready answer.
pub async fn wait_until_ready(
    probe: &dyn EndpointProbe,
    endpoint: &str,
    policy: &PollPolicy,
) -> Result<u32, ProbeError> {
    policy.validate()?;
    info!(endpoint, attempts = policy.attempts, "Waiting for endpoint");

    for attempt in 1..=policy.attempts {
        match probe.check(endpoint, &policy.path).await {
            Ok(true) => {
                info!(endpoint, attempt, "Endpoint ready");
                return Ok(attempt);
            }
            Ok(false) => debug!(endpoint, attempt, "Endpoint not ready"),
            Err(e) => debug!(endpoint, attempt, error = %e, "Probe failed"),
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval()).await;
        }
    }

    warn!(endpoint, attempts = policy.attempts, "TIMEOUT");
    Err(ProbeError::Timeout {
        endpoint: endpoint.to_string(),
        attempts: policy.attempts,
    })
}

/// HTTP GET probe; any 2xx answer is ready
///
/// Certificates are not verified, since control planes commonly serve a
/// private CA.
#[cfg(feature = "probe")]
pub struct HttpProbe {
    client: reqwest::Client,
}

#[cfg(feature = "probe")]
impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ProbeError::Request(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "probe")]
#[async_trait]
impl EndpointProbe for HttpProbe {
    async fn check(&self, endpoint: &str, path: &str) -> Result<bool, ProbeError> {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        Ok(response.status().is_success())
    }
}
