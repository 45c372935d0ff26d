//! AWS infrastructure composition for the Composable Information Machine
//!
//! Declares a network, a container cluster, an image publish pipeline and
//! load-balanced services as a graph of stacks, and synthesizes the graph
//! into documents a provisioning engine applies.

pub mod backend;
pub mod composer;
pub mod config;
pub mod constructs;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod probe;

// Re-export commonly used types
pub use composer::TopLevelComposer;
pub use config::{AwsCredentials, CredentialSource, ProjectConfig};
pub use errors::{SynthError, SynthResult};
pub use graph::{App, GraphError, Manifest, Stack};
pub use probe::{wait_until_ready, EndpointProbe, PollPolicy, ProbeError};
