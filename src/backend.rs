// Copyright (c) 2025 - Cowboy AI, Inc.
//! State backend
//!
//! Every application stack keeps its state in one shared bucket, guarded by a
//! lock table. Each stack writes under its own key prefix so two stacks never
//! share a state file. The bucket and table themselves are provisioned by a
//! dedicated stack that keeps its own state locally.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::AwsCredentials;
use crate::domain::invariants::validate_non_empty;
use crate::domain::{StackId, Tags};
use crate::errors::SynthResult;
use crate::graph::kinds::{DynamodbTable, S3Bucket, S3BucketVersioning};
use crate::graph::{Block, ResourceRef, Stack, Value};

/// Shared remote-state settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateBackendConfig {
    /// Bucket holding every stack's state
    pub bucket: String,
    /// State file name; prefixed with the stack id per stack
    pub key: String,
    /// Lock table name
    pub lock_table: String,
    /// Server-side encryption of state objects
    pub encrypt: bool,
}

impl Default for StateBackendConfig {
    fn default() -> Self {
        Self {
            bucket: "url-shortener-terraform-state".to_string(),
            key: "url-shortener-terraform-state.tfstate".to_string(),
            lock_table: "url-shortener-terraform-state-lock".to_string(),
            encrypt: true,
        }
    }
}

/// S3 remote state of one stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Backend {
    pub bucket: String,
    pub key: String,
    pub region: String,
    pub dynamodb_table: String,
    pub encrypt: bool,
    pub profile: Option<String>,
}

impl S3Backend {
    /// Backend for `stack`, keyed `<stack-id>/<key>`
    pub fn for_stack(
        config: &StateBackendConfig,
        stack: &StackId,
        credentials: &AwsCredentials,
    ) -> Self {
        Self {
            bucket: config.bucket.clone(),
            key: format!("{}/{}", stack, config.key),
            region: credentials.region().to_string(),
            dynamodb_table: config.lock_table.clone(),
            encrypt: config.encrypt,
            profile: credentials.profile().map(str::to_string),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "bucket": self.bucket,
            "key": self.key,
            "region": self.region,
            "dynamodb_table": self.dynamodb_table,
            "encrypt": self.encrypt,
        });
        if let (Some(profile), Some(map)) = (&self.profile, body.as_object_mut()) {
            map.insert("profile".to_string(), json!(profile));
        }
        body
    }
}

/// Where the engine keeps a stack's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    /// State file next to the synthesized document
    Local { path: String },
    /// Shared bucket with a lock table
    S3(S3Backend),
}

impl Backend {
    /// Local state file named after the stack
    pub fn local_for(stack: &StackId) -> Self {
        Backend::Local {
            path: format!("terraform.{}.tfstate", stack),
        }
    }

    /// Backend type name as the engine spells it
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Local { .. } => "local",
            Backend::S3(_) => "s3",
        }
    }

    /// Body of the `terraform.backend.<kind>` block
    pub fn config(&self) -> serde_json::Value {
        match self {
            Backend::Local { path } => json!({ "path": path }),
            Backend::S3(s3) => s3.to_json(),
        }
    }

    /// Config a sibling stack uses to read this state
    ///
    /// Local paths are rewritten relative to the reader's directory, since
    /// every stack is synthesized into its own directory under one parent.
    pub fn remote_state_config(&self, origin: &StackId) -> serde_json::Value {
        match self {
            Backend::Local { path } => json!({ "path": format!("../{}/{}", origin, path) }),
            Backend::S3(s3) => s3.to_json(),
        }
    }
}

/// Resources holding the shared state
#[derive(Debug, Clone)]
pub struct StateStore {
    pub bucket: ResourceRef<S3Bucket>,
    pub versioning: ResourceRef<S3BucketVersioning>,
    pub lock_table: ResourceRef<DynamodbTable>,
}

/// Declare the state bucket (versioned) and lock table in `stack`
pub fn declare_state_store(
    stack: &mut Stack,
    config: &StateBackendConfig,
    tags: &Tags,
) -> SynthResult<StateStore> {
    validate_non_empty(&config.bucket, "state bucket")?;
    validate_non_empty(&config.lock_table, "state lock table")?;

    let id = stack.id().clone();

    let bucket = stack.declare::<S3Bucket>(
        id.as_str(),
        Block::new().attr("bucket", &config.bucket).tags(tags),
    )?;

    let versioning = stack.declare::<S3BucketVersioning>(
        format!("{}-versioning", id),
        Block::new().attr("bucket", bucket.id()).attr(
            "versioning_configuration",
            Value::map([("status", "Enabled")]),
        ),
    )?;

    let lock_table = stack.declare::<DynamodbTable>(
        format!("{}-table", id),
        Block::new()
            .attr("name", &config.lock_table)
            .attr("hash_key", "LockID")
            .attr("billing_mode", "PAY_PER_REQUEST")
            .attr(
                "attribute",
                Value::list([Value::map([("name", "LockID"), ("type", "S")])]),
            )
            .tags(tags),
    )?;

    info!(
        stack = %id,
        bucket = %config.bucket,
        lock_table = %config.lock_table,
        "Declared state store"
    );

    Ok(StateStore {
        bucket,
        versioning,
        lock_table,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CredentialSource;

    fn credentials() -> AwsCredentials {
        AwsCredentials::new(CredentialSource::Profile("ops".to_string()), "eu-west-1")
    }

    #[test]
    fn test_state_key_is_prefixed_per_stack() {
        let config = StateBackendConfig::default();
        let vpc = S3Backend::for_stack(&config, &StackId::new("vpc").unwrap(), &credentials());
        let ecs = S3Backend::for_stack(&config, &StackId::new("ecs").unwrap(), &credentials());

        assert_eq!(vpc.key, "vpc/url-shortener-terraform-state.tfstate");
        assert_ne!(vpc.key, ecs.key);
        assert_eq!(vpc.bucket, ecs.bucket);
        assert_eq!(vpc.profile.as_deref(), Some("ops"));
    }

    #[test]
    fn test_local_remote_state_path_is_relative_to_sibling() {
        let origin = StackId::new("vpc").unwrap();
        let backend = Backend::local_for(&origin);
        assert_eq!(
            backend.remote_state_config(&origin),
            json!({ "path": "../vpc/terraform.vpc.tfstate" })
        );
    }

    #[test]
    fn test_state_store_declares_bucket_versioning_and_lock_table() {
        let mut stack = Stack::new(StackId::new("state").unwrap());
        let store =
            declare_state_store(&mut stack, &StateBackendConfig::default(), &Tags::new()).unwrap();

        assert_eq!(stack.resources().len(), 3);
        let table = stack.resource(&store.lock_table.address()).unwrap();
        assert_eq!(
            table.attribute("hash_key").and_then(Value::as_expr).and_then(|e| e.as_literal()),
            Some("LockID".to_string())
        );
        assert!(stack.contains("aws_s3_bucket_versioning.state-versioning"));
    }
}
