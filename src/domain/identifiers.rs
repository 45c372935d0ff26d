// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack identifiers and tag sets

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::invariants::ValidationError;

/// Resource tags, ordered so synthesized output is stable
pub type Tags = BTreeMap<String, String>;

/// Merge `extra` over `base`; later keys win
pub fn merge_tags<K, V>(base: &Tags, extra: impl IntoIterator<Item = (K, V)>) -> Tags
where
    K: Into<String>,
    V: Into<String>,
{
    let mut merged = base.clone();
    for (key, value) in extra {
        merged.insert(key.into(), value.into());
    }
    merged
}

/// Whether `name` is usable as a block label by the provisioning engine
///
/// Letters, digits, `_` and `-`; must start with a letter or `_`.
pub fn is_engine_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Fit `name` into a cloud-side name of at most `max_len` characters
///
/// Anything but ASCII letters, digits and `-` becomes `-`, and the result
/// never starts or ends with `-`. A name over the limit keeps its leading
/// characters and ends in eight hex digits of the SHA-256 of the whole name,
/// so distinct long names stay distinct. `max_len` must exceed 9.
///
/// ```rust
/// use cim_infrastructure_aws::domain::fit_name;
///
/// assert_eq!(fit_name("svc-tg", 32), "svc-tg");
/// let long = fit_name("url-shortener-ecs-url-shortener-service-tg", 32);
/// assert_eq!(long.len(), 32);
/// assert!(long.starts_with("url-shortener-ecs-url-"));
/// ```
pub fn fit_name(name: &str, max_len: usize) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let sanitized = sanitized.trim_matches('-');
    if sanitized.len() <= max_len {
        return sanitized.to_string();
    }

    let digest = format!("{:x}", Sha256::digest(sanitized.as_bytes()));
    let hash = &digest[..8];
    let keep = max_len.saturating_sub(hash.len() + 1);
    match sanitized[..keep].trim_end_matches('-') {
        "" => hash.to_string(),
        prefix => format!("{}-{}", prefix, hash),
    }
}

/// Identifier of a stack (one independently planned and applied unit)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StackId(String);

impl StackId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if !is_engine_identifier(&id) {
            return Err(ValidationError::InvalidIdentifier(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StackId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for StackId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StackId> for String {
    fn from(value: StackId) -> Self {
        value.0
    }
}
