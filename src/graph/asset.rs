// Copyright (c) 2025 - Cowboy AI, Inc.
//! Content-addressed build inputs

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use walkdir::WalkDir;

use crate::errors::{SynthError, SynthResult};

/// Digest of a local directory used as a build input
///
/// # Invariants
///
/// - `hash` depends only on relative file paths and file contents, never on
///   timestamps or the absolute location of the directory
/// - Files are visited in sorted path order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFingerprint {
    /// Directory the digest was taken from
    pub path: PathBuf,
    /// Lowercase hex SHA-256
    pub hash: String,
    /// Number of regular files hashed
    pub files: usize,
}

impl AssetFingerprint {
    /// Hash every regular file below `path`
    pub fn of_directory(path: impl AsRef<Path>) -> SynthResult<Self> {
        let root = path.as_ref();
        let metadata = fs::metadata(root).map_err(|e| SynthError::Asset {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(SynthError::Asset {
                path: root.to_path_buf(),
                message: "not a directory".to_string(),
            });
        }

        let mut hasher = Sha256::new();
        let mut files = 0;

        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(|e| SynthError::Asset {
                path: root.to_path_buf(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or_else(|_| entry.path());
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();

            let contents = fs::read(entry.path()).map_err(|e| SynthError::io(entry.path(), e))?;

            hasher.update(relative.join("/").as_bytes());
            hasher.update([0u8]);
            hasher.update((contents.len() as u64).to_be_bytes());
            hasher.update(&contents);
            files += 1;
        }

        let hash = format!("{:x}", hasher.finalize());
        debug!(path = %root.display(), files, hash = %hash, "Fingerprinted asset");

        Ok(Self {
            path: root.to_path_buf(),
            hash,
            files,
        })
    }
}
