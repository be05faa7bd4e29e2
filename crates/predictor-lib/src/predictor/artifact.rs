//! Versioned, checksummed model artifact on disk
//!
//! The artifact is a small JSON envelope around the serialized model. The
//! SHA256 checksum covers the exact payload text, so a truncated or edited
//! file is rejected before anything is deserialized from it.

use crate::error::ArtifactError;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Bumped whenever the serialized model layout changes
pub const FORMAT_VERSION: u32 = 1;

/// On-disk envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub created_at: String,
    pub checksum: String,
    pub payload: String,
}

impl ModelArtifact {
    /// Serialize a model into a sealed envelope
    pub fn seal<T: Serialize>(model: &T, path: &Path) -> Result<Self, ArtifactError> {
        let payload = serde_json::to_string(model).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("failed to serialize model: {e}"),
        })?;

        Ok(Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now().to_rfc3339(),
            checksum: compute_checksum(payload.as_bytes()),
            payload,
        })
    }

    /// Verify the envelope and deserialize the model it carries
    pub fn open<T: DeserializeOwned>(&self, path: &Path) -> Result<T, ArtifactError> {
        if self.format_version != FORMAT_VERSION {
            return Err(ArtifactError::Incompatible {
                path: path.to_path_buf(),
                found: self.format_version,
                expected: FORMAT_VERSION,
            });
        }

        let actual = compute_checksum(self.payload.as_bytes());
        if actual != self.checksum {
            return Err(ArtifactError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("checksum mismatch: expected {}, got {}", self.checksum, actual),
            });
        }

        serde_json::from_str(&self.payload).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("invalid model payload: {e}"),
        })
    }

    /// Write atomically: temp file, fsync, rename
    pub fn write(&self, path: &Path) -> Result<(), ArtifactError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }

        let json = serde_json::to_vec_pretty(self).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("failed to serialize envelope: {e}"),
        })?;

        let temp_path = path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(io_error(&temp_path))?;
        file.write_all(&json).map_err(io_error(&temp_path))?;
        file.sync_all().map_err(io_error(&temp_path))?;

        fs::rename(&temp_path, path).map_err(io_error(path))?;

        debug!(path = ?path, bytes = json.len(), "Model artifact written");
        Ok(())
    }

    /// Read an envelope without verifying it
    pub fn read(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("invalid artifact envelope: {e}"),
        })
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError {
    let path = path.to_path_buf();
    move |source| ArtifactError::Io { path, source }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
