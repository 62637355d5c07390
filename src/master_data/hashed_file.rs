//! JSON file cache keyed by content hash.
//!
//! [`HashCachedFile`] rereads the file on every load but only reparses it
//! when the SHA-256 digest of the bytes changed since the previous load.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::TrackerError;

/// Hex-encoded SHA-256 digest of `bytes`.
#[must_use]
pub fn compute_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A JSON document on disk together with its last parsed value.
#[derive(Debug)]
pub struct HashCachedFile<T> {
    path: PathBuf,
    cached: Option<(String, Arc<T>)>,
    parse_count: u64,
}

impl<T: DeserializeOwned> HashCachedFile<T> {
    /// Creates a cache for `path`. Nothing is read until the first load.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: None,
            parse_count: 0,
        }
    }

    /// Path of the cached file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// How many times the file content was actually parsed.
    #[must_use]
    pub const fn parse_count(&self) -> u64 {
        self.parse_count
    }

    /// Digest of the content currently held, if any.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.cached.as_ref().map(|(digest, _)| digest.as_str())
    }

    /// Returns the parsed document, reparsing only when the bytes changed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MasterData`] if the file cannot be read or
    /// is not valid JSON for `T`. The previously cached value is kept.
    pub async fn load(&mut self) -> Result<Arc<T>, TrackerError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            TrackerError::MasterData(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let digest = compute_hash(&bytes);

        if let Some((cached_digest, value)) = &self.cached
            && *cached_digest == digest
        {
            return Ok(Arc::clone(value));
        }

        let parsed: T = serde_json::from_slice(&bytes).map_err(|e| {
            TrackerError::MasterData(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        let value = Arc::new(parsed);
        self.cached = Some((digest, Arc::clone(&value)));
        self.parse_count += 1;
        tracing::debug!(path = %self.path.display(), "master data reparsed");
        Ok(value)
    }
}
