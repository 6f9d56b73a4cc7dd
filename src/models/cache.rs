use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{MatchError, Result};

/// Bumped whenever the on-disk layout changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// A cached embedding for one file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CachedEmbedding {
    /// Path the embedding was computed for.
    pub path: PathBuf,
    /// SHA3-256 of the file contents when it was embedded.
    pub sha3_256_hash: String,
    /// The embedding itself.
    pub embedding: Vec<f32>,
}

/// Embeddings computed by one embedder, keyed by file path and content hash.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CatalogCache {
    /// On-disk format version.
    pub version: u32,
    /// Name of the embedder that produced the vectors.
    pub embedder: String,
    /// Length of every vector.
    pub dimension: usize,
    /// When the cache was written (RFC 3339 format).
    pub created_at: String,
    /// Cached vectors in catalog order.
    pub entries: Vec<CachedEmbedding>,
}

impl CatalogCache {
    /// An empty cache for `embedder`.
    pub fn new(embedder: &str, dimension: usize) -> Self {
        Self {
            version: CACHE_FORMAT_VERSION,
            embedder: embedder.to_string(),
            dimension,
            created_at: chrono::Utc::now().to_rfc3339(),
            entries: Vec::new(),
        }
    }

    /// Whether vectors in this cache can stand in for `embedder`'s output.
    pub fn is_compatible(&self, embedder: &str, dimension: usize) -> bool {
        self.version == CACHE_FORMAT_VERSION && self.embedder == embedder && self.dimension == dimension
    }

    /// Entries keyed by path; a later duplicate replaces an earlier one.
    pub fn into_index(self) -> HashMap<PathBuf, CachedEmbedding> {
        self.entries
            .into_iter()
            .map(|e| (e.path.clone(), e))
            .collect()
    }

    /// Serializes the cache to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserializes a cache from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    /// Read the cache at `path`.
    ///
    /// Returns `Ok(None)` when there is no file yet, or when the file cannot
    /// be parsed; a broken cache only costs a rebuild.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let json = match std::fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MatchError::Io(e)),
        };

        match Self::from_json(&json) {
            Ok(cache) => {
                log::info!(
                    "Loaded {} cached embeddings from {}",
                    cache.entries.len(),
                    path.display()
                );
                Ok(Some(cache))
            }
            Err(e) => {
                log::warn!("Discarding unreadable cache {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Write the cache to `path`, replacing any previous file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(self.to_json()?.as_bytes())?;
        tmp.flush()?;
        tmp.persist(path)?;

        log::debug!("Saved {} embeddings to {}", self.entries.len(), path.display());
        Ok(())
    }
}
