//! Artifact fetchers
//!
//! A fetcher resolves a logical artifact path (`HotFix/hotfix.module.bytes`)
//! to the encoded bytes. The loader picks the blocking or suspending variant
//! from `loader.fetch_mode`.

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// No artifact at this path
    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// Reading the artifact failed
    #[error("Failed to read artifact {path}: {source}")]
    Io {
        /// Logical path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The fetcher's backing store is unavailable
    #[error("Artifact source unavailable: {0}")]
    Unavailable(String),
}

/// Resolves logical paths to encoded artifact bytes
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    /// Blocking fetch
    fn load_sync(&self, path: &str) -> Result<Vec<u8>, FetchError>;

    /// Suspending fetch
    async fn load_async(&self, path: &str) -> Result<Vec<u8>, FetchError>;
}

/// Reads artifacts from a directory on disk
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    /// Fetcher rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    fn map_err(path: &str, err: std::io::Error) -> FetchError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound(path.to_string())
        } else {
            FetchError::Io {
                path: path.to_string(),
                source: err,
            }
        }
    }
}

#[async_trait]
impl ArtifactFetcher for FileFetcher {
    fn load_sync(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.resolve(path);
        tracing::debug!(path, file = %full.display(), "reading artifact");
        std::fs::read(&full).map_err(|e| Self::map_err(path, e))
    }

    async fn load_async(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        let full = self.resolve(path);
        tracing::debug!(path, file = %full.display(), "reading artifact");
        tokio::fs::read(&full)
            .await
            .map_err(|e| Self::map_err(path, e))
    }
}

/// Serves artifacts from memory
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    artifacts: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl MemoryFetcher {
    /// Empty fetcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bytes under a logical path, replacing any previous entry
    pub fn insert(&self, path: impl Into<String>, bytes: Vec<u8>) {
        self.artifacts.write().insert(path.into(), bytes);
    }

    /// Remove an entry
    pub fn remove(&self, path: &str) -> Option<Vec<u8>> {
        self.artifacts.write().remove(path)
    }

    /// Whether a path is present
    pub fn contains(&self, path: &str) -> bool {
        self.artifacts.read().contains_key(path)
    }
}

#[async_trait]
impl ArtifactFetcher for MemoryFetcher {
    fn load_sync(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.artifacts
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(path.to_string()))
    }

    async fn load_async(&self, path: &str) -> Result<Vec<u8>, FetchError> {
        self.load_sync(path)
    }
}
