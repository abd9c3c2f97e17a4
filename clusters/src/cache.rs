//! On-disk cache of filtered catalog rows.
//!
//! One JSON file per cluster under a root directory (defaults to `cache/`),
//! holding the `Vec<StarRecord>` produced by a download run.

use std::fs;
use std::path::{Path, PathBuf};

use crate::rows::StarRecord;

/// Errors from loading or saving cached rows.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("no cached rows for cluster {0:?}")]
    Missing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed cache file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Directory-rooted store of filtered rows, keyed by cluster name.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root_path: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at the default `cache/` directory.
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("cache"))
    }

    /// Create a store rooted at a custom directory.
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Get the root cache path.
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// File path for a cluster's rows. Spaces in the name are replaced with
    /// underscores for filesystem safety ("NGC 6475" -> "NGC_6475.json").
    fn rows_path(&self, name: &str) -> PathBuf {
        let name_safe = name.replace([' ', '/'], "_");
        self.root_path.join(format!("{name_safe}.json"))
    }

    /// Check whether cached rows exist for a cluster.
    pub fn contains(&self, name: &str) -> bool {
        self.rows_path(name).exists()
    }

    /// Load the cached rows for a cluster.
    ///
    /// Returns `CacheError::Missing` if the cluster has never been saved.
    pub fn load(&self, name: &str) -> Result<Vec<StarRecord>, CacheError> {
        let path = self.rows_path(name);
        if !path.exists() {
            return Err(CacheError::Missing(name.to_string()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save rows for a cluster, creating the cache directory if needed.
    ///
    /// Returns the path the rows were written to.
    pub fn save(&self, name: &str, rows: &[StarRecord]) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.root_path)?;
        let path = self.rows_path(name);
        fs::write(&path, serde_json::to_string(rows)?)?;
        Ok(path)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}
