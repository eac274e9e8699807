use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("could not resolve home directory for cache path")]
    HomeDirectoryUnavailable,
    #[error("failed to create cache directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk layout of the local cache root: extracted runtime sources live
/// under `sources`, the dependency tree handed to the configure step under
/// `pg`, and the revision manifest next to both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn resolve() -> Result<Self, LayoutError> {
        let base_dirs = BaseDirs::new().ok_or(LayoutError::HomeDirectoryUnavailable)?;
        Ok(Self::at(base_dirs.cache_dir().join("quarry")))
    }

    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join("sources")
    }

    pub fn pg_dir(&self) -> PathBuf {
        self.root.join("pg")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("cache.toml")
    }

    pub fn ensure_dirs(&self) -> Result<(), LayoutError> {
        for dir in [self.sources_dir(), self.pg_dir()] {
            fs::create_dir_all(&dir).map_err(|source| LayoutError::Create { path: dir, source })?;
        }
        Ok(())
    }
}
