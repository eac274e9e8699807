use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Record of runtime revisions that have previously been downloaded and
/// built to completion. Consulted once at startup; a hit short-circuits the
/// whole download/extract/build pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheManifest {
    #[serde(default)]
    pub revisions: Vec<String>,
}

impl CacheManifest {
    pub fn contains(&self, revision: &str) -> bool {
        self.revisions.iter().any(|known| known == revision)
    }

    /// Appends the revision unless it is already recorded.
    pub fn record(&mut self, revision: &str) {
        if !self.contains(revision) {
            self.revisions.push(revision.to_string());
        }
    }
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read cache manifest at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse cache manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to write cache manifest at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize cache manifest: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// A missing manifest is an empty one; the first successful build creates it.
pub fn load_manifest(path: &Path) -> Result<CacheManifest, ManifestError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            return Ok(CacheManifest::default());
        }
        Err(source) => {
            return Err(ManifestError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&raw).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save_manifest(path: &Path, manifest: &CacheManifest) -> Result<(), ManifestError> {
    let raw = toml::to_string_pretty(manifest)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }

    fs::write(path, raw).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_manifest_loads_as_empty() {
        let temp = tempfile::tempdir().expect("temp dir");
        let manifest = load_manifest(&temp.path().join("cache.toml")).expect("load");
        assert!(manifest.revisions.is_empty());
    }

    #[test]
    fn malformed_manifest_is_a_parse_error() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("cache.toml");
        fs::write(&path, "revisions = 3").expect("write manifest");

        let error = load_manifest(&path).expect_err("parse should fail");
        assert!(matches!(error, ManifestError::Parse { .. }));
    }

    #[test]
    fn record_save_load_round_trips_in_order() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("nested").join("cache.toml");

        let mut manifest = CacheManifest::default();
        manifest.record("0cc8d8c");
        manifest.record("91fd3ab");
        manifest.record("0cc8d8c");
        save_manifest(&path, &manifest).expect("save");

        let loaded = load_manifest(&path).expect("load");
        assert_eq!(loaded.revisions, vec!["0cc8d8c", "91fd3ab"]);
        assert!(loaded.contains("91fd3ab"));
        assert!(!loaded.contains("deadbeef"));
    }
}
