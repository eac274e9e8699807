use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DESCRIPTOR_FILENAME: &str = "quarry.toml";
pub const IGNORE_FILENAME: &str = ".gitignore";
pub const IGNORE_LINE: &str = ".quarry\n";

/// Final output artifact of a successful `new` run: the project name and the
/// runtime revision it was built against. Written exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProjectDescriptor {
    pub name: String,
    pub revision: String,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("project file {path} already exists")]
    AlreadyExists { path: PathBuf },
    #[error("failed to serialize project descriptor: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub fn descriptor_path(project_dir: &Path) -> PathBuf {
    project_dir.join(DESCRIPTOR_FILENAME)
}

/// Creates the project directory and writes the descriptor plus the ignore
/// artifact. Refuses to overwrite an existing descriptor.
pub fn write_project(project_dir: &Path, descriptor: &ProjectDescriptor) -> Result<(), DescriptorError> {
    let path = descriptor_path(project_dir);
    if path.exists() {
        return Err(DescriptorError::AlreadyExists { path });
    }

    let raw = toml::to_string_pretty(descriptor)?;

    fs::create_dir_all(project_dir).map_err(|source| DescriptorError::Write {
        path: project_dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, raw).map_err(|source| DescriptorError::Write {
        path: path.clone(),
        source,
    })?;

    let ignore_path = project_dir.join(IGNORE_FILENAME);
    fs::write(&ignore_path, IGNORE_LINE).map_err(|source| DescriptorError::Write {
        path: ignore_path,
        source,
    })
}
