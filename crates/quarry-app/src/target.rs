use std::path::{Path, PathBuf};

/// Resolves the project directory argument: absent means the current
/// directory, relative paths are joined onto it, absolute paths win.
pub(crate) fn resolve_project_dir(cwd: &Path, directory: Option<&Path>) -> PathBuf {
    match directory {
        None => cwd.to_path_buf(),
        Some(directory) if directory.is_absolute() => directory.to_path_buf(),
        Some(directory) => cwd.join(directory),
    }
}
