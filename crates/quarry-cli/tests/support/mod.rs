use std::path::Path;

use assert_cmd::Command;

/// Binds HOME and XDG_CACHE_HOME to a throwaway directory so runs never
/// touch the real cache.
pub fn quarry_with_temp_home() -> (Command, tempfile::TempDir) {
    let temp_home = tempfile::tempdir().expect("temp home");
    let binary = assert_cmd::cargo::cargo_bin!("quarry");
    let mut command = Command::new(binary);
    command.env("HOME", temp_home.path());
    command.env("XDG_CACHE_HOME", temp_home.path().join(".cache"));
    (command, temp_home)
}

pub fn cache_root(home: &Path) -> std::path::PathBuf {
    home.join(".cache").join("quarry")
}
