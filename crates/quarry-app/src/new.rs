use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use quarry_core::descriptor::{self, ProjectDescriptor};

use crate::App;
use crate::target;

/// Everything resolved before the interactive screen starts. Preflight
/// failures abort the command with a non-zero exit before any UI is drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlan {
    pub project_dir: PathBuf,
    /// Default offered by the name prompt, derived from the directory name.
    pub name_placeholder: String,
    /// Explicit `--name` flag; skips the interactive prompt when present.
    pub name_flag: Option<String>,
}

impl App {
    pub fn new_prepare(
        &self,
        cwd: &Path,
        directory: Option<&Path>,
        name_flag: Option<String>,
    ) -> Result<NewPlan> {
        let project_dir = target::resolve_project_dir(cwd, directory);

        let descriptor_path = descriptor::descriptor_path(&project_dir);
        if descriptor_path.exists() {
            bail!(
                "project file {} already exists, aborting",
                descriptor_path.display()
            );
        }

        self.layout()
            .ensure_dirs()
            .context("failed to prepare the local cache")?;

        let name_placeholder = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());

        Ok(NewPlan {
            project_dir,
            name_placeholder,
            name_flag,
        })
    }

    /// Writes the project descriptor and ignore artifact. Only called once
    /// every gating unit has finished.
    pub fn new_finish(&self, plan: &NewPlan, name: &str, revision: &str) -> Result<()> {
        descriptor::write_project(
            &plan.project_dir,
            &ProjectDescriptor {
                name: name.to_string(),
                revision: revision.to_string(),
            },
        )
        .with_context(|| {
            format!(
                "failed to create project in {}",
                plan.project_dir.display()
            )
        })
    }
}
