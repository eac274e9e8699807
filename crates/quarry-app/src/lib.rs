pub mod new;
mod target;

use anyhow::{Context, Result};
use quarry_core::layout::CacheLayout;
use quarry_core::manifest::{self, CacheManifest};

/// URL of the runtime source tarball built for new projects.
pub const RUNTIME_TARBALL_URL: &str = "https://github.com/quarrydev/quarry-runtime/tarball/master";

pub struct App {
    layout: CacheLayout,
}

impl App {
    pub fn new(layout: CacheLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub fn load_manifest(&self) -> Result<CacheManifest> {
        let path = self.layout.manifest_path();
        manifest::load_manifest(&path)
            .with_context(|| format!("failed to load cache manifest at {}", path.display()))
    }

    /// Appends the revision to the persisted record. Called once after a
    /// build completes, even when the surrounding run was cancelled later.
    pub fn record_built_revision(&self, revision: &str) -> Result<()> {
        let path = self.layout.manifest_path();
        let mut manifest = self.load_manifest()?;
        manifest.record(revision);
        manifest::save_manifest(&path, &manifest)
            .with_context(|| format!("failed to save cache manifest at {}", path.display()))
    }
}
