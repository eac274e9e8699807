pub mod cli;
pub mod diagnostics;
pub mod dispatch;

use anyhow::{Context, Result};
use clap::Parser;
use quarry_app::App;
use quarry_core::layout::CacheLayout;

use crate::cli::Cli;
use crate::diagnostics::DiagnosticsSession;

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let layout = CacheLayout::resolve().context("failed to resolve the quarry cache directory")?;
    let session = DiagnosticsSession::initialize(cli.diagnostics, &layout)?;
    if let Some(path) = session.path() {
        eprintln!("Diagnostics enabled: {}", path.display());
    }

    let app = App::new(layout);
    let cwd = std::env::current_dir().context("failed to determine current directory")?;

    dispatch::run_with_deps(cli, &app, &cwd, &session)
}
