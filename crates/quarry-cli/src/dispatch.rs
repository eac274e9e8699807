use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use quarry_app::{App, RUNTIME_TARBALL_URL};
use quarry_core::fetch::{self, Transfer};
use quarry_tui::TuiExit;
use quarry_tui::download::SETTLE_DELAY;
use quarry_tui::message::IdGen;
use quarry_tui::screen::{NewScreen, ScreenParams};

use crate::cli::{Cli, Command};
use crate::diagnostics::DiagnosticsSession;

pub fn run_with_deps(
    cli: Cli,
    app: &App,
    cwd: &Path,
    session: &DiagnosticsSession,
) -> Result<()> {
    match cli.command {
        Command::New { directory, name } => {
            run_new_command(app, cwd, directory.as_deref(), name, session)
        }
    }
}

fn run_new_command(
    app: &App,
    cwd: &Path,
    directory: Option<&Path>,
    name: Option<String>,
    session: &DiagnosticsSession,
) -> Result<()> {
    let plan = app.new_prepare(cwd, directory, name)?;
    let manifest = app.load_manifest()?;
    session.record(format!("preflight complete for {}", plan.project_dir.display()));

    let transfer: Transfer = fetch::open_transfer(RUNTIME_TARBALL_URL)
        .context("failed to start the runtime download")?;
    let revision = fetch::infer_revision(&transfer.filename).ok_or_else(|| {
        anyhow!(
            "could not infer a runtime revision from tarball name {}",
            transfer.filename
        )
    })?;
    let cache_hit = manifest.contains(&revision);
    session.record(format!("runtime revision {revision}, cache_hit={cache_hit}"));

    let ids = IdGen::new();
    let mut screen = NewScreen::new(
        &ids,
        ScreenParams {
            what: format!("quarry runtime ({revision})"),
            cache_hit,
            name_placeholder: plan.name_placeholder.clone(),
            name_flag: plan.name_flag.clone(),
            pg_dir: app.layout().pg_dir(),
            settle: SETTLE_DELAY,
            build_plan: None,
        },
    );
    if !cache_hit {
        screen.begin_download(transfer, app.layout().sources_dir());
    }

    let exit = quarry_tui::run_new(&mut screen)?;

    // A finished build is worth remembering even when the run is cancelled
    // at the prompt afterwards.
    if screen.build_succeeded() {
        app.record_built_revision(&revision)?;
        session.record(format!("recorded built revision {revision}"));
    }

    match exit {
        TuiExit::Canceled => {
            session.record("run cancelled");
            Ok(())
        }
        TuiExit::Failed => {
            for line in screen.failure_lines() {
                eprintln!("{line}");
            }
            session.record("run failed");
            bail!("setting up the runtime failed");
        }
        TuiExit::Completed => {
            let project_name = screen.project_name().to_string();
            app.new_finish(&plan, &project_name, &revision)?;
            session.record(format!("created project {project_name}"));
            println!(
                "Created project {project_name} in {}",
                plan.project_dir.display()
            );
            Ok(())
        }
    }
}
