use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(bin_name = "quarry")]
#[command(version)]
#[command(about = "Scaffold applications on top of the quarry runtime")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Capture a diagnostics log for this run.
    #[arg(long, global = true)]
    pub diagnostics: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Download, build, and initialize a new application")]
    New {
        /// Project directory; defaults to the current directory.
        directory: Option<PathBuf>,

        /// Application name; skips the interactive name prompt.
        #[arg(short, long)]
        name: Option<String>,
    },
}
