mod init;
mod scan;
mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "darn")]
#[command(about = "Turn TODO comments into tracked GitHub issues")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Show detailed progress
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default darn.toml configuration
    Init(init::InitArgs),

    /// Extract to-do comments from the tree and print them
    Scan(scan::ScanArgs),

    /// Scan and reconcile against GitHub issues
    Sync(sync::SyncArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let output = OutputConfig {
            json: self.json,
            quiet: self.quiet,
            verbose: self.verbose,
        };

        match self.command {
            Commands::Init(args) => init::run(args, output).await,
            Commands::Scan(args) => scan::run(args, output).await,
            Commands::Sync(args) => sync::run(args, output).await,
        }
    }
}

/// Output configuration passed to all commands
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    pub verbose: bool,
}
