use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::OutputConfig;
use crate::config::Config;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to initialize (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Overwrite existing configuration
    #[arg(long)]
    force: bool,

    /// Repository to report into, as owner/repo
    #[arg(long)]
    repo: Option<String>,
}

#[derive(Serialize)]
struct InitOutput {
    status: String,
    config: String,
}

pub async fn run(args: InitArgs, output: OutputConfig) -> Result<()> {
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", args.path.display()))?;

    let config_path = Config::config_path(&root);

    if config_path.exists() && !args.force {
        bail!(
            "Darn already initialized at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let mut config = Config::default();
    if let Some(repo) = &args.repo {
        let Some((owner, name)) = repo.split_once('/') else {
            bail!("--repo must look like owner/repo, got '{}'", repo);
        };
        config.github.owner = owner.to_string();
        config.github.repo = name.to_string();
    }
    config.save(&config_path)?;

    if output.json {
        let json_output = InitOutput {
            status: "initialized".to_string(),
            config: config_path.display().to_string(),
        };
        println!("{}", serde_json::to_string_pretty(&json_output)?);
    } else if !output.quiet {
        println!("{} Darn initialized", "✓".green());
        println!("  Config: {}", config_path.display());
        println!("\nNext steps:");
        println!("  edit {} to point at your repository", "darn.toml".cyan());
        println!("  {} to preview extracted items", "darn scan".cyan());
        println!("  {} to reconcile them with GitHub", "darn sync".cyan());
    }

    Ok(())
}
