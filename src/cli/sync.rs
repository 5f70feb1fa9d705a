use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use super::OutputConfig;
use crate::config::Config;
use crate::reconcile::{branch_from_ref, Reconciler};
use crate::scan::{blame, TodoGenerator};
use crate::tracker::Client;

#[derive(Args)]
pub struct SyncArgs {
    /// Directory to sync (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Log mutations instead of performing them
    #[arg(long)]
    dry_run: bool,

    /// GitHub API token (falls back to config, then GITHUB_TOKEN)
    #[arg(long, env = "DARN_GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

pub async fn run(args: SyncArgs, output: OutputConfig) -> Result<()> {
    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", args.path.display()))?;

    let mut config = Config::load_or_default(&root)?;
    if args.dry_run {
        config.policy.dry_run = true;
    }
    if config.github.owner.is_empty() || config.github.repo.is_empty() {
        bail!("No repository configured. Run `darn init --repo owner/repo` first.");
    }

    let token = args
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| config.github.resolve_token())
        .context("No GitHub token. Set DARN_GITHUB_TOKEN or add one to darn.toml.")?;

    let scan_root = root.join(&config.scan.root);

    // Fill branch and sha from the local repository when the config
    // leaves them empty.
    if config.github.branch.is_empty() {
        config.github.branch = if config.github.git_ref.is_empty() {
            blame::head_branch(&scan_root).unwrap_or_default()
        } else {
            branch_from_ref(&config.github.git_ref)
        };
    }
    if config.github.sha.is_empty() {
        config.github.sha = blame::head_sha(&scan_root).unwrap_or_default();
    }
    if config.github.branch.is_empty() {
        tracing::warn!("Could not determine the current branch; branch labels will be empty");
    }

    if output.verbose {
        tracing::info!("Repo: {}/{}", config.github.owner, config.github.repo);
        tracing::info!("Label: {}", config.github.label);
        tracing::info!("Branch: {}", config.github.branch);
        tracing::info!("Sha: {}", config.github.sha);
        tracing::info!("Extended labels: {}", config.policy.extended_labels);
        tracing::info!("Close on same branch: {}", config.policy.close_on_same_branch);
        tracing::info!("Assign from blame: {}", config.policy.assign_from_blame);
        tracing::info!("Dry run: {}", config.policy.dry_run);
    }

    let generator = TodoGenerator::new(&scan_root, &config.scan, config.policy.assign_from_blame)?;

    let spinner = if !output.quiet && !output.json {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.set_message("Scanning for to-do comments...");
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let outcome = generator.generate().await?;

    if let Some(pb) = &spinner {
        pb.set_message(format!(
            "Reconciling {} items with GitHub...",
            outcome.items.len()
        ));
    }

    let client = Client::new(
        &config.github.api_url,
        &config.github.owner,
        &config.github.repo,
        &token,
    );
    let reconciler = Reconciler::new(&client, &config.github, &config.policy, &config.scan.root);
    let summary = reconciler.run(&outcome.items).await?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if output.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !output.quiet {
        let mode = if config.policy.dry_run { " (dry run)" } else { "" };
        println!(
            "{} Synced {}/{}{}",
            "✓".green(),
            config.github.owner,
            config.github.repo,
            mode
        );
        println!("  Extracted: {}", summary.extracted.to_string().cyan());
        println!("  Created:   {}", summary.created.to_string().cyan());
        println!("  Closed:    {}", summary.closed.to_string().cyan());
        if config.policy.assign_from_blame {
            println!("  Assigned:  {}", summary.assigned.to_string().cyan());
        }
    }

    Ok(())
}
