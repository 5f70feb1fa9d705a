use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use super::OutputConfig;
use crate::config::Config;
use crate::scan::TodoGenerator;
use crate::types::{ScanStats, TodoItem};

#[derive(Args)]
pub struct ScanArgs {
    /// Directory to scan (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Additional include pattern (regex); repeatable
    #[arg(long)]
    include: Vec<String>,

    /// Additional exclude pattern (regex); repeatable
    #[arg(long)]
    exclude: Vec<String>,

    /// Resolve commit and author for each item via git blame
    #[arg(long)]
    blame: bool,
}

#[derive(Serialize)]
struct ScanOutput {
    items: Vec<TodoItem>,
    stats: ScanStats,
    elapsed_ms: u128,
}

pub async fn run(args: ScanArgs, output: OutputConfig) -> Result<()> {
    let start_time = Instant::now();

    let root = args
        .path
        .canonicalize()
        .with_context(|| format!("Invalid path: {}", args.path.display()))?;

    let mut config = Config::load_or_default(&root)?;
    config.scan.include.extend(args.include);
    config.scan.exclude.extend(args.exclude);

    let scan_root = root.join(&config.scan.root);
    let generator = TodoGenerator::new(&scan_root, &config.scan, args.blame)?;
    if output.verbose {
        tracing::info!("Using source root {}", generator.root().display());
    }

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

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let elapsed = start_time.elapsed();

    if output.json {
        let json_output = ScanOutput {
            items: outcome.items,
            stats: outcome.stats,
            elapsed_ms: elapsed.as_millis(),
        };
        println!("{}", serde_json::to_string_pretty(&json_output)?);
        return Ok(());
    }

    if !output.quiet {
        for item in &outcome.items {
            println!(
                "{}:{} {} {}",
                item.file.cyan(),
                item.line,
                format!("[{}]", item.kind).yellow(),
                item.title
            );
            if output.verbose {
                if !item.body.is_empty() {
                    for line in item.body.lines() {
                        println!("    {}", line.dimmed());
                    }
                }
                if let Some(author) = &item.author {
                    println!("    author: {}", author);
                }
                if let Some(commit) = &item.commit_id {
                    println!("    commit: {}", commit);
                }
            }
        }

        println!(
            "\n{} {} items in {} files ({} lines, {:.2}s)",
            "✓".green(),
            outcome.items.len(),
            outcome.stats.matched_files,
            outcome.stats.total_lines,
            elapsed.as_secs_f64()
        );
        if outcome.stats.duplicates > 0 || outcome.stats.too_small > 0 {
            println!(
                "  dropped {} duplicates, {} too small",
                outcome.stats.duplicates, outcome.stats.too_small
            );
        }
    }

    Ok(())
}
