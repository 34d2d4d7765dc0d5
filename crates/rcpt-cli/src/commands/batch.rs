//! Batch command - scan every receipt matching a glob pattern.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, warn};

use rcpt_core::models::state::RewardState;
use rcpt_core::pipeline::Outcome;

use super::config::load_config;
use super::scan::{open_session, read_input, submit};
use crate::store::StateStore;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of receipt files
    #[arg(required = true)]
    input: String,

    /// Write a JSON summary to this file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Continue after a receipt fails OCR or cannot be read
    #[arg(long)]
    continue_on_error: bool,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Treat inputs as already-recognized receipt text and skip OCR
    #[arg(long)]
    text_only: bool,
}

/// Per-file line of the summary.
#[derive(Serialize)]
struct FileResult {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    processing_time_ms: u64,
}

#[derive(Serialize, Default)]
struct BatchSummary {
    files: Vec<FileResult>,
    accepted: usize,
    without_subtotal: usize,
    duplicates: usize,
    failed: usize,
    points_awarded: u64,
    rewards: RewardState,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let store = StateStore::from_config(&config);

    // Expand glob pattern
    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            args.text_only
                || matches!(
                    ext.to_lowercase().as_str(),
                    "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" | "gif" | "uri"
                )
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} receipts to scan",
        style("ℹ").blue(),
        files.len()
    );

    let session = open_session(&config, args.model_dir.as_deref(), args.text_only, store.load()?)?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut summary = BatchSummary::default();

    // Sequential on purpose: the session admits one receipt at a time anyway.
    for path in files {
        let file_start = Instant::now();

        let submission = match read_input(&path, args.text_only) {
            Ok(input) => Ok(submit(&session, input).await),
            Err(e) => Err(e),
        };

        let processing_time_ms = file_start.elapsed().as_millis() as u64;
        pb.inc(1);

        let failure = match submission {
            Ok(submission) => {
                store.save(&session.snapshot().await)?;

                let failure = match &submission.outcome {
                    Outcome::Accepted {
                        amount,
                        points_awarded,
                    } => {
                        if amount.is_some() {
                            summary.accepted += 1;
                        } else {
                            summary.without_subtotal += 1;
                        }
                        summary.points_awarded += points_awarded;
                        None
                    }
                    Outcome::DuplicateDetected => {
                        summary.duplicates += 1;
                        None
                    }
                    Outcome::OcrFailed { reason } => Some(reason.clone()),
                };

                summary.files.push(FileResult {
                    path: path.clone(),
                    outcome: Some(submission.outcome),
                    error: None,
                    processing_time_ms,
                });
                failure
            }
            Err(e) => {
                let message = e.to_string();
                summary.files.push(FileResult {
                    path: path.clone(),
                    outcome: None,
                    error: Some(message.clone()),
                    processing_time_ms,
                });
                Some(message)
            }
        };

        if let Some(message) = failure {
            summary.failed += 1;
            if args.continue_on_error {
                warn!("Failed to scan {}: {}", path.display(), message);
            } else {
                pb.abandon();
                error!("Failed to scan {}: {}", path.display(), message);
                anyhow::bail!("Scanning failed for {}: {}", path.display(), message);
            }
        }
    }

    pb.finish_and_clear();
    summary.rewards = session.rewards().await;

    if let Some(summary_path) = &args.summary {
        fs::write(summary_path, serde_json::to_string_pretty(&summary)?)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!("{}", style("Batch Summary").bold());
    println!("  Accepted:          {}", style(summary.accepted).green());
    println!("  Without subtotal:  {}", summary.without_subtotal);
    println!("  Duplicates:        {}", style(summary.duplicates).yellow());
    println!("  Failed:            {}", style(summary.failed).red());
    println!("  Points awarded:    {}", summary.points_awarded);
    println!(
        "  Balance:           {} points ({:.2} spent)",
        summary.rewards.point_balance, summary.rewards.cumulative_amount
    );
    println!("  Total time:        {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
