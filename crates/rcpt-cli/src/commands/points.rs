//! Points command - show the stored balance.

use clap::Args;
use console::style;
use serde::Serialize;

use rcpt_core::models::receipt::RecognizedText;

use super::config::load_config;
use crate::store::StateStore;

/// Arguments for the points command.
#[derive(Args)]
pub struct PointsArgs {
    /// Also list recorded receipts
    #[arg(long)]
    history: bool,

    /// Print as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct PointsReport<'a> {
    point_balance: u64,
    cumulative_amount: String,
    receipts_recorded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    history: Option<Vec<&'a str>>,
}

pub async fn run(args: PointsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = StateStore::from_config(&config);
    let snapshot = store.load()?;

    if args.json {
        let report = PointsReport {
            point_balance: snapshot.rewards.point_balance,
            cumulative_amount: format!("{:.2}", snapshot.rewards.cumulative_amount),
            receipts_recorded: snapshot.history.len(),
            history: args
                .history
                .then(|| snapshot.history.iter().map(RecognizedText::as_str).collect()),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "Total Points Earned: {}",
        style(snapshot.rewards.point_balance).green().bold()
    );
    println!(
        "Cumulative spend:    {:.2}",
        snapshot.rewards.cumulative_amount
    );
    println!("Receipts recorded:   {}", snapshot.history.len());

    if args.history {
        println!();
        if snapshot.history.is_empty() {
            println!("{} No receipts scanned yet.", style("ℹ").blue());
        }
        for (i, text) in snapshot.history.iter().enumerate() {
            let headline = text.headline();
            let headline = if headline.is_empty() { "(blank)" } else { headline };
            println!("  {:>3}. {}", i + 1, headline);
        }
    }

    if let Some(updated_at) = snapshot.updated_at {
        println!();
        println!(
            "{} Last updated {}",
            style("ℹ").blue(),
            updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}
