//! Models command - download and inspect the OCR model files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use rcpt_core::models::config::RcptConfig;

use super::config::load_config;
use crate::store::default_model_dir;

/// Arguments for the models command.
#[derive(Args)]
pub struct ModelsArgs {
    #[command(subcommand)]
    command: ModelsCommand,
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// Download the detection model, recognition model and dictionary
    Download(DownloadArgs),

    /// Check which model files are present
    Status,

    /// Print the model directory
    Path,
}

#[derive(Args)]
struct DownloadArgs {
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Force re-download even if files exist
    #[arg(long)]
    force: bool,
}

pub async fn run(args: ModelsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    match args.command {
        ModelsCommand::Download(download_args) => download_models(&config, download_args).await,
        ModelsCommand::Status => check_status(&config),
        ModelsCommand::Path => {
            println!("{}", model_dir(&config).display());
            Ok(())
        }
    }
}

fn model_dir(config: &RcptConfig) -> PathBuf {
    config.ocr.model_dir.clone().unwrap_or_else(default_model_dir)
}

fn model_names(config: &RcptConfig) -> [&str; 3] {
    [
        config.ocr.detection_model.as_str(),
        config.ocr.recognition_model.as_str(),
        config.ocr.dictionary.as_str(),
    ]
}

async fn download_models(config: &RcptConfig, args: DownloadArgs) -> anyhow::Result<()> {
    let output_dir = args.output.unwrap_or_else(|| model_dir(config));
    fs::create_dir_all(&output_dir)?;

    println!(
        "{} Downloading OCR models to {}",
        style("ℹ").blue(),
        output_dir.display()
    );
    println!();

    let client = reqwest::Client::builder()
        .user_agent(concat!("rcpt-cli/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let multi_progress = MultiProgress::new();
    let mut error_count = 0;

    for name in model_names(config) {
        let path = output_dir.join(name);

        if path.exists() && !args.force {
            println!(
                "  {} {} (already exists, {})",
                style("✓").green(),
                name,
                format_size(fs::metadata(&path)?.len())
            );
            continue;
        }

        let url = format!("{}/{}", config.models.base_url.trim_end_matches('/'), name);

        let pb = multi_progress.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {msg:<30} [{bar:25.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(name.to_string());

        match download_file(&client, &url, &path, &pb).await {
            Ok(()) => {
                pb.finish_with_message(format!("{} {}", style("✓").green(), name));
            }
            Err(e) => {
                pb.finish_with_message(format!("{} {} - {}", style("✗").red(), name, e));
                error_count += 1;
            }
        }
    }

    println!();

    if error_count > 0 {
        anyhow::bail!(
            "{} model file(s) failed to download; retry with: rcpt models download --force",
            error_count
        );
    }

    println!("{} Models ready.", style("✓").green().bold());
    Ok(())
}

async fn download_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    pb: &ProgressBar,
) -> anyhow::Result<()> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("HTTP {}", response.status());
    }

    if let Some(content_length) = response.content_length() {
        pb.set_length(content_length);
    }

    // Download next to the target, then rename
    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path)?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    Ok(())
}

fn check_status(config: &RcptConfig) -> anyhow::Result<()> {
    let dir = model_dir(config);

    println!("{}", style("Model Status").bold());
    println!("  Directory: {}", dir.display());
    println!();

    let mut missing = 0;
    for name in model_names(config) {
        let path = dir.join(name);
        match fs::metadata(&path) {
            Ok(meta) => println!(
                "  {} {:<20} {}",
                style("✓").green(),
                name,
                format_size(meta.len())
            ),
            Err(_) => {
                missing += 1;
                println!("  {} {:<20} missing", style("✗").red(), name);
            }
        }
    }

    println!();
    if missing == 0 {
        println!("{} All models present.", style("✓").green());
    } else {
        println!(
            "{} Run 'rcpt models download' to fetch missing files, or scan with --text-only.",
            style("ℹ").blue()
        );
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(7_500_000), "7.2 MB");
    }

    #[test]
    fn test_model_names_follow_config() {
        let mut config = RcptConfig::default();
        config.ocr.recognition_model = "en_rec.onnx".to_string();
        assert_eq!(
            model_names(&config),
            ["det.onnx", "en_rec.onnx", "latin_dict.txt"]
        );
    }
}
