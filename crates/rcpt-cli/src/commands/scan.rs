//! Scan command - run receipts through the pipeline and bank the points.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use serde::Serialize;
use tracing::{debug, info};

use rcpt_core::error::OcrError;
use rcpt_core::models::config::RcptConfig;
use rcpt_core::models::receipt::{ReceiptImage, RecognizedText};
use rcpt_core::models::state::SessionSnapshot;
use rcpt_core::ocr::{PureOcrEngine, TextRecognizer};
use rcpt_core::pipeline::{Outcome, ReceiptSession, Submission};
use rcpt_core::receipt::{has_subtotal_label, normalize, FieldExtractor, SubtotalExtractor};

use super::config::load_config;
use crate::store::{default_model_dir, StateStore};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Receipt images, `data:` URI files (.uri), or text files with --text-only
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Model directory
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Treat inputs as already-recognized receipt text and skip OCR
    #[arg(long)]
    text_only: bool,

    /// List every subtotal candidate found in the text
    #[arg(long)]
    explain: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

/// Session whose OCR backend is chosen at runtime.
pub type CliSession = ReceiptSession<Box<dyn TextRecognizer>>;

/// Stand-in backend for `--text-only`, where images are never submitted.
struct OcrDisabled;

impl TextRecognizer for OcrDisabled {
    fn recognize(&self, _image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
        Err(OcrError::ModelLoad("OCR is disabled in --text-only mode".to_string()))
    }
}

/// One receipt ready for the pipeline.
pub enum ReceiptInput {
    Image(ReceiptImage),
    Text(RecognizedText),
}

#[derive(Serialize)]
struct ScanReport<'a> {
    input: String,
    #[serde(flatten)]
    submission: &'a Submission,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;
    let store = StateStore::from_config(&config);

    let session = open_session(&config, args.model_dir.as_deref(), args.text_only, store.load()?)?;

    for input in &args.inputs {
        info!("Scanning {}", input.display());

        let receipt = read_input(input, args.text_only)?;
        let submission = submit(&session, receipt).await;
        store.save(&session.snapshot().await)?;

        print_submission(input, &submission, args.format)?;

        if args.explain {
            explain(&submission);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Build a session over the stored state, loading OCR models unless `text_only`.
pub fn open_session(
    config: &RcptConfig,
    model_dir: Option<&Path>,
    text_only: bool,
    snapshot: SessionSnapshot,
) -> anyhow::Result<CliSession> {
    let recognizer: Box<dyn TextRecognizer> = if text_only {
        Box::new(OcrDisabled)
    } else {
        let model_dir = model_dir
            .map(Path::to_path_buf)
            .or_else(|| config.ocr.model_dir.clone())
            .unwrap_or_else(default_model_dir);
        Box::new(PureOcrEngine::from_dir(&model_dir, config.ocr.clone())?)
    };

    Ok(ReceiptSession::new(recognizer, snapshot)
        .with_timeout(config.ocr.timeout_ms.map(Duration::from_millis)))
}

/// Read one input file.
pub fn read_input(path: &Path, text_only: bool) -> anyhow::Result<ReceiptInput> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    if text_only {
        let text = fs::read_to_string(path)?;
        return Ok(ReceiptInput::Text(RecognizedText::from(text)));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "uri" => {
            let uri = fs::read_to_string(path)?;
            Ok(ReceiptInput::Image(ReceiptImage::from_data_uri(&uri)?))
        }
        "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "webp" | "gif" => {
            Ok(ReceiptInput::Image(ReceiptImage::from_path(path)?))
        }
        _ => anyhow::bail!("Unsupported file format: {}", extension),
    }
}

pub async fn submit(session: &CliSession, input: ReceiptInput) -> Submission {
    match input {
        ReceiptInput::Image(image) => session.submit(image).await,
        ReceiptInput::Text(text) => session.submit_text(text).await,
    }
}

pub fn print_submission(
    input: &Path,
    submission: &Submission,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let report = ScanReport {
                input: input.display().to_string(),
                submission,
            };
            println!("{}", serde_json::to_string(&report)?);
        }
        OutputFormat::Text => {
            let name = input.display();
            match &submission.outcome {
                Outcome::Accepted {
                    amount: Some(amount),
                    points_awarded,
                } => println!(
                    "{} {}: subtotal {}, +{} points (balance {})",
                    style("✓").green(),
                    name,
                    amount,
                    points_awarded,
                    submission.rewards.point_balance
                ),
                Outcome::Accepted { amount: None, .. } => println!(
                    "{} {}: recorded, no subtotal found",
                    style("ℹ").blue(),
                    name
                ),
                Outcome::DuplicateDetected => println!(
                    "{} {}: duplicate receipt, already recognized",
                    style("⚠").yellow(),
                    name
                ),
                Outcome::OcrFailed { reason } => println!(
                    "{} {}: error recognizing text: {}",
                    style("✗").red(),
                    name,
                    reason
                ),
            }
        }
    }

    Ok(())
}

fn explain(submission: &Submission) {
    let Some(text) = &submission.recognized_text else {
        return;
    };

    let normalized = normalize(text.as_str());
    let extractor = SubtotalExtractor::new();
    let candidates = extractor.extract_all(&normalized);

    if candidates.is_empty() {
        let reason = if has_subtotal_label(&normalized) {
            "subtotal label found, but no amount after it"
        } else {
            "no subtotal label"
        };
        eprintln!("  {} {}", style("·").dim(), reason);
        return;
    }

    let used = extractor.extract(&normalized).and_then(|m| m.position);
    for candidate in &candidates {
        let marker = if candidate.position == used { "used" } else { "ignored" };
        eprintln!(
            "  {} {} {:?} at {:?} ({})",
            style("·").dim(),
            candidate.value,
            candidate.source,
            candidate.position.unwrap_or_default(),
            marker
        );
    }
}
