//! Core library for receipt OCR rewards.
//!
//! This crate provides:
//! - OCR seam with a pure Rust PaddleOCR engine (`native` feature)
//! - Receipt text cleanup and subtotal extraction
//! - Duplicate receipt detection over the processed history
//! - Loyalty point accrual (one point per whole currency unit)
//! - The pipeline tying them together, plus a serialized async session

pub mod error;
pub mod models;
pub mod ocr;
pub mod pipeline;
pub mod receipt;
pub mod rewards;

pub use error::{OcrError, RcptError, Result};
pub use models::config::RcptConfig;
pub use models::receipt::{ReceiptImage, RecognizedText, Subtotal};
pub use models::state::{ProcessedReceiptHistory, RewardState, SessionSnapshot};
pub use ocr::{TextBox, TextRecognizer};
pub use pipeline::{apply_recognized, Outcome, PipelineOutput, ReceiptPipeline};
pub use receipt::{extract_subtotal, normalize};
pub use rewards::RewardLedger;

#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
#[cfg(feature = "native")]
pub use pipeline::{ReceiptSession, Submission};
