//! Error types for the rcpt-core library.

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a config or state file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while turning a receipt image into text.
///
/// None of these escape the pipeline: they are folded into
/// [`Outcome::OcrFailed`](crate::pipeline::Outcome::OcrFailed).
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The engine ran but could not produce text.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The payload was not a usable `data:` URI.
    #[error("invalid data URI: {0}")]
    DataUri(String),

    /// The recognizer did not answer in time.
    #[error("recognition timed out after {0}ms")]
    Timeout(u64),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;
