//! Data models shared by the pipeline and its hosts.

pub mod config;
pub mod receipt;
pub mod state;

pub use config::{ModelConfig, OcrConfig, RcptConfig, StorageConfig};
pub use receipt::{ReceiptImage, RecognizedText, Subtotal};
pub use state::{ProcessedReceiptHistory, RewardState, SessionSnapshot};
