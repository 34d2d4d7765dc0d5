//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RcptError, Result};

/// Main configuration for rcpt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// Where session state is stored.
    pub storage: StorageConfig,

    /// Model download configuration.
    pub models: ModelConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Directory containing model files (default: the user data dir).
    pub model_dir: Option<PathBuf>,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,

    /// Maximum image dimension (longer side) for processing.
    pub max_image_size: u32,

    /// Keep `[UNK]` tokens from the recognizer instead of blanking them.
    pub keep_unk: bool,

    /// Give up on a single recognition after this many milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
            max_image_size: 2048,
            keep_unk: false,
            timeout_ms: None,
        }
    }
}

/// Session state storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// State file path (default: `<data dir>/rcpt/state.json`).
    pub state_file: Option<PathBuf>,
}

/// OCR model downloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL the model files are fetched from.
    pub base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://github.com/jakubmatias/incr/raw/main/models/mobile".to_string(),
        }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.ocr.max_image_size < 32 {
            return Err(RcptError::Config(format!(
                "ocr.max_image_size must be at least 32, got {}",
                self.ocr.max_image_size
            )));
        }
        if self.ocr.timeout_ms == Some(0) {
            return Err(RcptError::Config(
                "ocr.timeout_ms must be positive; omit it to disable the timeout".to_string(),
            ));
        }
        Ok(())
    }
}

impl OcrConfig {
    /// Paths of the detection model, recognition model and dictionary in `dir`.
    pub fn model_files(&self, dir: &std::path::Path) -> [PathBuf; 3] {
        [
            dir.join(&self.detection_model),
            dir.join(&self.recognition_model),
            dir.join(&self.dictionary),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: RcptConfig = serde_json::from_str(r#"{"ocr":{"timeout_ms":5000}}"#).unwrap();
        assert_eq!(config.ocr.timeout_ms, Some(5000));
        assert_eq!(config.ocr.max_image_size, 2048);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let mut config = RcptConfig::default();
        config.ocr.timeout_ms = Some(0);
        assert!(matches!(config.validate(), Err(RcptError::Config(_))));
    }

    #[test]
    fn test_default_models_come_from_hosted_mobile_set() {
        let config = RcptConfig::default();
        assert_eq!(
            config.models.base_url,
            "https://github.com/jakubmatias/incr/raw/main/models/mobile"
        );
        let names: Vec<String> = config
            .ocr
            .model_files(std::path::Path::new(""))
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(names, vec!["det.onnx", "latin_rec.onnx", "latin_dict.txt"]);
    }
}
