//! On-disk session state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use rcpt_core::models::config::RcptConfig;
use rcpt_core::models::state::SessionSnapshot;

/// Base directory for rcpt data (state, models).
pub fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
}

/// Where OCR models live unless configured otherwise.
pub fn default_model_dir() -> PathBuf {
    data_dir().join("models")
}

/// JSON file holding the processed-receipt history and reward state.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the configured state file, or `<data dir>/rcpt/state.json`.
    pub fn from_config(config: &RcptConfig) -> Self {
        let path = config
            .storage
            .state_file
            .clone()
            .unwrap_or_else(|| data_dir().join("state.json"));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored snapshot; a missing file is a fresh session.
    pub fn load(&self) -> anyhow::Result<SessionSnapshot> {
        if !self.path.exists() {
            debug!("No state at {}, starting fresh", self.path.display());
            return Ok(SessionSnapshot::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file {}", self.path.display()))?;
        SessionSnapshot::from_json(&content)
            .with_context(|| format!("corrupt state file {}", self.path.display()))
    }

    /// Write the snapshot, replacing the previous file atomically.
    pub fn save(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut stamped = snapshot.clone();
        stamped.updated_at = Some(chrono::Utc::now());

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, stamped.to_json()?)?;
        fs::rename(&temp_path, &self.path)?;

        debug!(
            "Saved state ({} receipts, {} points) to {}",
            stamped.history.len(),
            stamped.rewards.point_balance,
            self.path.display()
        );

        Ok(())
    }
}
