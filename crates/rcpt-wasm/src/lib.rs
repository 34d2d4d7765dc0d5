//! WASM bindings for receipt rewards.
//!
//! OCR runs in the browser (e.g. tesseract.js); this crate takes the
//! recognized text plus the persisted session and hands back the outcome and
//! the snapshot to write to `localStorage`.

use wasm_bindgen::prelude::*;

use rcpt_core::error::OcrError;
use rcpt_core::models::receipt::RecognizedText;
use rcpt_core::models::state::SessionSnapshot;
use rcpt_core::pipeline::{apply_recognized, Outcome};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Subtotal found in receipt text, as a two-decimal string.
#[wasm_bindgen]
pub fn extract_subtotal(text: &str) -> Option<String> {
    rcpt_core::extract_subtotal(&rcpt_core::normalize(text)).map(|s| s.to_string())
}

/// OCR text after whitespace and dash cleanup.
#[wasm_bindgen]
pub fn normalize_text(text: &str) -> String {
    rcpt_core::normalize(text)
}

/// Receipt session for browser use.
#[wasm_bindgen]
pub struct RewardSession {
    snapshot: SessionSnapshot,
}

#[wasm_bindgen]
impl RewardSession {
    /// Resume from a stored snapshot (JSON), or start empty.
    #[wasm_bindgen(constructor)]
    pub fn new(snapshot_json: Option<String>) -> Result<RewardSession, JsValue> {
        let snapshot = match snapshot_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => {
                SessionSnapshot::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?
            }
            _ => SessionSnapshot::default(),
        };
        Ok(Self { snapshot })
    }

    /// Process text the browser OCR produced; returns the outcome object.
    #[wasm_bindgen]
    pub fn submit_text(&mut self, text: &str) -> Result<JsValue, JsValue> {
        let outcome = self.apply(Ok(RecognizedText::from(text)));
        to_js(&outcome)
    }

    /// Record that browser OCR failed; state is left as it was.
    #[wasm_bindgen]
    pub fn report_ocr_failure(&mut self, reason: &str) -> Result<JsValue, JsValue> {
        let outcome = self.apply(Err(OcrError::Recognition(reason.to_string())));
        to_js(&outcome)
    }

    /// Whether this exact text was processed before.
    #[wasm_bindgen]
    pub fn is_duplicate(&self, text: &str) -> bool {
        self.snapshot
            .history
            .is_duplicate(&RecognizedText::from(text))
    }

    /// Snapshot to persist, as JSON.
    #[wasm_bindgen]
    pub fn snapshot(&self) -> Result<String, JsValue> {
        self.snapshot
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Loyalty point balance.
    #[wasm_bindgen]
    pub fn points(&self) -> u64 {
        self.snapshot.rewards.point_balance
    }

    /// Sum of accepted subtotals, two decimals.
    #[wasm_bindgen]
    pub fn cumulative_amount(&self) -> String {
        format!("{:.2}", self.snapshot.rewards.cumulative_amount)
    }

    /// Number of distinct receipts processed.
    #[wasm_bindgen]
    pub fn receipts_recorded(&self) -> usize {
        self.snapshot.history.len()
    }
}

impl RewardSession {
    fn apply(&mut self, recognized: Result<RecognizedText, OcrError>) -> Outcome {
        let snapshot = std::mem::take(&mut self.snapshot);
        let output = apply_recognized(recognized, snapshot.history, snapshot.rewards);

        self.snapshot = SessionSnapshot {
            history: output.history,
            rewards: output.state,
            updated_at: snapshot.updated_at,
        };
        output.outcome
    }
}

fn to_js(outcome: &Outcome) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(outcome).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RewardSession {
        RewardSession {
            snapshot: SessionSnapshot::default(),
        }
    }

    #[test]
    fn test_extract_subtotal() {
        assert_eq!(extract_subtotal("SUBTOTAL $12.50\nTAX $1.00").as_deref(), Some("12.50"));
        assert_eq!(extract_subtotal("TOTAL 3.00"), None);
    }

    #[test]
    fn test_duplicate_then_unchanged() {
        let mut session = session();
        assert!(session.apply(Ok("Sub-Total: 7.99".into())).is_accepted());
        assert_eq!(session.points(), 7);

        assert_eq!(
            session.apply(Ok("Sub-Total: 7.99".into())),
            Outcome::DuplicateDetected
        );
        assert_eq!(session.points(), 7);
        assert_eq!(session.cumulative_amount(), "7.99");
        assert!(session.is_duplicate("Sub-Total: 7.99"));
    }

    #[test]
    fn test_ocr_failure_leaves_state() {
        let mut session = session();
        session.apply(Ok("SUBTOTAL 1.00".into()));

        let outcome = session.apply(Err(OcrError::Recognition("blurry".to_string())));
        assert!(matches!(outcome, Outcome::OcrFailed { .. }));
        assert_eq!(session.receipts_recorded(), 1);
        assert_eq!(session.points(), 1);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut session = session();
        session.apply(Ok("SUBTOTAL 20.40".into()));

        let json = session.snapshot().unwrap();
        let resumed = RewardSession::new(Some(json)).unwrap();
        assert_eq!(resumed.points(), 20);
        assert_eq!(resumed.receipts_recorded(), 1);
    }
}
