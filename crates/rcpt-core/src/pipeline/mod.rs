//! Receipt processing pipeline: OCR, duplicate check, subtotal, ledger.
//!
//! One invocation walks
//! `OcrPending -> {OcrFailed | TextObtained} -> {DuplicateDetected | Recorded -> PriceParsed -> LedgerUpdated}`.
//! History and reward state are either both left as they were or both
//! advanced; nothing in here returns an error to the caller.

#[cfg(feature = "native")]
mod session;

#[cfg(feature = "native")]
pub use session::{ReceiptSession, Submission};

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::OcrError;
use crate::models::receipt::{ReceiptImage, RecognizedText, Subtotal};
use crate::models::state::{ProcessedReceiptHistory, RewardState};
use crate::ocr::TextRecognizer;
use crate::receipt::{extract_subtotal, normalize};
use crate::rewards::RewardLedger;

/// What happened to one submitted receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The OCR engine produced no text. Safe to retry.
    OcrFailed { reason: String },

    /// This exact text was processed before; nothing changed.
    DuplicateDetected,

    /// New receipt, recorded. `amount` is `None` when no subtotal was found,
    /// in which case the reward state is unchanged.
    Accepted {
        amount: Option<Subtotal>,
        points_awarded: u64,
    },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// The accepted subtotal, if any.
    pub fn amount(&self) -> Option<&Subtotal> {
        match self {
            Outcome::Accepted { amount, .. } => amount.as_ref(),
            _ => None,
        }
    }

    /// Whether the reward state moved.
    pub fn changed_rewards(&self) -> bool {
        self.amount().is_some()
    }
}

/// Result of one pipeline invocation, with the state to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Tagged outcome for the caller to branch on.
    pub outcome: Outcome,

    /// History after this invocation.
    pub history: ProcessedReceiptHistory,

    /// Reward state after this invocation.
    pub state: RewardState,

    /// Raw OCR text, when OCR succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized_text: Option<RecognizedText>,

    /// Wall-clock time spent, OCR included.
    pub processing_time_ms: u64,
}

/// Receipt pipeline over a synchronous OCR capability.
pub struct ReceiptPipeline<R> {
    recognizer: R,
}

impl<R: TextRecognizer> ReceiptPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }

    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }

    /// Process one receipt image against the given history and state.
    pub fn process(
        &self,
        image: ReceiptImage,
        history: ProcessedReceiptHistory,
        state: RewardState,
    ) -> PipelineOutput {
        let start = Instant::now();
        debug!("Recognizing receipt image ({} bytes)", image.len());

        let recognized = self.recognizer.recognize(&image);
        let mut output = apply_recognized(recognized, history, state);
        output.processing_time_ms = start.elapsed().as_millis() as u64;

        output
    }
}

/// The post-OCR half of the pipeline, for hosts that run OCR themselves.
pub fn apply_recognized(
    recognized: Result<RecognizedText, OcrError>,
    mut history: ProcessedReceiptHistory,
    mut state: RewardState,
) -> PipelineOutput {
    let recognized_text = recognized.as_ref().ok().cloned();
    let outcome = advance(recognized, &mut history, &mut state);

    PipelineOutput {
        outcome,
        history,
        state,
        recognized_text,
        processing_time_ms: 0,
    }
}

/// Drive the pipeline steps in place.
///
/// Everything is computed before `history` and `state` are written, so both
/// move together or not at all.
pub(crate) fn advance(
    recognized: Result<RecognizedText, OcrError>,
    history: &mut ProcessedReceiptHistory,
    state: &mut RewardState,
) -> Outcome {
    let text = match recognized {
        Ok(text) => text,
        Err(e) => {
            warn!("OCR failed: {}", e);
            return Outcome::OcrFailed {
                reason: e.to_string(),
            };
        }
    };

    if history.is_duplicate(&text) {
        info!("Duplicate receipt: {:?}", text.headline());
        return Outcome::DuplicateDetected;
    }

    let normalized = normalize(text.as_str());
    let ledger = RewardLedger::new();

    let (amount, next) = match extract_subtotal(&normalized) {
        Some(found) => match ledger.checked_apply(*state, &found) {
            Some(next) => (Some(found), next),
            None => {
                warn!("Subtotal {} would overflow the reward totals, ignoring it", found);
                (None, *state)
            }
        },
        None => (None, *state),
    };
    let points_awarded = amount.as_ref().map_or(0, |a| ledger.points_for(a));

    history.record(text);
    *state = next;

    match &amount {
        Some(a) => info!(
            "Accepted receipt: subtotal {}, +{} points (balance {})",
            a, points_awarded, state.point_balance
        ),
        None => info!("Accepted receipt without a recognizable subtotal"),
    }

    Outcome::Accepted {
        amount,
        points_awarded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    /// Treats the image bytes as the receipt text.
    struct EchoRecognizer;

    impl TextRecognizer for EchoRecognizer {
        fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
            String::from_utf8(image.bytes().to_vec())
                .map(RecognizedText::from)
                .map_err(|e| OcrError::InvalidImage(e.to_string()))
        }
    }

    struct FailingRecognizer;

    impl TextRecognizer for FailingRecognizer {
        fn recognize(&self, _image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
            Err(OcrError::Recognition("engine crashed".to_string()))
        }
    }

    fn receipt(text: &str) -> ReceiptImage {
        ReceiptImage::from_bytes(text.as_bytes().to_vec())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_accepts_subtotal() {
        let pipeline = ReceiptPipeline::new(EchoRecognizer);
        let output = pipeline.process(
            receipt("SUBTOTAL $12.50\nTAX $1.00"),
            ProcessedReceiptHistory::new(),
            RewardState::default(),
        );

        assert_eq!(output.outcome.amount().map(|a| a.to_string()).as_deref(), Some("12.50"));
        assert!(matches!(
            output.outcome,
            Outcome::Accepted { points_awarded: 12, .. }
        ));
        assert_eq!(output.state, RewardState::new(dec("12.50"), 12));
        assert_eq!(output.history.len(), 1);
        assert_eq!(
            output.recognized_text.as_ref().map(RecognizedText::as_str),
            Some("SUBTOTAL $12.50\nTAX $1.00")
        );
    }

    #[test]
    fn test_same_text_twice_is_duplicate() {
        let pipeline = ReceiptPipeline::new(EchoRecognizer);
        let first = pipeline.process(
            receipt("Sub-Total: 7.99"),
            ProcessedReceiptHistory::new(),
            RewardState::default(),
        );
        assert!(first.outcome.is_accepted());
        assert_eq!(first.state, RewardState::new(dec("7.99"), 7));

        let second = pipeline.process(receipt("Sub-Total: 7.99"), first.history.clone(), first.state);
        assert_eq!(second.outcome, Outcome::DuplicateDetected);
        assert_eq!(second.state, first.state);
        assert_eq!(second.history, first.history);
    }

    #[test]
    fn test_no_subtotal_still_recorded() {
        let pipeline = ReceiptPipeline::new(EchoRecognizer);
        let start = RewardState::new(dec("3.00"), 3);
        let output = pipeline.process(receipt("TOTAL 4.00"), ProcessedReceiptHistory::new(), start);

        assert_eq!(
            output.outcome,
            Outcome::Accepted {
                amount: None,
                points_awarded: 0
            }
        );
        assert!(!output.outcome.changed_rewards());
        assert_eq!(output.state, start);
        assert_eq!(output.history.len(), 1);

        // Recorded even without a price, so a rescan is still caught.
        let again = pipeline.process(receipt("TOTAL 4.00"), output.history, output.state);
        assert_eq!(again.outcome, Outcome::DuplicateDetected);
    }

    #[test]
    fn test_ocr_failure_changes_nothing() {
        let history: ProcessedReceiptHistory = vec![RecognizedText::from("old")].into_iter().collect();
        let state = RewardState::new(dec("1.00"), 1);

        let output = ReceiptPipeline::new(FailingRecognizer).process(
            receipt("SUBTOTAL 5.00"),
            history.clone(),
            state,
        );

        assert!(matches!(output.outcome, Outcome::OcrFailed { ref reason } if reason.contains("engine crashed")));
        assert_eq!(output.history, history);
        assert_eq!(output.state, state);
        assert!(output.recognized_text.is_none());
    }

    #[test]
    fn test_duplicate_uses_raw_text() {
        // Normalizes to the same string, but raw OCR output differs.
        let pipeline = ReceiptPipeline::new(EchoRecognizer);
        let first = pipeline.process(
            receipt("SUBTOTAL 2.00"),
            ProcessedReceiptHistory::new(),
            RewardState::default(),
        );
        let second = pipeline.process(receipt("SUBTOTAL  2.00\n"), first.history, first.state);

        assert!(second.outcome.is_accepted());
        assert_eq!(second.state, RewardState::new(dec("4.00"), 4));
        assert_eq!(second.history.len(), 2);
    }

    #[test]
    fn test_normalization_feeds_extraction() {
        let output = apply_recognized(
            Ok(RecognizedText::from("Sub\u{2013}total\u{00a0}: 15.25")),
            ProcessedReceiptHistory::new(),
            RewardState::default(),
        );
        assert_eq!(output.state, RewardState::new(dec("15.25"), 15));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_value(Outcome::DuplicateDetected).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "duplicate_detected" }));

        let json = serde_json::to_value(Outcome::Accepted {
            amount: Some(Subtotal::try_from(dec("7.99")).unwrap()),
            points_awarded: 7,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "status": "accepted", "amount": "7.99", "points_awarded": 7 })
        );
    }

    #[test]
    fn test_overflowing_amount_is_recorded_without_reward() {
        let start = RewardState::new(Decimal::MAX, 7);
        let output = apply_recognized(
            Ok(RecognizedText::from("SUBTOTAL 5.00")),
            ProcessedReceiptHistory::new(),
            start,
        );

        assert_eq!(
            output.outcome,
            Outcome::Accepted {
                amount: None,
                points_awarded: 0
            }
        );
        assert_eq!(output.state, start);
        assert_eq!(output.history.len(), 1);
    }
}
