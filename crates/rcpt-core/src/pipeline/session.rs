//! Serialized, async front for the pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::OcrError;
use crate::models::receipt::{ReceiptImage, RecognizedText};
use crate::models::state::{RewardState, SessionSnapshot};
use crate::ocr::TextRecognizer;

use super::{advance, Outcome};

/// What a session submission reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub outcome: Outcome,
    /// Reward state after this submission.
    pub rewards: RewardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized_text: Option<RecognizedText>,
    pub processing_time_ms: u64,
}

/// One user's receipt session.
///
/// Submissions are serialized: the state lock is held from the OCR call to
/// the ledger update, so two receipts never interleave their writes. OCR
/// runs on a blocking thread and may be bounded by a timeout, which counts
/// as [`Outcome::OcrFailed`]. A timed-out OCR task is abandoned, not
/// cancelled: it runs to completion in the background after the lock is
/// released, and its result is discarded.
pub struct ReceiptSession<R> {
    recognizer: Arc<R>,
    state: Mutex<SessionSnapshot>,
    timeout: Option<Duration>,
}

impl<R: TextRecognizer + 'static> ReceiptSession<R> {
    pub fn new(recognizer: R, snapshot: SessionSnapshot) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            state: Mutex::new(snapshot),
            timeout: None,
        }
    }

    /// Bound each OCR call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run one receipt image through the pipeline.
    pub async fn submit(&self, image: ReceiptImage) -> Submission {
        let mut snapshot = self.state.lock().await;
        let start = Instant::now();

        let recognized = self.recognize(image).await;
        self.finish(&mut snapshot, recognized, start)
    }

    /// Run text that was recognized elsewhere through the pipeline.
    pub async fn submit_text(&self, text: RecognizedText) -> Submission {
        let mut snapshot = self.state.lock().await;
        let start = Instant::now();

        self.finish(&mut snapshot, Ok(text), start)
    }

    /// A copy of the current state, for persistence.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.clone()
    }

    pub async fn rewards(&self) -> RewardState {
        self.state.lock().await.rewards
    }

    pub fn into_snapshot(self) -> SessionSnapshot {
        self.state.into_inner()
    }

    fn finish(
        &self,
        snapshot: &mut SessionSnapshot,
        recognized: Result<RecognizedText, OcrError>,
        start: Instant,
    ) -> Submission {
        let recognized_text = recognized.as_ref().ok().cloned();
        let outcome = advance(recognized, &mut snapshot.history, &mut snapshot.rewards);

        Submission {
            outcome,
            rewards: snapshot.rewards,
            recognized_text,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn recognize(&self, image: ReceiptImage) -> Result<RecognizedText, OcrError> {
        let recognizer = Arc::clone(&self.recognizer);
        let task = tokio::task::spawn_blocking(move || recognizer.recognize(&image));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("OCR gave no answer within {:?}", limit);
                    return Err(OcrError::Timeout(limit.as_millis() as u64));
                }
            },
            None => task.await,
        };

        debug!("OCR task finished");
        joined.map_err(|e| OcrError::Recognition(format!("OCR task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads the image bytes as text after a delay, tracking overlap.
    struct SlowRecognizer {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl SlowRecognizer {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    impl TextRecognizer for SlowRecognizer {
        fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            String::from_utf8(image.bytes().to_vec())
                .map(RecognizedText::from)
                .map_err(|e| OcrError::InvalidImage(e.to_string()))
        }
    }

    struct PanickingRecognizer;

    impl TextRecognizer for PanickingRecognizer {
        fn recognize(&self, _image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
            panic!("engine blew up");
        }
    }

    fn receipt(text: &str) -> ReceiptImage {
        ReceiptImage::from_bytes(text.as_bytes().to_vec())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_are_serialized() {
        let session = Arc::new(ReceiptSession::new(
            SlowRecognizer::new(Duration::from_millis(20)),
            SessionSnapshot::default(),
        ));

        let texts = ["SUBTOTAL 1.50", "SUBTOTAL 2.50", "SUBTOTAL 3.50", "SUBTOTAL 1.50"];
        let handles: Vec<_> = texts
            .iter()
            .map(|text| {
                let session = Arc::clone(&session);
                let image = receipt(text);
                tokio::spawn(async move { session.submit(image).await })
            })
            .collect();

        let mut duplicates = 0;
        for handle in handles {
            if handle.await.unwrap().outcome == Outcome::DuplicateDetected {
                duplicates += 1;
            }
        }

        assert_eq!(duplicates, 1);
        assert_eq!(session.recognizer.max_in_flight.load(Ordering::SeqCst), 1);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.history.len(), 3);
        assert_eq!(snapshot.rewards, RewardState::new(dec("7.50"), 6));
    }

    #[tokio::test]
    async fn test_timeout_is_ocr_failure() {
        let start = SessionSnapshot::new(Default::default(), RewardState::new(dec("2.00"), 2));
        let session = ReceiptSession::new(SlowRecognizer::new(Duration::from_millis(300)), start.clone())
            .with_timeout(Some(Duration::from_millis(10)));

        let submission = session.submit(receipt("SUBTOTAL 9.00")).await;

        assert!(matches!(submission.outcome, Outcome::OcrFailed { .. }));
        assert_eq!(submission.rewards, start.rewards);
        assert_eq!(session.snapshot().await, start);
    }

    #[tokio::test]
    async fn test_panicking_engine_is_ocr_failure() {
        let session = ReceiptSession::new(PanickingRecognizer, SessionSnapshot::default());
        let submission = session.submit(receipt("SUBTOTAL 9.00")).await;

        assert!(matches!(submission.outcome, Outcome::OcrFailed { .. }));
        assert_eq!(session.into_snapshot(), SessionSnapshot::default());
    }

    #[tokio::test]
    async fn test_submit_text_skips_ocr() {
        let session = ReceiptSession::new(PanickingRecognizer, SessionSnapshot::default());

        let first = session.submit_text("Sub-Total: 7.99".into()).await;
        assert_eq!(first.rewards, RewardState::new(dec("7.99"), 7));

        let second = session.submit_text("Sub-Total: 7.99".into()).await;
        assert_eq!(second.outcome, Outcome::DuplicateDetected);
        assert_eq!(session.rewards().await, RewardState::new(dec("7.99"), 7));
    }

    #[tokio::test]
    async fn test_oversized_subtotals_never_split_history_from_rewards() {
        let session = ReceiptSession::new(PanickingRecognizer, SessionSnapshot::default());

        for i in 0..10 {
            let text = format!("STORE {}\nSUBTOTAL 9999999999999999999.00", i);
            session.submit_text(text.into()).await;
        }
        let huge = session
            .submit_text("SUBTOTAL 9999999999999999999999999999.00".into())
            .await;

        assert_eq!(
            huge.outcome,
            Outcome::Accepted {
                amount: None,
                points_awarded: 0
            }
        );

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.history.len(), 11);
        assert_eq!(
            snapshot.rewards,
            RewardState::new(dec("9999999999999999999.00"), 9_999_999_999_999_999_999)
        );
    }
}
