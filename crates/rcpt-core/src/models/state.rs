//! Session state the host loads at startup and stores after every receipt.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::receipt::RecognizedText;

/// Cumulative spend and loyalty points.
///
/// `point_balance` is always the sum of the whole-unit part of every accepted
/// subtotal, `cumulative_amount` the sum of the subtotals themselves. Only
/// [`RewardLedger`](crate::rewards::RewardLedger) produces new values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "StoredRewardState")]
pub struct RewardState {
    /// Sum of accepted subtotals.
    pub cumulative_amount: Decimal,
    /// Loyalty points earned.
    pub point_balance: u64,
}

impl RewardState {
    pub fn new(cumulative_amount: Decimal, point_balance: u64) -> Self {
        Self {
            cumulative_amount,
            point_balance,
        }
    }
}

/// Wire form of [`RewardState`], checked before it becomes one.
#[derive(Default, Deserialize)]
#[serde(default)]
struct StoredRewardState {
    cumulative_amount: Decimal,
    point_balance: u64,
}

impl TryFrom<StoredRewardState> for RewardState {
    type Error = &'static str;

    fn try_from(stored: StoredRewardState) -> Result<Self, Self::Error> {
        if stored.cumulative_amount.is_sign_negative() && !stored.cumulative_amount.is_zero() {
            return Err("cumulative_amount cannot be negative");
        }
        Ok(Self::new(stored.cumulative_amount, stored.point_balance))
    }
}

/// Every recognized text processed so far, in processing order.
///
/// Membership is exact string identity on the raw OCR output: two texts that
/// differ only in whitespace are different receipts. Serialized as a plain
/// JSON array; repeated entries in stored data keep their first position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RecognizedText>", into = "Vec<RecognizedText>")]
pub struct ProcessedReceiptHistory {
    entries: Vec<RecognizedText>,
    seen: HashSet<RecognizedText>,
}

impl ProcessedReceiptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this exact text has been processed before.
    pub fn is_duplicate(&self, text: &RecognizedText) -> bool {
        self.seen.contains(text)
    }

    /// Append `text` unless already present. Returns `true` if it was new.
    pub fn record(&mut self, text: RecognizedText) -> bool {
        if self.seen.contains(&text) {
            return false;
        }
        self.seen.insert(text.clone());
        self.entries.push(text);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecognizedText> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&RecognizedText> {
        self.entries.last()
    }
}

impl PartialEq for ProcessedReceiptHistory {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for ProcessedReceiptHistory {}

impl From<Vec<RecognizedText>> for ProcessedReceiptHistory {
    fn from(texts: Vec<RecognizedText>) -> Self {
        let mut history = Self::new();
        for text in texts {
            history.record(text);
        }
        history
    }
}

impl From<ProcessedReceiptHistory> for Vec<RecognizedText> {
    fn from(history: ProcessedReceiptHistory) -> Self {
        history.entries
    }
}

impl FromIterator<RecognizedText> for ProcessedReceiptHistory {
    fn from_iter<I: IntoIterator<Item = RecognizedText>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

/// Everything that has to survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSnapshot {
    /// Recognized texts already processed.
    pub history: ProcessedReceiptHistory,

    /// Spend total and point balance.
    pub rewards: RewardState,

    /// When the host last wrote this snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl SessionSnapshot {
    pub fn new(history: ProcessedReceiptHistory, rewards: RewardState) -> Self {
        Self {
            history,
            rewards,
            updated_at: None,
        }
    }

    /// Parse a stored snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize for storage.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
