//! Subtotal extraction for receipts.

use super::patterns::{SUBTOTAL_LABEL, SUBTOTAL_PATTERN};
use super::{ExtractionMatch, FieldExtractor};
use crate::models::receipt::Subtotal;

/// Subtotal field extractor.
///
/// The first labelled figure in the text wins; later labels are reported by
/// [`FieldExtractor::extract_all`] but never override it.
pub struct SubtotalExtractor;

impl SubtotalExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SubtotalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for SubtotalExtractor {
    type Output = ExtractionMatch<Subtotal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        // Only the first labelled figure counts, even when it is unusable.
        candidate(&SUBTOTAL_PATTERN.captures(text)?)
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        SUBTOTAL_PATTERN
            .captures_iter(text)
            .filter_map(|caps| candidate(&caps))
            .collect()
    }
}

fn candidate(caps: &regex::Captures<'_>) -> Option<ExtractionMatch<Subtotal>> {
    let full_match = caps.get(0)?;
    let amount = Subtotal::parse(caps.get(1)?.as_str())?;

    Some(
        ExtractionMatch::new(amount, full_match.as_str())
            .with_position(full_match.start(), full_match.end()),
    )
}

/// Extract the receipt subtotal, or `None` when the text has no labelled figure.
pub fn extract_subtotal(text: &str) -> Option<Subtotal> {
    SubtotalExtractor::new().extract(text).map(|m| m.value)
}

/// Whether the text carries a subtotal label at all, figure or not.
pub fn has_subtotal_label(text: &str) -> bool {
    SUBTOTAL_LABEL.is_match(text)
}
