//! Receipt text handling: cleanup and field extraction.

mod normalizer;
pub mod rules;

pub use normalizer::normalize;
pub use rules::{
    extract_subtotal, has_subtotal_label, ExtractionMatch, FieldExtractor, SubtotalExtractor,
};
