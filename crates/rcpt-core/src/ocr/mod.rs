//! OCR seam: anything that turns a receipt image into text.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::OcrError;
use crate::models::receipt::{ReceiptImage, RecognizedText};

/// An OCR capability.
///
/// Implementations may block; the async session runs them on a blocking
/// thread. Any engine producing line-broken text satisfies the contract.
pub trait TextRecognizer: Send + Sync {
    /// Recognize the text printed on `image`.
    fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError>;
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for Arc<R> {
    fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
        (**self).recognize(image)
    }
}

impl<R: TextRecognizer + ?Sized> TextRecognizer for Box<R> {
    fn recognize(&self, image: &ReceiptImage) -> Result<RecognizedText, OcrError> {
        (**self).recognize(image)
    }
}

/// A detected text line with its coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Bounding box coordinates (x1, y1, x2, y2, x3, y3, x4, y4) for quadrilateral.
    pub bbox: [f32; 8],

    /// Recognized text content.
    pub text: String,

    /// Recognition confidence score (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Get the axis-aligned bounding rectangle.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }
}

/// Sort boxes top-to-bottom, left-to-right and join them into receipt text.
///
/// Boxes whose tops fall in the same 20px band share a line and are joined
/// with a space, so a label and its figure stay on one line.
pub fn join_in_reading_order(mut boxes: Vec<TextBox>) -> String {
    let row = |b: &TextBox| (b.rect().1 / 20.0) as i32;

    boxes.sort_by(|a, b| {
        row(a).cmp(&row(b)).then_with(|| {
            a.rect()
                .0
                .partial_cmp(&b.rect().0)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let mut lines: Vec<String> = Vec::new();
    let mut current_row = None;

    for text_box in &boxes {
        let text = text_box.text.trim();
        if text.is_empty() {
            continue;
        }
        let r = row(text_box);
        match lines.last_mut() {
            Some(line) if current_row == Some(r) => {
                line.push(' ');
                line.push_str(text);
            }
            _ => lines.push(text.to_string()),
        }
        current_row = Some(r);
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_box(text: &str, x: f32, y: f32) -> TextBox {
        TextBox {
            bbox: [x, y, x + 50.0, y, x + 50.0, y + 10.0, x, y + 10.0],
            text: text.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn test_reading_order() {
        let boxes = vec![
            text_box("$1.00", 200.0, 45.0),
            text_box("$12.50", 200.0, 5.0),
            text_box("SUBTOTAL", 10.0, 3.0),
            text_box("TAX", 10.0, 42.0),
            text_box("  ", 10.0, 80.0),
        ];

        assert_eq!(join_in_reading_order(boxes), "SUBTOTAL $12.50\nTAX $1.00");
    }

    #[test]
    fn test_no_boxes() {
        assert_eq!(join_in_reading_order(Vec::new()), "");
    }
}
