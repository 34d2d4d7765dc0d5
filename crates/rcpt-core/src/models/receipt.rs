//! Receipt payload and text models.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use base64::prelude::*;
use image::DynamicImage;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// One photographed or scanned receipt, still encoded (PNG, JPEG, ...).
///
/// The pipeline takes this by value and never hands it back; keeping a
/// gallery of raw images is the caller's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptImage {
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

impl ReceiptImage {
    /// Wrap raw encoded bytes.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: None,
        }
    }

    /// Read an image file from disk.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let mime_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| mime_for_extension(&ext.to_lowercase()))
            .map(str::to_string);

        Ok(Self { bytes, mime_type })
    }

    /// Parse a `data:<mime>;base64,<payload>` URI, as produced by a browser
    /// `FileReader.readAsDataURL`.
    pub fn from_data_uri(uri: &str) -> Result<Self, OcrError> {
        let uri = uri.trim();
        let rest = uri
            .get(..5)
            .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
            .map(|_| &uri[5..])
            .ok_or_else(|| OcrError::DataUri("missing `data:` scheme".to_string()))?;

        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| OcrError::DataUri("missing `,` separator".to_string()))?;

        let mut params = header.split(';');
        let mime_type = params
            .next()
            .filter(|m| !m.is_empty())
            .map(|m| m.to_ascii_lowercase());

        if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
            return Err(OcrError::DataUri(
                "only base64-encoded payloads are supported".to_string(),
            ));
        }

        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64_STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| OcrError::DataUri(format!("invalid base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(OcrError::DataUri("empty payload".to_string()));
        }

        Ok(Self { bytes, mime_type })
    }

    /// Encoded image bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type, when the source declared one.
    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode into pixels for an OCR engine.
    pub fn decode(&self) -> Result<DynamicImage, OcrError> {
        if self.bytes.is_empty() {
            return Err(OcrError::InvalidImage("empty image payload".to_string()));
        }
        image::load_from_memory(&self.bytes).map_err(|e| OcrError::InvalidImage(e.to_string()))
    }
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Verbatim OCR output for one receipt image.
///
/// Equality is exact string identity; this is what duplicate detection keys on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecognizedText(String);

impl RecognizedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// First non-blank line, handy for listings.
    pub fn headline(&self) -> &str {
        self.0
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
    }
}

impl From<String> for RecognizedText {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RecognizedText {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl AsRef<str> for RecognizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecognizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A receipt subtotal: non-negative, exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Subtotal(Decimal);

impl Subtotal {
    /// Parse a `<digits>.<digits>` token matched by the extractor.
    pub(crate) fn parse(token: &str) -> Option<Self> {
        Decimal::from_str(token).ok().and_then(|d| Self::try_from(d).ok())
    }

    /// The amount as a decimal with scale 2.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Whole currency units, fraction truncated.
    pub fn whole_units(&self) -> u64 {
        // `try_from` keeps the whole part within u64.
        self.0.trunc().to_u64().unwrap_or_default()
    }
}

impl TryFrom<Decimal> for Subtotal {
    type Error = &'static str;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err("subtotal cannot be negative");
        }
        if value.trunc().to_u64().is_none() {
            return Err("subtotal is too large to earn points");
        }
        let mut value = value.round_dp(2);
        value.rescale(2);
        Ok(Self(value))
    }
}

impl From<Subtotal> for Decimal {
    fn from(subtotal: Subtotal) -> Self {
        subtotal.0
    }
}

impl fmt::Display for Subtotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_data_uri_decodes_base64_payload() {
        let image = ReceiptImage::from_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.bytes(), b"hello");
        assert_eq!(image.mime_type(), Some("image/png"));
    }

    #[test]
    fn test_data_uri_rejects_plain_payload() {
        assert!(matches!(
            ReceiptImage::from_data_uri("data:text/plain,hello"),
            Err(OcrError::DataUri(_))
        ));
        assert!(matches!(
            ReceiptImage::from_data_uri("http://example.com/receipt.png"),
            Err(OcrError::DataUri(_))
        ));
        assert!(matches!(
            ReceiptImage::from_data_uri("data:image/png;base64,"),
            Err(OcrError::DataUri(_))
        ));
    }

    #[test]
    fn test_decode_garbage_is_invalid_image() {
        let image = ReceiptImage::from_bytes(b"not an image".to_vec());
        assert!(matches!(image.decode(), Err(OcrError::InvalidImage(_))));
    }

    #[test]
    fn test_subtotal_keeps_two_decimals() {
        let subtotal = Subtotal::parse("12.50").unwrap();
        assert_eq!(subtotal.to_string(), "12.50");
        assert_eq!(subtotal.whole_units(), 12);

        let whole = Subtotal::try_from(Decimal::from(3)).unwrap();
        assert_eq!(whole.to_string(), "3.00");
    }

    #[test]
    fn test_subtotal_whole_part_must_fit_points() {
        let largest = Subtotal::parse("18446744073709551615.99").unwrap();
        assert_eq!(largest.whole_units(), u64::MAX);

        assert_eq!(Subtotal::parse("18446744073709551616.00"), None);
        assert_eq!(Subtotal::parse("9999999999999999999999999999.00"), None);
    }

    #[test]
    fn test_subtotal_rejects_negative() {
        assert!(Subtotal::try_from(Decimal::from(-1)).is_err());
        assert!(serde_json::from_str::<Subtotal>("\"-4.00\"").is_err());
    }

    #[test]
    fn test_headline_skips_blank_lines() {
        let text = RecognizedText::from("\n   \n  CORNER SHOP \nSUBTOTAL 1.00");
        assert_eq!(text.headline(), "CORNER SHOP");
    }
}
