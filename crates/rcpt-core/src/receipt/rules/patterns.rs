//! Regex patterns for receipt field extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // "subtotal" / "sub-total", any case, then the nearest <digits>.<2 digits>.
    // Anything but a digit may sit in between, line breaks included.
    pub static ref SUBTOTAL_PATTERN: Regex = Regex::new(
        r"(?i)sub-?total[^0-9]*?([0-9]+\.[0-9]{2})"
    ).unwrap();

    // Bare label, for telling "no label" apart from "label without a figure".
    pub static ref SUBTOTAL_LABEL: Regex = Regex::new(
        r"(?i)sub-?total"
    ).unwrap();
}
