//! OCR text cleanup ahead of pattern matching.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r" {2,}").unwrap();
}

/// Clean raw OCR output so label/amount patterns survive engine noise.
///
/// Line endings become `\n`, Unicode dashes become `-`, exotic spaces and
/// tabs become a single space, lines are trimmed and blank-line runs
/// collapse. Digits, dots and letters are never touched, so the figure a
/// pattern would read is the figure the receipt shows.
pub fn normalize(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mapped: String = unified
        .chars()
        .filter_map(|c| match c {
            '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
            | '\u{2212}' | '\u{fe63}' | '\u{ff0d}' => Some('-'),
            '\t' | '\u{00a0}' | '\u{2000}'..='\u{200a}' | '\u{202f}' | '\u{205f}'
            | '\u{3000}' => Some(' '),
            '\u{200b}' | '\u{200c}' | '\u{200d}' | '\u{feff}' | '\u{00ad}' => None,
            other => Some(other),
        })
        .collect();

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = true;

    for line in mapped.split('\n') {
        let line = SPACE_RUN.replace_all(line.trim(), " ");
        if line.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(line.into_owned());
            previous_blank = false;
        }
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}
