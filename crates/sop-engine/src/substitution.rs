//! `{{KEY}}` placeholder substitution
//!
//! Text is scanned once, left to right. Replacement values are inserted
//! verbatim and never re-scanned, so a value that itself looks like a
//! placeholder stays as typed.

use std::borrow::Cow;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

use crate::docx::Document;
use crate::fields::{FieldKey, FieldSet};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{([A-Z][A-Z0-9_.]*)\}\}").unwrap();
}

/// Replace every known `{{KEY}}` in `text`.
///
/// A value that is blank after trimming replaces its token with nothing;
/// otherwise the untrimmed value is used. Unknown keys are left in place.
pub fn substitute(text: &str, fields: &FieldSet) -> String {
    let replaced: Cow<'_, str> = PLACEHOLDER.replace_all(text, |caps: &Captures| {
        match FieldKey::from_placeholder_key(&caps[1]) {
            Some(key) => {
                let value = fields.get(key);
                if value.trim().is_empty() {
                    String::new()
                } else {
                    value.to_string()
                }
            }
            None => caps[0].to_string(),
        }
    });
    replaced.into_owned()
}

/// True if `text` holds at least one known placeholder
pub fn contains_placeholder(text: &str) -> bool {
    PLACEHOLDER
        .captures_iter(text)
        .any(|caps| FieldKey::from_placeholder_key(&caps[1]).is_some())
}

/// Substitute inside every paragraph of `document`, including table cells.
///
/// Paragraph text is joined across runs before matching, so tokens split over
/// several runs are still found. Only paragraphs that contain a placeholder
/// are rewritten. Returns the number of rewritten paragraphs.
pub fn substitute_document(document: &mut Document, fields: &FieldSet) -> usize {
    let mut rewritten = 0;
    for paragraph in document.paragraphs_mut() {
        let text = paragraph.text();
        if contains_placeholder(&text) {
            paragraph.set_text(&substitute(&text, fields));
            rewritten += 1;
        }
    }
    debug!("Rewrote {} paragraph(s) with field values", rewritten);
    rewritten
}
