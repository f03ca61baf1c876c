use tracing::debug;

use crate::errors::ExtractionError;
use crate::models::{ContentUnit, Document};

/// Default minimum extracted length for a unit to be worth generating from.
pub const DEFAULT_MIN_UNIT_CHARS: usize = 20;

/// Splits a source document into an ordered sequence of content units, one
/// per page (form-feed separated) or, for plain prose, one per
/// blank-line-delimited section.
///
/// Units shorter than `min_unit_chars` after trimming are skipped — a
/// filtering policy, not a failure. `index` on the surviving units keeps
/// the original page numbering for traceability. A document with zero
/// surviving units is a valid result; only an undecodable document is an
/// error, which aborts the whole pipeline before any generation starts.
pub fn produce(
    document: &Document,
    min_unit_chars: usize,
) -> Result<Vec<ContentUnit>, ExtractionError> {
    let text = std::str::from_utf8(&document.data)
        .map_err(|_| ExtractionError::InvalidEncoding(document.filename.clone()))?;

    let pages: Vec<&str> = if text.contains('\u{0c}') {
        text.split('\u{0c}').collect()
    } else {
        text.split("\n\n").collect()
    };

    let mut units = Vec::new();
    let mut skipped = 0usize;
    for (index, page) in pages.iter().enumerate() {
        let trimmed = page.trim();
        if trimmed.len() < min_unit_chars {
            skipped += 1;
            continue;
        }
        units.push(ContentUnit {
            index,
            text: trimmed.to_string(),
        });
    }

    debug!(
        filename = %document.filename,
        pages = pages.len(),
        units = units.len(),
        skipped,
        "Extracted content units from document"
    );

    Ok(units)
}
