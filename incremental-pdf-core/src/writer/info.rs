//! Document information dictionary

use crate::document::DocumentMetadata;
use crate::encoding::encode_text_string;
use crate::objects::{Dictionary, Object};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::collections::HashSet;
use tracing::warn;

/// Info entries and the metadata keys they are filled from, in preference order
const STANDARD_FIELDS: &[(&str, &[&str])] = &[
    ("Title", &["title"]),
    ("Author", &["author"]),
    ("Subject", &["subject", "description"]),
    ("Keywords", &["keywords"]),
    ("Creator", &["creator", "producer"]),
    ("CreationDate", &["date", "year"]),
];

lazy_static! {
    static ref KNOWN_KEYS: HashSet<&'static str> = STANDARD_FIELDS
        .iter()
        .flat_map(|(_, keys)| keys.iter().copied())
        .collect();
}

/// Build the `/Info` dictionary.
///
/// Standard entries come first, then `/Producer`, then every metadata key
/// not consumed by a standard entry, in key order.
pub(crate) fn build_info_dictionary(
    metadata: &DocumentMetadata,
    producer: &str,
    modification_date: Option<DateTime<Utc>>,
) -> Dictionary {
    let mut info = Dictionary::new();

    for (entry, keys) in STANDARD_FIELDS {
        if let Some(value) = keys.iter().find_map(|key| metadata.get(key)) {
            info.set(*entry, encode_text_string(value));
        }
    }

    let producer = if producer.is_ascii() {
        Object::String(producer.as_bytes().to_vec())
    } else {
        encode_text_string(producer.as_bytes())
    };
    info.set("Producer", producer);

    if let Some(date) = modification_date {
        info.set("ModDate", Object::String(format_pdf_date(date).into_bytes()));
    }

    for (key, value) in metadata.iter() {
        if KNOWN_KEYS.contains(key) {
            continue;
        }
        if info.contains_key(key) {
            warn!(key, "metadata key collides with a standard info entry, skipped");
            continue;
        }
        info.set(key, encode_text_string(value));
    }

    info
}

/// Format a DateTime as a PDF date string (D:YYYYMMDDHHmmSSOHH'mm)
pub(crate) fn format_pdf_date(date: DateTime<Utc>) -> String {
    let formatted = date.format("D:%Y%m%d%H%M%S");
    format!("{formatted}+00'00")
}
