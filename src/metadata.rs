//! Typed page metadata extracted from a front matter [`Document`].
//!
//! Extraction is total: every field has a default, so a missing or
//! mistyped key never rejects a page.
//!
//! | Field | Source key | Default |
//! |-------|------------|---------|
//! | `title`, `slug`, `summary` | string | `""` |
//! | `categories`, `tags` | list of strings | `[]` (non-string items become `""`) |
//! | `draft` | boolean | `false` |
//! | `date` | RFC 3339 timestamp, then `YYYY-MM-DD` | the current time |
//!
//! The date fallback keeps undated pages publishable at the cost of a
//! non-deterministic sort position in section listings.

use crate::frontmatter::{Document, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Metadata a page carries into permalink expansion and listings.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: String,
    pub slug: String,
    pub summary: String,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub date: DateTime<FixedOffset>,
    pub draft: bool,
    /// Source base name, set by the pipeline.
    pub file_path: String,
    /// Parent section, set by the pipeline.
    pub subdir: String,
    pub permalink: String,
}

impl PageMetadata {
    /// Extract metadata, falling back to the current time for the date.
    pub fn from_document(doc: &Document) -> Self {
        Self::from_document_at(doc, Utc::now().fixed_offset())
    }

    /// Extract metadata with an explicit fallback date.
    pub fn from_document_at(doc: &Document, now: DateTime<FixedOffset>) -> Self {
        Self {
            title: string_field(doc, "title"),
            slug: string_field(doc, "slug"),
            summary: string_field(doc, "summary"),
            categories: string_list_field(doc, "categories"),
            tags: string_list_field(doc, "tags"),
            date: doc
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_date)
                .unwrap_or(now),
            draft: doc.get("draft").and_then(Value::as_bool).unwrap_or(false),
            file_path: String::new(),
            subdir: String::new(),
            permalink: String::new(),
        }
    }
}

fn string_field(doc: &Document, key: &str) -> String {
    doc.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn string_list_field(doc: &Document, key: &str) -> Vec<String> {
    doc.get(key)
        .and_then(Value::as_list)
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a full RFC 3339 timestamp, then a bare calendar date (midnight UTC).
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().fixed_offset())
    })
}
