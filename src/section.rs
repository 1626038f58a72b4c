//! Per-directory listings.
//!
//! Every published unit below the source root belongs to the section named
//! by its parent directory. A section renders as a Gemini link list, most
//! recent first:
//!
//! ```text
//!
//! => /2024/03/Third.md 2024-03-01: Third
//! Summary of the third post
//!
//! => /2024/01/Hello.md 2024-01-01: Hello
//! First post
//! ```
//!
//! The listing for `posts` lands in `<destination>/posts/index.<ext>`.

use crate::discovery::ContentUnit;
use crate::store::{Store, StoreError};
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct SectionEntry {
    pub link: String,
    pub title: String,
    pub date: DateTime<FixedOffset>,
    pub summary: String,
}

impl SectionEntry {
    pub fn render(&self) -> String {
        format!(
            "\n=> {} {}: {}\n{}\n",
            self.link,
            self.date.format("%Y-%m-%d"),
            self.title,
            self.summary
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub key: String,
    pub entries: Vec<SectionEntry>,
    /// Listing artifact path.
    pub file: PathBuf,
}

impl Section {
    pub fn new(key: impl Into<String>, file: PathBuf) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
            file,
        }
    }

    /// Most recent first. Entries with equal dates keep insertion order.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn render(&self) -> String {
        self.entries.iter().map(SectionEntry::render).collect()
    }
}

/// Link to a published unit as it appears in a listing.
pub fn entry_link(destination: &str, ext: &str, ugly_urls: bool) -> String {
    if ugly_urls {
        format!("/{destination}.{ext}")
    } else {
        format!("/{destination}")
    }
}

/// Group non-root units by parent section. Each section comes back sorted.
pub fn aggregate<'a>(
    units: impl IntoIterator<Item = &'a ContentUnit>,
    output_root: &Path,
    ext: &str,
    ugly_urls: bool,
) -> BTreeMap<String, Section> {
    let mut sections: BTreeMap<String, Section> = BTreeMap::new();

    for unit in units {
        if unit.is_root() {
            continue;
        }
        let Some(meta) = &unit.metadata else {
            continue;
        };
        let section = sections
            .entry(unit.parent_section.clone())
            .or_insert_with(|| {
                Section::new(
                    unit.parent_section.clone(),
                    output_root
                        .join(&unit.parent_section)
                        .join(format!("index.{ext}")),
                )
            });
        section.entries.push(SectionEntry {
            link: entry_link(&unit.destination, ext, ugly_urls),
            title: meta.title.clone(),
            date: meta.date,
            summary: meta.summary.clone(),
        });
    }

    for section in sections.values_mut() {
        section.sort();
    }
    sections
}

/// Replace the listing at `path` with `section`. The old file is removed
/// first so a rerun never accumulates entries; a failed removal is only
/// logged. Returns bytes written.
pub fn write(store: &dyn Store, section: &Section, path: &Path) -> Result<usize, StoreError> {
    if let Err(e) = store.remove_file(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not remove old listing");
    }
    store.write_file(path, section.render().as_bytes())
}
