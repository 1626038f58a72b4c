//! Source tree discovery.
//!
//! Walks the source root and emits one [`ContentUnit`] per regular file on a
//! channel. The walk runs on its own thread; the consumer pulls units as
//! they arrive and sees end-of-discovery when the channel closes.
//!
//! ```text
//! content/
//! ├── _index.md                parent "."      base "_index"
//! ├── about.md                 parent "."      base "about"
//! └── posts/
//!     └── 2024-01-01-hello.md  parent "posts"  base "2024-01-01-hello"
//! ```
//!
//! Walk order is whatever the filesystem yields; nothing downstream depends
//! on it. With a bounded channel a slow consumer blocks the walker, units
//! are never dropped.

use crate::metadata::PageMetadata;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use walkdir::WalkDir;

/// Parent section of files directly under the source root.
pub const ROOT_SECTION: &str = ".";

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("walking {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("discovery thread panicked")]
    Panicked,
}

/// One source file on its way through the pipeline.
///
/// Discovery fills the path fields and the raw file content; the pipeline
/// replaces `raw_body` with the text after the front matter and fills the
/// rest.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub root: PathBuf,
    pub source_path: PathBuf,
    /// Canonical destination, relative to the output root, no leading or
    /// trailing `/`.
    pub destination: String,
    /// Relative parent directory with `/` separators, [`ROOT_SECTION`] at
    /// the root.
    pub parent_section: String,
    /// File name up to the last `.`.
    pub base_name: String,
    /// File name after the last `.`, without the dot.
    pub extension: String,
    pub is_draft: bool,
    pub metadata: Option<PageMetadata>,
    pub raw_body: Vec<u8>,
    pub transformed_body: Vec<u8>,
}

impl ContentUnit {
    /// Describe a file found under `root`. Content is not read.
    pub fn new(root: &Path, source_path: &Path) -> Self {
        let rel = source_path.strip_prefix(root).unwrap_or(source_path);
        let file_name = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (base_name, extension) = split_extension(&file_name);
        let parent_section = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ROOT_SECTION.to_string());

        Self {
            root: root.to_path_buf(),
            source_path: source_path.to_path_buf(),
            destination: String::new(),
            parent_section,
            base_name: base_name.to_string(),
            extension: extension.to_string(),
            is_draft: false,
            metadata: None,
            raw_body: Vec::new(),
            transformed_body: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_section == ROOT_SECTION
    }
}

/// Split on the last `.`; a name without one has an empty extension.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(dot) => (&file_name[..dot], &file_name[dot + 1..]),
        None => (file_name, ""),
    }
}

/// Walk `root`, sending one unit per regular file. Returns the number of
/// units sent. The sender is dropped on return, closing the channel.
pub fn discover(root: &Path, tx: SyncSender<ContentUnit>) -> Result<usize, DiscoveryError> {
    let mut sent = 0;
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let mut unit = ContentUnit::new(root, entry.path());
        unit.raw_body = std::fs::read(entry.path()).map_err(|source| DiscoveryError::Read {
            path: entry.path().to_path_buf(),
            source,
        })?;
        tracing::debug!(source = %entry.path().display(), section = %unit.parent_section, "discovered");

        if tx.send(unit).is_err() {
            // Consumer hung up; nothing left to do.
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

/// Run [`discover`] on a background thread feeding a channel of `capacity`.
pub fn spawn(
    root: &Path,
    capacity: usize,
) -> (Receiver<ContentUnit>, JoinHandle<Result<usize, DiscoveryError>>) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    let root = root.to_path_buf();
    let handle = thread::spawn(move || discover(&root, tx));
    (rx, handle)
}
