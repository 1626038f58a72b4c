//! Shared test utilities for the pagepipe test suite.
//!
//! Provides fixture setup, a one-call pipeline run against an in-memory
//! store, and listing inspection helpers.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let (store, summary) = publish(&fixture_options(tmp.path(), true));
//!
//! assert_eq!(summary.written, 6);
//! assert_eq!(
//!     listing_links(&store, "/out/posts/index.md"),
//!     vec!["/2024/03/Third.md", "/2024/02/Second%20Post.md", "/2024/01/Hello.md"]
//! );
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::permalink::{DEFAULT_PATTERN, PermalinkEngine, Permalinks};
use crate::pipeline::{self, PipelineOptions, RunSummary};
use crate::store::tests::MemoryStore;
use crate::transform::Passthrough;

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/content/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/content");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Options matching `fixtures/config.toml`, writing under `/out`.
pub fn fixture_options(source: &Path, ugly_urls: bool) -> PipelineOptions {
    let sections = [("notes".to_string(), "/notes/:slug/".to_string())]
        .into_iter()
        .collect();
    PipelineOptions {
        source: source.to_path_buf(),
        destination: PathBuf::from("/out"),
        ugly_urls,
        permalinks: Permalinks::new(sections, DEFAULT_PATTERN),
        jobs: Some(2),
        ..PipelineOptions::default()
    }
}

/// Run the pipeline with a passthrough transform into a fresh memory store.
pub fn publish(options: &PipelineOptions) -> (MemoryStore, RunSummary) {
    let store = MemoryStore::new();
    let summary = pipeline::run(options, &PermalinkEngine::default(), &Passthrough, &store, None)
        .unwrap_or_else(|e| panic!("pipeline failed: {e}"));
    (store, summary)
}

// =========================================================================
// Listing inspection: panics with a clear message on miss
// =========================================================================

/// Links of a written listing, in rendered order.
pub fn listing_links(store: &MemoryStore, path: &str) -> Vec<String> {
    let text = store.text(path).unwrap_or_else(|| {
        let paths: Vec<PathBuf> = store.paths();
        panic!("listing '{path}' not written. Written: {paths:?}")
    });
    text.lines()
        .filter_map(|line| line.strip_prefix("=> "))
        .filter_map(|rest| rest.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

/// Assert that every path in `expected` was written.
pub fn assert_written(store: &MemoryStore, expected: &[&str]) {
    let written = store.paths();
    for path in expected {
        assert!(
            written.iter().any(|p| p == Path::new(path)),
            "expected '{path}' to be written. Written: {written:?}"
        );
    }
}
