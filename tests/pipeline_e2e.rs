//! End-to-end runs against a real output directory.
//!
//! Each test copies `fixtures/content/` to a temp dir, loads
//! `fixtures/config.toml` the way the binary does, and publishes into a
//! second temp dir through the filesystem store.

use pagepipe::config;
use pagepipe::permalink::PermalinkEngine;
use pagepipe::pipeline::{self, PipelineError, PipelineOptions, RunSummary};
use pagepipe::store::FsStore;
use pagepipe::transform::{Passthrough, Transform, TransformError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn copy_dir(src: &Path, dst: &Path) {
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dst.join(entry.file_name());
        if entry.path().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

struct Site {
    source: TempDir,
    output: TempDir,
}

impl Site {
    fn new() -> Self {
        let source = TempDir::new().unwrap();
        copy_dir(&fixtures().join("content"), source.path());
        Self {
            source,
            output: TempDir::new().unwrap(),
        }
    }

    fn empty() -> Self {
        Self {
            source: TempDir::new().unwrap(),
            output: TempDir::new().unwrap(),
        }
    }

    fn add(&self, rel: &str, content: &str) {
        let path = self.source.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Options as the binary builds them from `fixtures/config.toml`.
    fn options(&self) -> PipelineOptions {
        let cfg = config::load_config(&fixtures().join("config.toml")).unwrap();
        PipelineOptions {
            source: self.source.path().to_path_buf(),
            destination: self.output.path().to_path_buf(),
            ugly_urls: cfg.get_bool("uglyURLs"),
            build_drafts: cfg.get_bool("buildDrafts"),
            permalinks: cfg.permalinks(),
            ..PipelineOptions::default()
        }
    }

    fn publish(&self, options: &PipelineOptions, transform: &dyn Transform) -> RunSummary {
        pipeline::run(options, &PermalinkEngine::default(), transform, &FsStore, None).unwrap()
    }

    fn read(&self, rel: &str) -> String {
        let path = self.output.path().join(rel);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
    }

    fn exists(&self, rel: &str) -> bool {
        self.output.path().join(rel).exists()
    }
}

/// Wraps every body in a marker so tests can see the processor ran.
struct Bracket;

impl Transform for Bracket {
    fn transform(&self, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut out = b"[[".to_vec();
        out.extend_from_slice(input);
        out.extend_from_slice(b"]]");
        Ok(out)
    }
}

// =========================================================================
// The canonical example
// =========================================================================

#[test]
fn hello_post_ugly_urls() {
    let site = Site::empty();
    site.add(
        "posts/2024-01-01-hello.md",
        "---\ntitle: Hello\ndate: 2024-01-01\n---\nhi\n",
    );
    let options = PipelineOptions {
        ugly_urls: true,
        ..site.options()
    };
    let summary = site.publish(&options, &Passthrough);

    assert_eq!(summary.written, 1);
    assert_eq!(site.read("2024/01/Hello.md"), "hi\n");
    let listing = site.read("posts/index.md");
    assert_eq!(listing, "\n=> /2024/01/Hello.md 2024-01-01: Hello\n\n");
}

// =========================================================================
// Fixture site
// =========================================================================

#[test]
fn fixture_site_ugly_layout() {
    let site = Site::new();
    let summary = site.publish(&site.options(), &Bracket);

    assert_eq!(summary.written, 6);
    assert_eq!(summary.drafts_skipped, 1);
    assert_eq!(summary.sections, 2);

    assert!(site.read("about.md").starts_with("[[# About"));
    assert!(site.read("2024/01/Hello.md").ends_with("The first entry.\n]]"));
    assert!(site.exists("2024/02/Second%20Post.md"));
    assert!(site.exists("notes/first-note.md"));
    assert!(!site.exists("2024/04/Work%20in%20Progress.md"));
}

#[test]
fn fixture_site_pretty_layout() {
    let site = Site::new();
    let options = PipelineOptions {
        ugly_urls: false,
        ..site.options()
    };
    site.publish(&options, &Passthrough);

    assert!(site.exists("about/index.md"));
    assert!(site.exists("2024/01/Hello/index.md"));
    assert!(site.exists("notes/first-note/index.md"));
    assert!(
        site.read("posts/index.md")
            .contains("=> /2024/01/Hello 2024-01-01: Hello\nFirst post\n")
    );
}

#[test]
fn listing_newest_first() {
    let site = Site::new();
    site.publish(&site.options(), &Passthrough);

    let listing = site.read("posts/index.md");
    let third = listing.find("Third").unwrap();
    let second = listing.find("Second Post").unwrap();
    let hello = listing.find("Hello").unwrap();
    assert!(third < second && second < hello);
}

#[test]
fn root_listing_replaces_root_index() {
    let site = Site::new();
    site.publish(&site.options(), &Passthrough);

    let root = site.read("index.md");
    assert_eq!(root, site.read("posts/index.md"));
    assert!(!root.contains("Welcome"));
}

#[test]
fn drafts_published_when_enabled() {
    let site = Site::new();
    let options = PipelineOptions {
        build_drafts: true,
        ..site.options()
    };
    let summary = site.publish(&options, &Passthrough);

    assert_eq!(summary.drafts_skipped, 0);
    assert!(site.exists("2024/04/Work%20in%20Progress.md"));
    assert!(site.read("posts/index.md").contains("Work in Progress"));
}

#[test]
fn rerun_does_not_duplicate_listing_entries() {
    let site = Site::new();
    let options = site.options();
    site.publish(&options, &Passthrough);
    let first = site.read("posts/index.md");
    site.publish(&options, &Passthrough);

    assert_eq!(site.read("posts/index.md"), first);
    assert_eq!(first.matches("=> ").count(), 3);
}

#[test]
fn no_section_list_skips_listings() {
    let site = Site::new();
    let options = PipelineOptions {
        section_lists: false,
        ..site.options()
    };
    site.publish(&options, &Passthrough);

    assert!(!site.exists("posts/index.md"));
    assert!(site.read("index.md").contains("Welcome"));
}

// =========================================================================
// Failures
// =========================================================================

#[test]
fn broken_page_is_skipped() {
    let site = Site::new();
    site.add("posts/broken.md", "---\ntitle: [oops\n---\n");
    let summary = site.publish(&site.options(), &Passthrough);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 6);
}

#[test]
fn missing_source_is_fatal() {
    let site = Site::empty();
    let options = PipelineOptions {
        source: site.source.path().join("nope"),
        ..site.options()
    };
    let err = pipeline::run(&options, &PermalinkEngine::default(), &Passthrough, &FsStore, None)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Discovery(_)));
    assert!(fs::read_dir(site.output.path()).unwrap().next().is_none());
}

#[cfg(unix)]
#[test]
fn external_processor_output_written() {
    use pagepipe::transform::CommandTransform;

    let site = Site::empty();
    site.add("posts/a.md", "---\ntitle: Shout\ndate: 2024-05-01\n---\nquiet words\n");
    let shout = CommandTransform::new("tr", vec!["a-z".into(), "A-Z".into()]);
    site.publish(&site.options(), &shout);

    assert_eq!(site.read("2024/05/Shout.md"), "QUIET WORDS\n");
}

#[cfg(unix)]
#[test]
fn failing_processor_drops_pages_only() {
    use pagepipe::transform::CommandTransform;

    let site = Site::empty();
    site.add("posts/a.md", "---\ntitle: A\ndate: 2024-05-01\n---\nx\n");
    let fail = CommandTransform::new("false", vec![]);
    let summary = site.publish(&site.options(), &fail);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 0);
    assert!(!site.exists("2024/05/A.md"));
}
