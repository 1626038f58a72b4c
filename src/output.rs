//! CLI output formatting for pipeline progress.
//!
//! # Output Format
//!
//! ```text
//! skipping draft content/posts/wip.md (312 bytes)
//! processed content/posts/2024-01-01-hello.md (1204 bytes)
//! mkdir public/2024/01
//! written public/2024/01/Hello.md (1204 bytes)
//! written section listing posts to public/posts/index.md (3 entries)
//! written section listing posts to root public/index.md
//!
//! Published 3 pages, 1 draft skipped, 0 failed, 1 section
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::pipeline::{PipelineEvent, RunSummary};

/// `1 page`, `3 pages`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Format a single progress event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    let line = match event {
        PipelineEvent::DraftSkipped { source, bytes } => {
            format!("skipping draft {} ({bytes} bytes)", source.display())
        }
        PipelineEvent::Transformed { source, bytes } => {
            format!("processed {} ({bytes} bytes)", source.display())
        }
        PipelineEvent::DirCreated { path } => format!("mkdir {}", path.display()),
        PipelineEvent::Written { path, bytes } => {
            format!("written {} ({bytes} bytes)", path.display())
        }
        PipelineEvent::SectionWritten {
            section,
            path,
            entries,
        } => format!(
            "written section listing {section} to {} ({})",
            path.display(),
            count(*entries, "entry", "entries")
        ),
        PipelineEvent::RootSectionWritten { section, path } => {
            format!("written section listing {section} to root {}", path.display())
        }
    };
    vec![line]
}

pub fn print_event(event: &PipelineEvent) {
    for line in format_event(event) {
        println!("{}", line);
    }
}

/// Format the end-of-run totals, preceded by a blank line.
pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    vec![
        String::new(),
        format!(
            "Published {}, {} skipped, {} failed, {}",
            count(summary.written, "page", "pages"),
            count(summary.drafts_skipped, "draft", "drafts"),
            summary.failed,
            count(summary.sections, "section", "sections"),
        ),
    ]
}

pub fn print_summary(summary: &RunSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}
