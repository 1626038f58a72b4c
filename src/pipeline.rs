//! Discovery-to-publish orchestration.
//!
//! ```text
//! discovery thread ──units──▶ prepare ──▶ drafts filter ──▶ collected
//!                                                              │
//!          transform (worker pool, order kept) ◀───────────────┘
//!                        │
//!                        ▼
//!                   write artifacts ──▶ section listings ──▶ root listing
//! ```
//!
//! ## Per-unit stages
//!
//! 1. Decode front matter and extract metadata. The body after the header
//!    becomes the unit's raw body.
//! 2. Derive the destination. Root units take their base name with one
//!    leading `_` removed (`_index` → `index`); everything else expands the
//!    pattern configured for its section. Destinations are canonical:
//!    relative, no leading or trailing `/`.
//! 3. Drop drafts unless drafts are enabled.
//!
//! Collected units are then transformed, written, and aggregated.
//!
//! ## Output layout
//!
//! | Destination | Pretty | Ugly |
//! |-------------|--------|------|
//! | `posts/2024/my-post` | `posts/2024/my-post/index.<ext>` | `posts/2024/my-post.<ext>` |
//! | `about` | `about/index.<ext>` | `about.<ext>` |
//! | `index` | `index.<ext>` | `index.<ext>` |
//!
//! ## Failures
//!
//! Decode, pattern and transform errors belong to one unit: it is logged
//! and dropped, the run goes on. Discovery and store errors end the run.
//! Discovery errors surface before anything is written.

use crate::config::effective_threads;
use crate::discovery::{self, ContentUnit, DiscoveryError};
use crate::frontmatter::{self, DecodeError};
use crate::metadata::PageMetadata;
use crate::permalink::{PatternError, PermalinkEngine, Permalinks};
use crate::section;
use crate::store::{Store, StoreError};
use crate::transform::{Transform, TransformError};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Units buffered between the discovery thread and the orchestrator.
const DISCOVERY_BUFFER: usize = 64;

/// Failure scoped to a single unit. The unit is dropped, the run continues.
#[derive(Error, Debug)]
pub enum UnitError {
    #[error("front matter: {0}")]
    Decode(#[from] DecodeError),
    #[error("permalink: {0}")]
    Pattern(#[from] PatternError),
    #[error("transform: {0}")]
    Transform(#[from] TransformError),
    #[error("permalink expanded to an empty destination")]
    EmptyDestination,
}

/// Failure that ends the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("write failed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Extension of written artifacts, without the dot.
    pub ext: String,
    pub ugly_urls: bool,
    pub build_drafts: bool,
    pub section_lists: bool,
    /// Section whose listing is also written as the output root index.
    pub section_on_root: Option<String>,
    pub permalinks: Permalinks,
    /// Transform workers; `None` means one per core.
    pub jobs: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            source: PathBuf::from("content"),
            destination: PathBuf::from("public"),
            ext: "md".to_string(),
            ugly_urls: false,
            build_drafts: false,
            section_lists: true,
            section_on_root: Some("posts".to_string()),
            permalinks: Permalinks::default(),
            jobs: None,
        }
    }
}

/// Progress reported while the pipeline runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    DraftSkipped {
        source: PathBuf,
        bytes: usize,
    },
    Transformed {
        source: PathBuf,
        bytes: usize,
    },
    DirCreated {
        path: PathBuf,
    },
    Written {
        path: PathBuf,
        bytes: usize,
    },
    SectionWritten {
        section: String,
        path: PathBuf,
        entries: usize,
    },
    RootSectionWritten {
        section: String,
        path: PathBuf,
    },
}

/// Counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    pub drafts_skipped: usize,
    pub failed: usize,
    pub sections: usize,
}

/// Run the whole pipeline over `options.source`.
pub fn run(
    options: &PipelineOptions,
    engine: &PermalinkEngine,
    transform: &dyn Transform,
    store: &dyn Store,
    events: Option<Sender<PipelineEvent>>,
) -> Result<RunSummary, PipelineError> {
    let mut summary = RunSummary::default();

    let (units, discovery) = discovery::spawn(&options.source, DISCOVERY_BUFFER);
    let mut collected = Vec::new();
    for mut unit in units {
        if let Err(e) = prepare(&mut unit, &options.permalinks, engine) {
            tracing::warn!(source = %unit.source_path.display(), error = %e, "dropping unit");
            summary.failed += 1;
            continue;
        }
        if unit.is_draft && !options.build_drafts {
            emit(
                &events,
                PipelineEvent::DraftSkipped {
                    source: unit.source_path.clone(),
                    bytes: unit.raw_body.len(),
                },
            );
            summary.drafts_skipped += 1;
            continue;
        }
        collected.push(unit);
    }
    let discovered = discovery.join().map_err(|_| DiscoveryError::Panicked)??;
    tracing::debug!(discovered, retained = collected.len(), "discovery finished");

    let published = transform_all(collected, transform, options.jobs, &events, &mut summary);

    ensure_dir(store, &options.destination, &events)?;
    for unit in &published {
        let (dir, file) = target_path(
            &options.destination,
            &unit.destination,
            &options.ext,
            options.ugly_urls,
        );
        ensure_dir(store, &dir, &events)?;
        let bytes = store.write_file(&file, &unit.transformed_body)?;
        emit(&events, PipelineEvent::Written { path: file, bytes });
        summary.written += 1;
    }

    if !options.section_lists {
        return Ok(summary);
    }

    let sections = section::aggregate(
        &published,
        &options.destination,
        &options.ext,
        options.ugly_urls,
    );
    for section in sections.values() {
        if let Some(dir) = section.file.parent() {
            ensure_dir(store, dir, &events)?;
        }
        section::write(store, section, &section.file)?;
        emit(
            &events,
            PipelineEvent::SectionWritten {
                section: section.key.clone(),
                path: section.file.clone(),
                entries: section.entries.len(),
            },
        );
    }
    summary.sections = sections.len();

    if let Some(key) = &options.section_on_root
        && let Some(section) = sections.get(key)
    {
        let path = options.destination.join(format!("index.{}", options.ext));
        section::write(store, section, &path)?;
        emit(
            &events,
            PipelineEvent::RootSectionWritten {
                section: key.clone(),
                path,
            },
        );
    }

    Ok(summary)
}

/// Parse the unit's front matter and fill in metadata and destination.
///
/// On success `raw_body` holds only the text after the header.
pub fn prepare(
    unit: &mut ContentUnit,
    permalinks: &Permalinks,
    engine: &PermalinkEngine,
) -> Result<(), UnitError> {
    let raw = std::mem::take(&mut unit.raw_body);
    let parsed = frontmatter::parse(&raw)?;

    let mut meta = PageMetadata::from_document(&parsed.document);
    meta.file_path = unit.base_name.clone();
    meta.subdir = unit.parent_section.clone();

    let dest = destination(unit, &meta, permalinks, engine)?;
    unit.destination = dest;
    unit.is_draft = meta.draft;
    meta.permalink = unit.destination.clone();
    unit.raw_body = parsed.body.to_vec();
    unit.metadata = Some(meta);
    Ok(())
}

/// Canonical destination of a unit.
pub fn destination(
    unit: &ContentUnit,
    meta: &PageMetadata,
    permalinks: &Permalinks,
    engine: &PermalinkEngine,
) -> Result<String, UnitError> {
    let raw = if unit.is_root() {
        unit.base_name
            .strip_prefix('_')
            .unwrap_or(&unit.base_name)
            .to_string()
    } else {
        engine.expand(permalinks.pattern_for(&unit.parent_section), meta)?
    };

    let canonical = raw.trim_matches('/');
    if canonical.is_empty() {
        return Err(UnitError::EmptyDestination);
    }
    Ok(canonical.to_string())
}

/// Directory and file an artifact is written to.
pub fn target_path(
    output_root: &Path,
    destination: &str,
    ext: &str,
    ugly_urls: bool,
) -> (PathBuf, PathBuf) {
    let index = format!("index.{ext}");
    if destination == "index" {
        return (output_root.to_path_buf(), output_root.join(index));
    }
    if ugly_urls {
        let (parent, last) = match destination.rsplit_once('/') {
            Some((parent, last)) => (output_root.join(parent), last),
            None => (output_root.to_path_buf(), destination),
        };
        let file = parent.join(format!("{last}.{ext}"));
        return (parent, file);
    }
    let dir = output_root.join(destination);
    let file = dir.join(index);
    (dir, file)
}

/// Transform every unit on a bounded worker pool. Output order matches
/// input order; failed units are logged, counted and left out.
fn transform_all(
    units: Vec<ContentUnit>,
    transform: &dyn Transform,
    jobs: Option<usize>,
    events: &Option<Sender<PipelineEvent>>,
    summary: &mut RunSummary,
) -> Vec<ContentUnit> {
    let threads = effective_threads(jobs);
    let run_one = |unit: &ContentUnit| transform.transform(&unit.raw_body);

    let results: Vec<Result<Vec<u8>, TransformError>> =
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => pool.install(|| units.par_iter().map(run_one).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "worker pool unavailable, transforming sequentially");
                units.iter().map(run_one).collect()
            }
        };

    let mut published = Vec::with_capacity(units.len());
    for (mut unit, result) in units.into_iter().zip(results) {
        match result {
            Ok(body) => {
                emit(
                    events,
                    PipelineEvent::Transformed {
                        source: unit.source_path.clone(),
                        bytes: body.len(),
                    },
                );
                unit.transformed_body = body;
                published.push(unit);
            }
            Err(e) => {
                let e = UnitError::from(e);
                tracing::warn!(source = %unit.source_path.display(), error = %e, "dropping unit");
                summary.failed += 1;
            }
        }
    }
    published
}

fn ensure_dir(
    store: &dyn Store,
    path: &Path,
    events: &Option<Sender<PipelineEvent>>,
) -> Result<(), StoreError> {
    if store.ensure_dir(path)? {
        emit(
            events,
            PipelineEvent::DirCreated {
                path: path.to_path_buf(),
            },
        );
    }
    Ok(())
}

fn emit(events: &Option<Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}
