//! # pagepipe
//!
//! Publish a tree of markup files through an external renderer. Every file
//! carries a front matter header; the header decides where the rendered
//! output lands, and pages sharing a directory are collected into a dated
//! link listing.
//!
//! # Architecture
//!
//! ```text
//! content/ ──discover──▶ units ──parse + permalink──▶ drafts filter
//!                                                         │
//! public/ ◀──write── transform (external command) ◀───────┘
//!    ▲
//!    └──── section listings (one per directory, newest first)
//! ```
//!
//! The pipeline talks to the outside world through two small traits:
//! [`transform::Transform`] (bytes in, bytes out) and [`store::Store`]
//! (create directory, write file, remove file). Both have in-memory
//! implementations, so the whole run can be tested without a renderer or a
//! real output directory.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`frontmatter`] | Detects the header dialect (YAML `---`, TOML `+++`, JSON `{`) and decodes it |
//! | [`metadata`] | Total coercion of a decoded header into [`metadata::PageMetadata`] |
//! | [`permalink`] | `:attribute` path patterns: validation, expansion, URL escaping |
//! | [`discovery`] | Walks the source tree on a background thread, one unit per file |
//! | [`pipeline`] | Orchestration: parse, destination, drafts, transform, write, listings |
//! | [`section`] | Groups units by directory and renders the Gemini link listings |
//! | [`transform`] | External processor: child process over stdin/stdout, or passthrough |
//! | [`store`] | Output storage: atomic filesystem writes, or in memory |
//! | [`config`] | Hugo-style `config.toml`: `uglyURLs`, `buildDrafts`, `[permalinks]` |
//! | [`output`] | CLI formatting of progress events and the run summary |
//!
//! # Design Decisions
//!
//! ## Unit Errors Never Stop the Run
//!
//! A bad header, an unknown permalink token, or a renderer that exits
//! non-zero drops that one page with a warning. Only environment failures
//! (the source tree cannot be walked, the output cannot be written) end the
//! run with an error.
//!
//! ## Newest First
//!
//! Listings are sorted by date descending. Pages without a usable date get
//! the current time and float to the top.

pub mod config;
pub mod discovery;
pub mod frontmatter;
pub mod metadata;
pub mod output;
pub mod permalink;
pub mod pipeline;
pub mod section;
pub mod store;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_helpers;
