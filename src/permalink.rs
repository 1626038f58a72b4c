//! Permalink patterns: `/`-delimited templates with `:attribute` tokens.
//!
//! ```text
//! /:year/:month/:title/     →  /2024/01/Hello/
//! /:section/:slug           →  /posts/my-post
//! ```
//!
//! ## Validation
//!
//! A pattern (leading `/` ignored) is split on `/`. Once an empty segment
//! appears no later segment may be non-empty, and every `:identifier`
//! (matched case-insensitively) must name an attribute in the
//! [`AttributeTable`].
//!
//! ## Expansion
//!
//! Tokens in each non-empty segment are replaced left to right by the
//! output of their resolver. Replacement is single-pass: resolver output is
//! never scanned for further tokens. Every textual resolver runs its output
//! through [`url_escape`], so destinations are always URL-safe.
//!
//! The resolver table is an ordinary value handed to [`PermalinkEngine`];
//! [`AttributeTable::standard`] builds the stock attribute set.

use crate::metadata::PageMetadata;
use chrono::Datelike;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// Pattern used for sections without a configured override.
pub const DEFAULT_PATTERN: &str = "/:year/:month/:title/";

/// Attributes understood by [`AttributeTable::standard`].
pub const STANDARD_ATTRIBUTES: [&str; 11] = [
    "year",
    "month",
    "monthname",
    "day",
    "weekday",
    "weekdayname",
    "yearday",
    "section",
    "title",
    "slug",
    "filename",
];

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[0-9A-Za-z_]+").expect("token regex must compile"));

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid permalink pattern {0:?}: non-empty segment after an empty one")]
    Invalid(String),
    #[error("unknown permalink attribute :{0}")]
    UnknownAttribute(String),
    #[error("permalink attribute :{attribute} is not a valid URI: {source}")]
    Escape {
        attribute: String,
        #[source]
        source: EscapeError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscapeError {
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),
    #[error("invalid control character in {0:?}")]
    ControlCharacter(String),
}

/// Computes the replacement text for one attribute. The second argument is
/// the lowercased attribute name, so one resolver can serve several tokens.
pub type Resolver = fn(&PageMetadata, &str) -> Result<String, PatternError>;

/// Immutable lookup from attribute name to resolver.
#[derive(Clone, Default)]
pub struct AttributeTable {
    resolvers: HashMap<String, Resolver>,
}

impl fmt::Debug for AttributeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("AttributeTable")
            .field("attributes", &names)
            .finish()
    }
}

impl AttributeTable {
    /// The stock attribute set: calendar fields, section, title, slug, filename.
    pub fn standard() -> Self {
        let table = Self::default();
        let date_attrs = [
            "year",
            "month",
            "monthname",
            "day",
            "weekday",
            "weekdayname",
            "yearday",
        ];
        date_attrs
            .into_iter()
            .fold(table, |t, name| t.with(name, resolve_date))
            .with("section", resolve_section)
            .with("title", resolve_title)
            .with("slug", resolve_slug_else_title)
            .with("filename", resolve_filename)
    }

    /// Return a table with `name` bound to `resolver`.
    pub fn with(mut self, name: &str, resolver: Resolver) -> Self {
        self.resolvers.insert(name.to_ascii_lowercase(), resolver);
        self
    }

    pub fn get(&self, name: &str) -> Option<Resolver> {
        self.resolvers.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// A permalink template such as `/:year/:month/:title/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern(String);

impl PathPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PathPattern {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PathPattern {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validates and expands [`PathPattern`]s against one attribute table.
#[derive(Debug, Clone)]
pub struct PermalinkEngine {
    table: AttributeTable,
}

impl Default for PermalinkEngine {
    fn default() -> Self {
        Self::new(AttributeTable::standard())
    }
}

impl PermalinkEngine {
    pub fn new(table: AttributeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    /// Whether `pattern` is well formed for this engine's attribute table.
    pub fn validate(&self, pattern: &PathPattern) -> bool {
        self.check(pattern).is_ok()
    }

    /// Like [`validate`](Self::validate), but says what is wrong.
    pub fn check(&self, pattern: &PathPattern) -> Result<(), PatternError> {
        let raw = pattern.as_str();
        let body = raw.strip_prefix('/').unwrap_or(raw);
        let mut seen_empty = false;

        for segment in body.split('/') {
            if segment.is_empty() {
                seen_empty = true;
                continue;
            }
            if seen_empty {
                return Err(PatternError::Invalid(raw.to_string()));
            }
            for token in TOKEN.find_iter(segment) {
                let name = &token.as_str()[1..];
                if !self.table.contains(name) {
                    return Err(PatternError::UnknownAttribute(name.to_ascii_lowercase()));
                }
            }
        }
        Ok(())
    }

    /// Expand `pattern` for one page. Empty segments are kept, so the
    /// result has the same slash structure as the pattern.
    pub fn expand(&self, pattern: &PathPattern, meta: &PageMetadata) -> Result<String, PatternError> {
        self.check(pattern)?;
        let segments = pattern
            .as_str()
            .split('/')
            .map(|segment| self.expand_segment(segment, meta))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(segments.join("/"))
    }

    fn expand_segment(&self, segment: &str, meta: &PageMetadata) -> Result<String, PatternError> {
        let mut out = String::with_capacity(segment.len());
        let mut last = 0;
        for token in TOKEN.find_iter(segment) {
            out.push_str(&segment[last..token.start()]);
            let name = token.as_str()[1..].to_ascii_lowercase();
            let resolver = self
                .table
                .get(&name)
                .ok_or_else(|| PatternError::UnknownAttribute(name.clone()))?;
            out.push_str(&resolver(meta, &name)?);
            last = token.end();
        }
        out.push_str(&segment[last..]);
        Ok(out)
    }
}

/// Per-section pattern overrides with a fallback.
#[derive(Debug, Clone)]
pub struct Permalinks {
    sections: BTreeMap<String, PathPattern>,
    fallback: PathPattern,
}

impl Default for Permalinks {
    fn default() -> Self {
        Self::new(BTreeMap::new(), DEFAULT_PATTERN)
    }
}

impl Permalinks {
    pub fn new(sections: BTreeMap<String, String>, fallback: impl Into<PathPattern>) -> Self {
        Self {
            sections: sections
                .into_iter()
                .map(|(section, pattern)| (section, PathPattern::from(pattern)))
                .collect(),
            fallback: fallback.into(),
        }
    }

    pub fn pattern_for(&self, section: &str) -> &PathPattern {
        self.sections.get(section).unwrap_or(&self.fallback)
    }

    /// Configured overrides, in section order.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &PathPattern)> {
        self.sections.iter().map(|(s, p)| (s.as_str(), p))
    }
}

// =============================================================================
// Resolvers
// =============================================================================

fn resolve_date(meta: &PageMetadata, attr: &str) -> Result<String, PatternError> {
    let date = &meta.date;
    Ok(match attr {
        "year" => date.year().to_string(),
        "month" => format!("{:02}", date.month()),
        "monthname" => date.format("%B").to_string(),
        "day" => format!("{:02}", date.day()),
        "weekday" => date.weekday().num_days_from_sunday().to_string(),
        "weekdayname" => date.format("%A").to_string(),
        "yearday" => date.ordinal().to_string(),
        other => return Err(PatternError::UnknownAttribute(other.to_string())),
    })
}

fn resolve_section(meta: &PageMetadata, attr: &str) -> Result<String, PatternError> {
    escape_attribute(attr, &meta.subdir)
}

fn resolve_title(meta: &PageMetadata, attr: &str) -> Result<String, PatternError> {
    escape_attribute(attr, &meta.title)
}

/// The slug with one leading and one trailing hyphen removed, or the title
/// when no slug is set.
fn resolve_slug_else_title(meta: &PageMetadata, attr: &str) -> Result<String, PatternError> {
    if meta.slug.is_empty() {
        return resolve_title(meta, attr);
    }
    let slug = meta.slug.strip_prefix('-').unwrap_or(&meta.slug);
    let slug = slug.strip_suffix('-').unwrap_or(slug);
    escape_attribute(attr, slug)
}

fn resolve_filename(meta: &PageMetadata, attr: &str) -> Result<String, PatternError> {
    escape_attribute(attr, &meta.file_path)
}

fn escape_attribute(attr: &str, value: &str) -> Result<String, PatternError> {
    url_escape(value).map_err(|source| PatternError::Escape {
        attribute: attr.to_string(),
        source,
    })
}

/// Validate `raw` as a URI path and re-serialize it in canonical form.
///
/// Well-formed `%XX` escapes are kept, characters legal in a path are kept,
/// everything else is percent-encoded as UTF-8. Control characters and
/// malformed escapes are rejected.
pub fn url_escape(raw: &str) -> Result<String, EscapeError> {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            _ if c.is_ascii_control() => {
                return Err(EscapeError::ControlCharacter(raw.to_string()));
            }
            '%' => {
                let hex = bytes.get(i + 1..i + 3);
                if !hex.is_some_and(|h| h.iter().all(u8::is_ascii_hexdigit)) {
                    let end = (i + 3).min(raw.len());
                    let snippet = raw.get(i..end).unwrap_or(&raw[i..]);
                    return Err(EscapeError::InvalidEscape(snippet.to_string()));
                }
                out.push('%');
                for _ in 0..2 {
                    if let Some((_, digit)) = chars.next() {
                        out.push(digit);
                    }
                }
            }
            _ if is_path_char(c) => out.push(c),
            _ => {
                let mut buf = [0u8; 4];
                out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
            }
        }
    }
    Ok(out)
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_.~!$&'()*+,;=:@/?#[]".contains(c)
}
