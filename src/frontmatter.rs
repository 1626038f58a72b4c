//! Front matter detection and decoding.
//!
//! A content file may open with a structured header. The dialect is chosen
//! by the first meaningful character of the file (a UTF-8 BOM and leading
//! whitespace are skipped):
//!
//! | Mark | Dialect | Delimiters |
//! |------|---------|------------|
//! | `-`  | YAML    | `---` lines, excluded from the payload |
//! | `+`  | TOML    | `+++` lines, excluded from the payload |
//! | `{`  | JSON    | the object's own braces, included in the payload |
//!
//! Any other first character means the file has no header; the whole file
//! is body and the document is empty.
//!
//! Decoding produces a [`Document`]: string keys mapped to a dynamically
//! typed [`Value`]. Map keys from every dialect are coerced to strings the
//! same way, so a YAML `1: one` and a JSON `"1": "one"` decode identically.
//!
//! ```text
//! ---
//! title: Hello
//! date: 2024-01-01
//! ---
//! body starts here
//! ```

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Decoded front matter.
pub type Document = BTreeMap<String, Value>;

/// A dynamically typed front matter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(Document),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Document> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }
}

/// Serialization dialect of a front matter header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Yaml,
    Toml,
    Json,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("{dialect} front matter: expected opening `{}` line", .dialect.delimiter())]
    MissingDelimiter { dialect: Dialect },
    #[error("{dialect} front matter: no closing `{}`", .dialect.delimiter())]
    Unterminated { dialect: Dialect },
    #[error("{dialect} front matter is empty")]
    Empty { dialect: Dialect },
    #[error("{dialect} front matter is not valid UTF-8")]
    Encoding { dialect: Dialect },
    #[error("{dialect} front matter: {message}")]
    Syntax { dialect: Dialect, message: String },
    #[error("{dialect} front matter must be a mapping at the top level")]
    NotAMapping { dialect: Dialect },
}

impl DecodeError {
    pub fn dialect(&self) -> Dialect {
        match self {
            DecodeError::MissingDelimiter { dialect }
            | DecodeError::Unterminated { dialect }
            | DecodeError::Empty { dialect }
            | DecodeError::Encoding { dialect }
            | DecodeError::Syntax { dialect, .. }
            | DecodeError::NotAMapping { dialect } => *dialect,
        }
    }
}

impl Dialect {
    /// Select a dialect from the first meaningful character of a file.
    pub fn detect(mark: u8) -> Option<Self> {
        match mark {
            b'-' => Some(Dialect::Yaml),
            b'+' => Some(Dialect::Toml),
            b'{' => Some(Dialect::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Yaml => "YAML",
            Dialect::Toml => "TOML",
            Dialect::Json => "JSON",
        }
    }

    fn delimiter(&self) -> &'static str {
        match self {
            Dialect::Yaml => "---",
            Dialect::Toml => "+++",
            Dialect::Json => "}",
        }
    }

    /// Decode a header payload into a document.
    ///
    /// An empty payload is only accepted for JSON, where it yields an empty
    /// document.
    pub fn decode(&self, payload: &str) -> Result<Document, DecodeError> {
        let dialect = *self;
        if payload.trim().is_empty() {
            return match dialect {
                Dialect::Json => Ok(Document::new()),
                _ => Err(DecodeError::Empty { dialect }),
            };
        }
        let syntax = |message: String| DecodeError::Syntax { dialect, message };

        match dialect {
            Dialect::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(payload).map_err(|e| syntax(e.to_string()))?;
                match from_yaml(value) {
                    Value::Map(map) => Ok(map),
                    // Comment-only headers parse to null.
                    Value::Null => Err(DecodeError::Empty { dialect }),
                    _ => Err(DecodeError::NotAMapping { dialect }),
                }
            }
            Dialect::Toml => {
                let table: toml::Table =
                    toml::from_str(payload).map_err(|e| syntax(e.message().to_string()))?;
                Ok(table
                    .into_iter()
                    .map(|(k, v)| (k, from_toml(v)))
                    .collect())
            }
            Dialect::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(payload).map_err(|e| syntax(e.to_string()))?;
                match from_json(value) {
                    Value::Map(map) => Ok(map),
                    _ => Err(DecodeError::NotAMapping { dialect }),
                }
            }
        }
    }
}

/// A content file split into its header document and body.
#[derive(Debug)]
pub struct FrontMatter<'a> {
    /// `None` when the file carries no header.
    pub dialect: Option<Dialect>,
    pub document: Document,
    /// Everything after the header.
    pub body: &'a [u8],
}

/// Detect, extract and decode the front matter at the start of `input`.
pub fn parse(input: &[u8]) -> Result<FrontMatter<'_>, DecodeError> {
    match split(input)? {
        Some((dialect, header, body)) => {
            let payload =
                std::str::from_utf8(header).map_err(|_| DecodeError::Encoding { dialect })?;
            Ok(FrontMatter {
                dialect: Some(dialect),
                document: dialect.decode(payload)?,
                body,
            })
        }
        None => Ok(FrontMatter {
            dialect: None,
            document: Document::new(),
            body: input,
        }),
    }
}

/// Locate the header payload and the body that follows it.
///
/// Returns `Ok(None)` when the first meaningful character selects no
/// dialect.
pub fn split(input: &[u8]) -> Result<Option<(Dialect, &[u8], &[u8])>, DecodeError> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    let Some(dialect) = input.get(start).copied().and_then(Dialect::detect) else {
        return Ok(None);
    };
    let rest = &input[start..];

    let (header, body) = match dialect {
        Dialect::Json => split_braced(rest).ok_or(DecodeError::Unterminated { dialect })?,
        Dialect::Yaml | Dialect::Toml => split_delimited(rest, dialect)?,
    };
    Ok(Some((dialect, header, body)))
}

/// Split `---`/`+++` blocks. The delimiter lines are dropped.
fn split_delimited(input: &[u8], dialect: Dialect) -> Result<(&[u8], &[u8]), DecodeError> {
    let delimiter = dialect.delimiter().as_bytes();
    let (first, mut cursor) = next_line(input, 0).ok_or(DecodeError::MissingDelimiter { dialect })?;
    if trim_line(first) != delimiter {
        return Err(DecodeError::MissingDelimiter { dialect });
    }

    let header_start = cursor;
    while let Some((line, next)) = next_line(input, cursor) {
        if trim_line(line) == delimiter {
            return Ok((&input[header_start..cursor], &input[next..]));
        }
        cursor = next;
    }
    Err(DecodeError::Unterminated { dialect })
}

/// Split a JSON object off the front of `input`, braces included.
fn split_braced(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in input.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let body = &input[i + 1..];
                    let body = body
                        .strip_prefix(b"\r\n")
                        .or_else(|| body.strip_prefix(b"\n"))
                        .unwrap_or(body);
                    return Some((&input[..=i], body));
                }
            }
            _ => {}
        }
    }
    None
}

/// Return the line starting at `start` (without its terminator) and the
/// offset of the following line.
fn next_line(input: &[u8], start: usize) -> Option<(&[u8], usize)> {
    if start >= input.len() {
        return None;
    }
    let rest = &input[start..];
    match rest.iter().position(|&b| b == b'\n') {
        Some(pos) => Some((&rest[..pos], start + pos + 1)),
        None => Some((rest, input.len())),
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &line[..end]
}

// =============================================================================
// Dialect value conversion
// =============================================================================

fn from_yaml(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => Value::List(items.into_iter().map(from_yaml).collect()),
        serde_yaml::Value::Mapping(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), from_yaml(v)))
                .collect(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

/// YAML allows non-string keys; render them the way a reader would type them.
fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Integer(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::List(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => {
            Value::Map(table.into_iter().map(|(k, v)| (k, from_toml(v))).collect())
        }
    }
}

fn from_json(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}
