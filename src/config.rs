//! Site configuration module.
//!
//! Reads a Hugo-style `config.toml`. Only a handful of keys matter to the
//! pipeline; everything else in the file is ignored, so an existing Hugo
//! site config can be pointed at directly.
//!
//! ```toml
//! uglyURLs = true          # flat `<name>.<ext>` files instead of `<name>/index.<ext>`
//! buildDrafts = false      # publish pages with `draft: true`
//!
//! [permalinks]             # per-section destination patterns
//! posts = "/:year/:month/:title/"
//! notes = "/notes/:slug/"
//!
//! [processing]
//! max_processes = 4        # transform workers (omit for auto = CPU cores)
//! ```
//!
//! Top-level keys are matched case-insensitively (`uglyURLs` and `uglyurls`
//! are the same key). Keys inside `[permalinks]` are section paths and keep
//! their case.
//!
//! A missing file is not an error: every key has a default. A file that is
//! not valid TOML is.

use crate::permalink::{DEFAULT_PATTERN, Permalinks};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel transform workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: toml::Table,
    processing: ProcessingConfig,
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table = toml::from_str(content)?;
        let values: toml::Table = table
            .into_iter()
            .map(|(key, value)| (key.to_lowercase(), value))
            .collect();

        let processing = match values.get("processing") {
            Some(value) => value.clone().try_into()?,
            None => ProcessingConfig::default(),
        };

        let config = Self { values, processing };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        if let Some(value) = self.get("permalinks")
            && !value.is_table()
        {
            return Err(ConfigError::Validation(
                "permalinks must be a table of section = pattern".into(),
            ));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<&toml::Value> {
        self.values.get(&key.to_lowercase())
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Boolean value of `key`; `false` when absent or not a boolean.
    /// The strings `"true"` and `"false"` are accepted.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(toml::Value::Boolean(b)) => *b,
            Some(toml::Value::String(s)) => s.trim().parse().unwrap_or(false),
            _ => false,
        }
    }

    /// String entries of the table at `key`; empty when absent.
    /// Non-string entries are skipped.
    pub fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        self.get(key)
            .and_then(toml::Value::as_table)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn processing(&self) -> &ProcessingConfig {
        &self.processing
    }

    /// Per-section patterns from `[permalinks]` over the default pattern.
    pub fn permalinks(&self) -> Permalinks {
        Permalinks::new(self.get_string_map("permalinks"), DEFAULT_PATTERN)
    }
}

/// Load config from `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::default());
    }
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Config::from_toml_str(&content)
}

/// Resolve the effective worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.map(|n| n.clamp(1, cores)).unwrap_or(cores)
}
