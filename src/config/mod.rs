//! Plugin configuration loaded from TOML.
//!
//! ```toml
//! debug = false
//!
//! [query]
//! strategy = "timestamp"   # "timestamp" | "content-hash" | "none"
//! key = "_t"               # defaults: "_t" (timestamp), "v" (content-hash)
//! root = "dist"            # content-hash only, relative to the config file
//! length = 8               # content-hash only, hex chars kept
//!
//! [query.params]           # appended to every external script
//! release = "1.2.3"
//! ```

mod error;

pub use error::{ConfigDiagnostic, ConfigDiagnostics, ConfigError};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::logger::Log;
use crate::plugin::PluginOptions;
use crate::query::{
    BuildTimestamp, Combined, ContentHash, DEFAULT_HASH_LENGTH, DEFAULT_TIMESTAMP_KEY,
    DEFAULT_VERSION_KEY, QueryCreator, QueryPatch, StaticQuery,
};

// ============================================================================
// Sections
// ============================================================================

/// How the per-script value is produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryStrategy {
    /// Build start time in milliseconds, shared by every script.
    #[default]
    Timestamp,
    /// blake3 digest of the script file under `root`.
    ContentHash,
    /// Only `params`, if any.
    None,
}

/// `[query]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    pub strategy: QueryStrategy,
    /// Parameter name; strategy-specific default when absent.
    pub key: Option<String>,
    /// Output root for `content-hash`.
    pub root: Option<PathBuf>,
    /// Hex chars kept from the content hash.
    pub length: usize,
    /// Static parameters, in file order.
    pub params: QueryPatch,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            strategy: QueryStrategy::default(),
            key: None,
            root: None,
            length: DEFAULT_HASH_LENGTH,
            params: QueryPatch::new(),
        }
    }
}

impl QuerySection {
    /// Effective parameter name for the strategy value.
    pub fn key(&self) -> &str {
        match (&self.key, self.strategy) {
            (Some(key), _) => key.as_str(),
            (None, QueryStrategy::ContentHash) => DEFAULT_VERSION_KEY,
            (None, _) => DEFAULT_TIMESTAMP_KEY,
        }
    }
}

// ============================================================================
// Root configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directory relative paths are resolved against (internal use only).
    #[serde(skip)]
    pub base_dir: PathBuf,

    /// Log per-node decisions.
    pub debug: bool,

    pub query: QuerySection,
}

impl PluginConfig {
    /// Parse and validate configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file, warning about unknown fields.
    ///
    /// Relative paths inside the file resolve against its directory.
    pub fn load(path: &Path, log: &dyn Log) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            crate::log!(log, "warning"; "unknown fields in {}, ignoring:", path.display());
            for field in &ignored {
                crate::log!(log, "warning"; "- {}", field);
            }
        }

        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    pub fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Check field combinations, collecting every problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diagnostics = ConfigDiagnostics::new();
        let query = &self.query;

        if query.key.as_deref().is_some_and(str::is_empty) {
            diagnostics.error("query.key", "must not be empty");
        }

        if query.params.keys().any(str::is_empty) {
            diagnostics.error("query.params", "parameter names must not be empty");
        }

        if query.strategy == QueryStrategy::ContentHash {
            if query.root.is_none() {
                diagnostics.error_with_hint(
                    "query.root",
                    "required by the `content-hash` strategy",
                    "point it at the build output directory, e.g. `root = \"dist\"`",
                );
            }
            if !(1..=64).contains(&query.length) {
                diagnostics.error_with_hint(
                    "query.length",
                    format!("{} is out of range", query.length),
                    "a blake3 digest has 64 hex chars; use 1..=64",
                );
            }
        }

        diagnostics.into_result()
    }

    /// `root` resolved against the config directory.
    pub fn content_root(&self) -> Option<PathBuf> {
        self.query.root.as_ref().map(|root| self.base_dir.join(root))
    }

    /// Build plugin options: static params first, then the strategy value.
    pub fn into_options(self) -> PluginOptions {
        let mut parts: Vec<Arc<dyn QueryCreator>> = Vec::new();

        if !self.query.params.is_empty() {
            parts.push(Arc::new(StaticQuery(self.query.params.clone())));
        }

        match self.query.strategy {
            QueryStrategy::Timestamp => {
                parts.push(Arc::new(BuildTimestamp::now(self.query.key())));
            }
            QueryStrategy::ContentHash => {
                if let Some(root) = self.content_root() {
                    parts.push(Arc::new(ContentHash::new(
                        root,
                        self.query.key(),
                        self.query.length,
                    )));
                }
            }
            QueryStrategy::None => {}
        }

        let query_creator: Option<Arc<dyn QueryCreator>> = match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Arc::new(
                parts.into_iter().fold(Combined::new(), Combined::push),
            )),
        };

        PluginOptions {
            query_creator,
            debug: self.debug,
            log: None,
        }
    }
}
