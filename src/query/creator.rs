//! Query creators: per-script patch producers.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use super::QueryPatch;

/// Default parameter name for the build timestamp.
pub const DEFAULT_TIMESTAMP_KEY: &str = "_t";

/// What a query creator knows about the script it is patching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptContext<'a> {
    /// Original, unpatched `src` attribute value.
    pub src: &'a str,
    /// File the document is written to, when known.
    pub page: Option<&'a Path>,
}

impl<'a> ScriptContext<'a> {
    pub const fn new(src: &'a str) -> Self {
        Self { src, page: None }
    }

    pub const fn with_page(mut self, page: &'a Path) -> Self {
        self.page = Some(page);
        self
    }
}

/// Produces the query patch for one external script.
///
/// Called once per eligible script, with the original `src`. Implementations
/// that should share one value across a build (e.g. a timestamp) must compute
/// it once, outside `create()`.
pub trait QueryCreator: Send + Sync {
    fn create(&self, ctx: &ScriptContext<'_>) -> QueryPatch;
}

impl<F> QueryCreator for F
where
    F: Fn(&ScriptContext<'_>) -> QueryPatch + Send + Sync,
{
    fn create(&self, ctx: &ScriptContext<'_>) -> QueryPatch {
        self(ctx)
    }
}

// ============================================================================
// Build Timestamp
// ============================================================================

/// `{ key: <millis> }`, captured once when the creator is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTimestamp {
    key: String,
    millis: i64,
}

impl BuildTimestamp {
    /// Capture the current wall-clock time.
    pub fn now(key: impl Into<String>) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Self::at(key, millis)
    }

    /// Use a fixed timestamp (reproducible builds, tests).
    pub fn at(key: impl Into<String>, millis: i64) -> Self {
        Self {
            key: key.into(),
            millis,
        }
    }

    #[inline]
    pub fn millis(&self) -> i64 {
        self.millis
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for BuildTimestamp {
    fn default() -> Self {
        Self::now(DEFAULT_TIMESTAMP_KEY)
    }
}

impl QueryCreator for BuildTimestamp {
    fn create(&self, _ctx: &ScriptContext<'_>) -> QueryPatch {
        QueryPatch::new().with(self.key.as_str(), self.millis)
    }
}

// ============================================================================
// Static / Combined
// ============================================================================

/// The same patch for every script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticQuery(pub QueryPatch);

impl QueryCreator for StaticQuery {
    fn create(&self, _ctx: &ScriptContext<'_>) -> QueryPatch {
        self.0.clone()
    }
}

/// Concatenates the patches of several creators; later creators win on
/// duplicate keys.
#[derive(Clone, Default)]
pub struct Combined {
    parts: Vec<Arc<dyn QueryCreator>>,
}

impl Combined {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, creator: Arc<dyn QueryCreator>) -> Self {
        self.parts.push(creator);
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl QueryCreator for Combined {
    fn create(&self, ctx: &ScriptContext<'_>) -> QueryPatch {
        let mut patch = QueryPatch::new();
        for part in &self.parts {
            patch.extend(part.create(ctx));
        }
        patch
    }
}
