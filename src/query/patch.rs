//! Ordered query patches and the query-string merge.
//!
//! `compute_patch()` returns only the fragment to append to the original URL,
//! never a rewritten URL: keys already present are kept as they are.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use url::Url;

use super::QueryValue;

/// Base for resolving relative script URLs.
///
/// Only used to gain structured access to the query; never rendered.
const PLACEHOLDER_BASE: &str = "https://placeholder.local/";

static BASE: LazyLock<Option<Url>> = LazyLock::new(|| Url::parse(PLACEHOLDER_BASE).ok());

// ============================================================================
// QueryPatch
// ============================================================================

/// Insertion-ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPatch {
    entries: Vec<(String, QueryValue)>,
}

impl QueryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`; an existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append every entry of `other`, later values winning.
    pub fn extend(&mut self, other: QueryPatch) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }
}

impl<K, V> FromIterator<(K, V)> for QueryPatch
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut patch = Self::new();
        for (key, value) in iter {
            patch.insert(key, value);
        }
        patch
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for QueryPatch
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl Serialize for QueryPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for QueryPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PatchVisitor;

        impl<'de> Visitor<'de> for PatchVisitor {
            type Value = QueryPatch;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of query parameters")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<QueryPatch, A::Error> {
                let mut patch = QueryPatch::new();
                while let Some((key, value)) = access.next_entry::<String, QueryValue>()? {
                    patch.insert(key, value);
                }
                Ok(patch)
            }
        }

        deserializer.deserialize_map(PatchVisitor)
    }
}

// ============================================================================
// Merge
// ============================================================================

/// Compute the fragment to append to `src` so it carries `patch`.
///
/// - keys already present on `src` are dropped, never overridden
/// - `true` renders the bare `key` (presence flag), `false` is dropped
/// - other truthy values render `key=value`, other falsy values the bare `key`
/// - the fragment starts with `?` when `src` has no query pairs, `&` otherwise
///
/// Unparseable URLs yield an empty fragment.
pub fn compute_patch(src: &str, patch: &QueryPatch) -> String {
    if patch.is_empty() {
        return String::new();
    }

    let Some(url) = BASE.as_ref().and_then(|base| base.join(src).ok()) else {
        return String::new();
    };

    let existing: Vec<String> = url.query_pairs().map(|(key, _)| key.into_owned()).collect();

    let query = patch
        .iter()
        .filter(|(key, _)| !existing.iter().any(|k| k == key))
        .filter(|(_, value)| !value.is_absent_flag())
        .map(|(key, value)| match value {
            // Presence flag
            QueryValue::Bool(true) => key.to_string(),
            value if value.is_truthy() => format!("{key}={value}"),
            _ => key.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&");

    if query.is_empty() {
        String::new()
    } else if existing.is_empty() {
        format!("?{query}")
    } else {
        format!("&{query}")
    }
}
