//! Content-hash query creator.
//!
//! Resolves a script `src` to a file under the build output root and uses a
//! blake3 digest of its bytes as the version value. When the script changes,
//! the version changes, triggering browser re-fetch.

use dashmap::DashMap;
use percent_encoding::percent_decode_str;
use std::fs;
use std::path::{Path, PathBuf};

use super::{QueryCreator, QueryPatch, ScriptContext};

/// Default parameter name for content versions.
pub const DEFAULT_VERSION_KEY: &str = "v";

/// Default number of hex chars kept from the digest.
pub const DEFAULT_HASH_LENGTH: usize = 8;

/// `{ key: <hex digest prefix> }` per script file.
#[derive(Debug)]
pub struct ContentHash {
    root: PathBuf,
    key: String,
    length: usize,
    /// Resolved path → version.
    versions: DashMap<PathBuf, String>,
}

impl ContentHash {
    pub fn new(root: impl Into<PathBuf>, key: impl Into<String>, length: usize) -> Self {
        Self {
            root: root.into(),
            key: key.into(),
            length: length.clamp(1, 64),
            versions: DashMap::new(),
        }
    }

    /// Map `src` to an existing file under the root.
    ///
    /// Root-relative URLs (`/js/app.js`) resolve against the root, relative
    /// ones against the directory of `page`, or the root when no page is
    /// known. Remote URLs (`scheme://`, `//host`) and `data:` URIs have no
    /// local file. Paths escaping the root (`../`) are rejected.
    pub fn resolve(&self, src: &str, page: Option<&Path>) -> Option<PathBuf> {
        if src.starts_with("//") || src.contains("://") || src.starts_with("data:") {
            return None;
        }

        let path = src.split(['?', '#']).next().unwrap_or(src);
        let decoded = percent_decode_str(path).decode_utf8().ok()?;

        let candidate = match decoded.strip_prefix('/') {
            Some(absolute) => self.root.join(absolute),
            None => match page.and_then(Path::parent) {
                Some(dir) => dir.join(&*decoded),
                None => self.root.join(&*decoded),
            },
        };

        let root = fs::canonicalize(&self.root).ok()?;
        let resolved = fs::canonicalize(candidate).ok()?;
        (resolved.starts_with(&root) && resolved.is_file()).then_some(resolved)
    }

    /// Version for the file at `path`, computed once and cached.
    pub fn version(&self, path: &Path) -> Option<String> {
        if let Some(version) = self.versions.get(path) {
            return Some(version.clone());
        }

        let content = fs::read(path).ok()?;
        let version = self.digest(&content);
        self.versions.insert(path.to_path_buf(), version.clone());
        Some(version)
    }

    /// Forget cached versions (e.g. between watch-mode rebuilds).
    pub fn clear(&self) {
        self.versions.clear();
    }

    fn digest(&self, content: &[u8]) -> String {
        let hash = blake3::hash(content);
        let mut hex = hex::encode(hash.as_bytes());
        hex.truncate(self.length);
        hex
    }
}

impl QueryCreator for ContentHash {
    fn create(&self, ctx: &ScriptContext<'_>) -> QueryPatch {
        self.resolve(ctx.src, ctx.page)
            .and_then(|path| self.version(&path))
            .map(|version| QueryPatch::new().with(self.key.as_str(), version))
            .unwrap_or_default()
    }
}
