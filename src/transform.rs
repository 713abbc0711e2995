//! External script query transform.
//!
//! # Phases
//!
//! ```text
//! html ─► parse ─► discover scripts ─► link preloads ─► mutate ─► serialize
//! ```
//!
//! Both discovery passes compare against the original, unpatched attribute
//! values. Mutation runs only after both passes complete.

use markup5ever_rcdom::Handle;
use rustc_hash::FxHashMap;
use std::io;
use std::path::Path;
use std::string::FromUtf8Error;
use thiserror::Error;

use crate::debug;
use crate::dom::{self, AttrRef, has_text_child, is_element, traverse};
use crate::logger::{Log, NoopLog};
use crate::query::{QueryCreator, ScriptContext, compute_patch};

const MODULE: &str = "transform";

// =============================================================================
// Types
// =============================================================================

/// Transform failures. Only serialization can fail; parsing always recovers.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("HTML serialization failed")]
    Serialize(#[from] io::Error),

    #[error("serialized HTML is not valid UTF-8")]
    Encoding(#[from] FromUtf8Error),
}

/// Inputs of one transform call.
#[derive(Clone, Copy)]
pub struct TransformOptions<'a> {
    /// `None` turns the transform into the identity.
    pub query_creator: Option<&'a dyn QueryCreator>,
    pub log: &'a dyn Log,
    /// Output file of the document, passed on to the creator.
    pub page: Option<&'a Path>,
}

impl<'a> TransformOptions<'a> {
    pub fn new(query_creator: &'a dyn QueryCreator) -> Self {
        Self {
            query_creator: Some(query_creator),
            log: &NoopLog,
            page: None,
        }
    }

    /// Options that leave every document untouched.
    pub fn identity() -> Self {
        Self {
            query_creator: None,
            log: &NoopLog,
            page: None,
        }
    }

    pub fn with_log(mut self, log: &'a dyn Log) -> Self {
        self.log = log;
        self
    }

    pub fn with_page(mut self, page: &'a Path) -> Self {
        self.page = Some(page);
        self
    }
}

/// One patched script, as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchedScript {
    pub original: String,
    pub patched: String,
    /// Number of preload links updated alongside the script.
    pub preloads: usize,
}

/// Summary of one transform call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub scripts: Vec<PatchedScript>,
}

impl TransformReport {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    pub fn preloads(&self) -> usize {
        self.scripts.iter().map(|s| s.preloads).sum()
    }
}

/// A script discovered in the first pass.
struct ScriptTarget {
    src: AttrRef,
    original: String,
    patch: String,
    preloads: Vec<AttrRef>,
}

/// Script targets plus an index by original `src`.
///
/// Duplicated `src` values map to the first script carrying them.
#[derive(Default)]
struct Targets {
    arena: Vec<ScriptTarget>,
    by_src: FxHashMap<String, usize>,
}

impl Targets {
    fn push(&mut self, target: ScriptTarget) {
        let index = self.arena.len();
        self.by_src.entry(target.original.clone()).or_insert(index);
        self.arena.push(target);
    }

    fn get_mut(&mut self, src: &str) -> Option<&mut ScriptTarget> {
        let index = *self.by_src.get(src)?;
        self.arena.get_mut(index)
    }
}

// =============================================================================
// Transform
// =============================================================================

/// Patch external script URLs in `html` and keep preload links in sync.
pub fn transform(html: &str, options: &TransformOptions<'_>) -> Result<String, TransformError> {
    transform_with_report(html, options).map(|(html, _)| html)
}

/// [`transform`], also returning what was patched.
pub fn transform_with_report(
    html: &str,
    options: &TransformOptions<'_>,
) -> Result<(String, TransformReport), TransformError> {
    let Some(creator) = options.query_creator else {
        debug!(options.log, MODULE; "no query creator, html unchanged");
        return Ok((html.to_string(), TransformReport::default()));
    };
    let log = options.log;

    debug!(log, MODULE; "parse");
    let document = dom::parse(html);

    let mut targets = discover_scripts(&document.document, creator, options.page, log);
    link_preloads(&document.document, &mut targets, log);
    let report = apply(targets, log);
    debug!(log, MODULE; "script count {}", report.scripts.len());

    debug!(log, MODULE; "serialize");
    let output = String::from_utf8(dom::serialize(&document)?)?;
    Ok((output, report))
}

/// Pass 1: external scripts whose patch is non-empty.
fn discover_scripts(
    root: &Handle,
    creator: &dyn QueryCreator,
    page: Option<&Path>,
    log: &dyn Log,
) -> Targets {
    let mut targets = Targets::default();

    traverse(root, |node| {
        if !is_element(node, "script") {
            return;
        }
        // Inline body means not external
        if has_text_child(node) {
            debug!(log, MODULE; "skip inline script");
            return;
        }
        let Some(src) = AttrRef::non_empty(node, "src") else {
            return;
        };

        let original = src.value();
        let mut ctx = ScriptContext::new(&original);
        ctx.page = page;
        let query = creator.create(&ctx);
        let patch = compute_patch(&original, &query);
        if patch.is_empty() {
            debug!(log, MODULE; "script {:?} needs no patch", original);
            return;
        }

        targets.push(ScriptTarget {
            src,
            original,
            patch,
            preloads: Vec::new(),
        });
    });

    targets
}

/// Pass 2: `<link rel="preload">` pointing at a discovered script.
fn link_preloads(root: &Handle, targets: &mut Targets, log: &dyn Log) {
    if targets.arena.is_empty() {
        return;
    }

    traverse(root, |node| {
        if !is_element(node, "link") {
            return;
        }
        if dom::find_attr(node, "rel", |rel| rel == "preload").is_none() {
            return;
        }
        let Some(href) = AttrRef::non_empty(node, "href") else {
            return;
        };

        let value = href.value();
        if let Some(target) = targets.get_mut(&value) {
            debug!(log, MODULE; "preload {:?} linked", value);
            target.preloads.push(href);
        }
    });
}

/// Write patched URLs to scripts and their preloads.
fn apply(targets: Targets, log: &dyn Log) -> TransformReport {
    let scripts = targets
        .arena
        .into_iter()
        .map(|target| {
            let patched = format!("{}{}", target.original, target.patch);
            target.src.set(&patched);
            for preload in &target.preloads {
                preload.set(&patched);
            }
            debug!(
                log, MODULE;
                "script {:?} patch {:?} preload {}",
                target.original, target.patch, target.preloads.len()
            );
            PatchedScript {
                original: target.original,
                patched,
                preloads: target.preloads.len(),
            }
        })
        .collect();

    TransformReport { scripts }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLog;
    use crate::query::{BuildTimestamp, QueryPatch, StaticQuery};

    fn run(html: &str, creator: &dyn QueryCreator) -> String {
        transform(html, &TransformOptions::new(creator)).unwrap()
    }

    fn body(html: &str) -> &str {
        let start = html.find("<body>").map(|i| i + "<body>".len()).unwrap_or(0);
        let end = html.find("</body>").unwrap_or(html.len());
        &html[start..end]
    }

    fn ts(millis: i64) -> BuildTimestamp {
        BuildTimestamp::at("_t", millis)
    }

    #[test]
    fn test_external_script_patched() {
        let out = run(r#"<script src="a.js"></script>"#, &ts(123));
        assert!(out.contains(r#"<script src="a.js?_t=123"></script>"#));
    }

    #[test]
    fn test_existing_query_merged() {
        let out = run(r#"<script src="a.js?x=1"></script>"#, &ts(123));
        assert!(out.contains(r#"src="a.js?x=1&amp;_t=123""#));
    }

    #[test]
    fn test_existing_key_untouched() {
        let out = run(r#"<script src="a.js?_t=999"></script>"#, &ts(123));
        assert!(out.contains(r#"src="a.js?_t=999""#));
    }

    #[test]
    fn test_ineligible_scripts_unchanged() {
        let html = concat!(
            r#"<body>"#,
            r#"<script src="inline.js">var a = 1;</script>"#,
            r#"<script src="">var b;</script>"#,
            r#"<script src=""></script>"#,
            r#"<script type="module"></script>"#,
        );
        let out = run(html, &ts(1));
        assert_eq!(body(&out), &html["<body>".len()..]);
    }

    #[test]
    fn test_whitespace_body_counts_as_inline() {
        let html = "<body><script src=\"a.js\"> </script>";
        let out = run(html, &ts(1));
        assert_eq!(body(&out), "<script src=\"a.js\"> </script>");
    }

    #[test]
    fn test_boolean_flag_oracles() {
        let flag_on = StaticQuery(QueryPatch::from([("debug", true)]));
        let flag_off = StaticQuery(QueryPatch::from([("debug", false)]));
        assert!(run(r#"<script src="a.js"></script>"#, &flag_on).contains(r#"src="a.js?debug""#));
        assert!(run(r#"<script src="a.js"></script>"#, &flag_off).contains(r#"<script src="a.js"></script>"#));
    }

    #[test]
    fn test_preload_follows_script() {
        let html = r#"<head><link rel="preload" href="a.js" as="script"></head><body><script src="a.js"></script></body>"#;
        let out = run(html, &ts(1));
        assert!(out.contains(r#"<link rel="preload" href="a.js?_t=1" as="script">"#));
        assert!(out.contains(r#"<script src="a.js?_t=1"></script>"#));
    }

    #[test]
    fn test_multiple_preloads_one_script() {
        let html = concat!(
            r#"<link rel="preload" href="a.js" as="script">"#,
            r#"<link rel="preload" href="a.js">"#,
            r#"<script src="a.js"></script>"#,
        );
        let (out, report) = transform_with_report(html, &TransformOptions::new(&ts(1))).unwrap();
        assert_eq!(out.matches(r#"href="a.js?_t=1""#).count(), 2);
        assert_eq!(report.preloads(), 2);
    }

    #[test]
    fn test_non_preload_links_untouched() {
        let html = concat!(
            r#"<link rel="prefetch" href="a.js">"#,
            r#"<link rel="preload stylesheet" href="a.js">"#,
            r#"<link rel="preload" href="b.js">"#,
            r#"<script src="a.js"></script>"#,
        );
        let out = run(html, &ts(1));
        assert!(out.contains(r#"<link rel="prefetch" href="a.js">"#));
        assert!(out.contains(r#"<link rel="preload stylesheet" href="a.js">"#));
        assert!(out.contains(r#"<link rel="preload" href="b.js">"#));
    }

    #[test]
    fn test_preload_matching_uses_original_src() {
        // Per-script patches differ; each preload gets its own script's URL
        let creator = |ctx: &ScriptContext<'_>| QueryPatch::new().with("h", ctx.src.len() as i64);
        let html = concat!(
            r#"<link rel="preload" href="b.js">"#,
            r#"<link rel="preload" href="ab.js">"#,
            r#"<script src="ab.js"></script>"#,
            r#"<script src="b.js"></script>"#,
        );
        let out = run(html, &creator);
        assert!(out.contains(r#"<link rel="preload" href="b.js?h=4">"#));
        assert!(out.contains(r#"<link rel="preload" href="ab.js?h=5">"#));
        assert!(out.contains(r#"<script src="ab.js?h=5"></script>"#));
        assert!(out.contains(r#"<script src="b.js?h=4"></script>"#));
    }

    #[test]
    fn test_duplicate_scripts_preload_binds_first() {
        let calls = std::sync::atomic::AtomicI64::new(0);
        let creator = |_: &ScriptContext<'_>| {
            let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            QueryPatch::new().with("n", n + 1)
        };
        let html = concat!(
            r#"<script src="a.js"></script>"#,
            r#"<script src="a.js"></script>"#,
            r#"<link rel="preload" href="a.js">"#,
        );
        let out = run(html, &creator);
        assert!(out.contains(r#"<script src="a.js?n=1"></script>"#));
        assert!(out.contains(r#"<script src="a.js?n=2"></script>"#));
        assert!(out.contains(r#"<link rel="preload" href="a.js?n=1">"#));
    }

    #[test]
    fn test_empty_patch_leaves_preload_alone() {
        let html = r#"<link rel="preload" href="a.js?_t=5"><script src="a.js?_t=5"></script>"#;
        let (out, report) = transform_with_report(html, &TransformOptions::new(&ts(1))).unwrap();
        assert!(report.is_empty());
        assert!(out.contains(r#"href="a.js?_t=5""#));
    }

    #[test]
    fn test_identity_without_creator() {
        let html = "<p>not even <b>reparsed";
        assert_eq!(transform(html, &TransformOptions::identity()).unwrap(), html);
    }

    #[test]
    fn test_round_trip_stable_without_scripts() {
        let html = "<!DOCTYPE html><title>x</title><p>hello <i>world</i>";
        let once = run(html, &ts(1));
        let twice = run(&once, &ts(1));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_reapplying_is_stable() {
        let html = r#"<link rel="preload" href="a.js"><script src="a.js"></script>"#;
        let once = run(html, &ts(1));
        let twice = run(&once, &ts(2));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_debug_log_reports_decisions() {
        let log = MemoryLog::new();
        let creator = ts(1);
        let options = TransformOptions::new(&creator).with_log(&log);
        let html = r#"<link rel="preload" href="a.js"><script src="a.js"></script><script>1</script>"#;
        transform(html, &options).unwrap();

        assert!(log.contains("skip inline script"));
        assert!(log.contains("preload \"a.js\" linked"));
        assert!(log.contains("script \"a.js\" patch \"?_t=1\" preload 1"));
        assert!(log.contains("script count 1"));
    }
}
