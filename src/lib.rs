//! html-script-query - cache-busting query strings for external scripts.
//!
//! Post-processes generated HTML: every `<script src>` without inline content
//! gets a query patch appended to its URL, and `<link rel="preload">` hints
//! pointing at the same original URL receive the same patched URL.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   EmitEvent   ┌──────────────────┐   html   ┌────────────┐
//! │ host hooks │ ────────────► │ ScriptQueryPlugin│ ───────► │ transform  │
//! │ / site dir │ ◄──────────── │  (creator, log)  │ ◄─────── │ dom, query │
//! └────────────┘               └──────────────────┘          └────────────┘
//! ```
//!
//! - `dom`: html5ever parse/serialize, tree walker, attribute handles
//! - `query`: query values, patches, the merge rule, query creators
//! - `transform`: discovery, preload linkage, deferred mutation
//! - `plugin`: options and the per-event entry point
//! - `host`: hook surfaces of the host build and their probing strategies
//! - `site`: rewrite a built output directory in parallel
//! - `config`: TOML configuration
//! - `logger`: injected logging capability
//!
//! # Example
//!
//! ```ignore
//! use html_script_query::{BuildTimestamp, TransformOptions, transform};
//!
//! let creator = BuildTimestamp::at("_t", 1);
//! let html = transform(r#"<script src="a.js"></script>"#, &TransformOptions::new(&creator))?;
//! assert!(html.contains(r#"src="a.js?_t=1""#));
//! ```

pub mod logger;

pub mod config;
pub mod dom;
pub mod host;
pub mod plugin;
pub mod query;
pub mod site;
pub mod transform;

pub use config::{ConfigError, PluginConfig, QueryStrategy};
pub use host::{EmitEvent, HookError, HostSurface};
pub use logger::{Log, MemoryLog, NoopLog, TermLog};
pub use plugin::{Applied, PLUGIN_NAME, PluginOptions, ScriptQueryPlugin};
pub use query::{
    BuildTimestamp, ContentHash, QueryCreator, QueryPatch, QueryValue, ScriptContext, StaticQuery,
    compute_patch,
};
pub use site::{RewriteReport, rewrite_dir};
pub use transform::{
    PatchedScript, TransformError, TransformOptions, TransformReport, transform,
    transform_with_report,
};
