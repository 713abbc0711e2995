//! Plugin object: options, host wiring and per-event processing.

use std::path::Path;
use std::sync::Arc;

use crate::host::{Done, EmitEvent, HookProbe, HostSurface, default_probes, find_probe};
use crate::logger::{Log, NoopLog, TermLog};
use crate::query::{BuildTimestamp, QueryCreator};
use crate::transform::{TransformError, TransformOptions, TransformReport, transform_with_report};
use crate::{debug, log};

/// Name the plugin registers its taps under.
pub const PLUGIN_NAME: &str = "HtmlScriptQueryPlugin";

const MODULE: &str = "host";

/// Construction options.
#[derive(Clone)]
pub struct PluginOptions {
    /// Per-script patch producer; `None` makes the plugin a no-op.
    ///
    /// Default: `{ _t: <build start millis> }`, captured once.
    pub query_creator: Option<Arc<dyn QueryCreator>>,
    /// Log per-node decisions to stderr. No behavioral effect.
    pub debug: bool,
    /// Explicit logger; takes precedence over `debug`.
    pub log: Option<Arc<dyn Log>>,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            query_creator: Some(Arc::new(BuildTimestamp::default())),
            debug: false,
            log: None,
        }
    }
}

impl PluginOptions {
    pub fn with_creator(mut self, creator: impl QueryCreator + 'static) -> Self {
        self.query_creator = Some(Arc::new(creator));
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = Some(log);
        self
    }
}

/// Outcome of [`ScriptQueryPlugin::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Tapped into the hook found by the named probe.
    Wired(&'static str),
    /// The host has no HTML generator or no known hook; build proceeds without us.
    NotWired,
}

struct Inner {
    query_creator: Option<Arc<dyn QueryCreator>>,
    log: Arc<dyn Log>,
}

/// Appends query strings to external scripts of every emitted document.
///
/// Cheap to clone; clones share the creator and logger.
#[derive(Clone)]
pub struct ScriptQueryPlugin {
    inner: Arc<Inner>,
}

impl Default for ScriptQueryPlugin {
    fn default() -> Self {
        Self::new(PluginOptions::default())
    }
}

impl ScriptQueryPlugin {
    pub fn new(options: PluginOptions) -> Self {
        let log: Arc<dyn Log> = match (options.log, options.debug) {
            (Some(log), _) => log,
            (None, true) => Arc::new(TermLog::new()),
            (None, false) => Arc::new(NoopLog),
        };
        debug!(log, MODULE; "init");

        Self {
            inner: Arc::new(Inner {
                query_creator: options.query_creator,
                log,
            }),
        }
    }

    #[inline]
    pub fn log(&self) -> &dyn Log {
        &*self.inner.log
    }

    /// Transform one document with this plugin's creator and logger.
    pub fn transform(&self, html: &str) -> Result<(String, TransformReport), TransformError> {
        self.transform_page(html, None)
    }

    /// [`transform`](Self::transform) for a document written to `page`.
    ///
    /// Creators resolving relative script URLs use the page's directory.
    pub fn transform_page(
        &self,
        html: &str,
        page: Option<&Path>,
    ) -> Result<(String, TransformReport), TransformError> {
        let options = TransformOptions {
            query_creator: self.inner.query_creator.as_deref(),
            log: self.log(),
            page,
        };
        transform_with_report(html, &options)
    }

    /// Replace `event.html` with the transformed document.
    ///
    /// Failures are logged and the original document passes through.
    pub fn process(&self, mut event: EmitEvent) -> EmitEvent {
        debug!(self.inner.log, MODULE; "transform start {}", event.output_name);
        match self.transform(&event.html) {
            Ok((html, _)) => event.html = html,
            Err(err) => {
                log!(self.inner.log, "error"; "{}: {err}, html left unchanged", event.output_name);
            }
        }
        debug!(self.inner.log, MODULE; "transform done {}", event.output_name);
        event
    }

    /// Wire into `host` using the default probes.
    pub fn apply(&self, host: &mut HostSurface) -> Applied {
        self.apply_with(host, &default_probes())
    }

    /// Wire into `host`, trying `probes` in order.
    pub fn apply_with(&self, host: &mut HostSurface, probes: &[Box<dyn HookProbe>]) -> Applied {
        debug!(self.inner.log, MODULE; "apply");
        if host.generator.is_none() {
            debug!(self.inner.log, MODULE; "end: html generator not found");
            return Applied::NotWired;
        }

        let Some(probe) = find_probe(probes, host) else {
            debug!(self.inner.log, MODULE; "end: no emission hook found");
            return Applied::NotWired;
        };
        let name = probe.name();
        let Some(hook) = probe.attach(host) else {
            debug!(self.inner.log, MODULE; "end: {name} could not attach");
            return Applied::NotWired;
        };

        let plugin = self.clone();
        hook.tap_async(PLUGIN_NAME, move |event: EmitEvent, done: Done| {
            done(Ok(plugin.process(event)));
        });
        debug!(self.inner.log, MODULE; "tapped {name}");
        Applied::Wired(name)
    }
}
