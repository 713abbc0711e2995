//! Hook discovery across host API generations.
//!
//! Each strategy knows where one generation of the HTML generator exposes its
//! "HTML ready" hook. Strategies are tried in order; the first match wins.
//! Probing never changes the host; only [`HookProbe::attach`] may register
//! a hook.

use super::{AsyncHook, HostSurface};

/// Legacy event name fired after HTML processing.
pub const LEGACY_EVENT: &str = "html-after-processing";

/// Locates the emission hook for one host generation.
pub trait HookProbe: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Whether this generation's surface is present.
    fn detect(&self, host: &HostSurface) -> bool;

    /// The existing hook, if any.
    fn hook<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook>;

    /// The hook to tap into, registering it when the surface allows.
    fn attach<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook> {
        self.hook(host)
    }
}

/// Current generator API: per-compilation `before_emit` hook.
pub struct BeforeEmit;

impl HookProbe for BeforeEmit {
    fn name(&self) -> &'static str {
        "before-emit"
    }

    fn detect(&self, host: &HostSurface) -> bool {
        host.generator
            .as_ref()
            .is_some_and(|generator| generator.before_emit.is_some())
    }

    fn hook<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook> {
        host.generator.as_mut()?.before_emit.as_mut()
    }
}

/// Previous generator API: `after_html_processing` hook.
pub struct AfterHtmlProcessing;

impl HookProbe for AfterHtmlProcessing {
    fn name(&self) -> &'static str {
        "after-html-processing"
    }

    fn detect(&self, host: &HostSurface) -> bool {
        host.generator
            .as_ref()
            .is_some_and(|generator| generator.after_html_processing.is_some())
    }

    fn hook<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook> {
        host.generator.as_mut()?.after_html_processing.as_mut()
    }
}

/// Hosts without typed hooks: named event on the host event bus.
pub struct LegacyEvent;

impl HookProbe for LegacyEvent {
    fn name(&self) -> &'static str {
        "legacy-event"
    }

    fn detect(&self, host: &HostSurface) -> bool {
        host.events.is_some()
    }

    fn hook<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook> {
        host.events.as_mut()?.get_mut(LEGACY_EVENT)
    }

    fn attach<'a>(&self, host: &'a mut HostSurface) -> Option<&'a mut AsyncHook> {
        Some(host.events.as_mut()?.on(LEGACY_EVENT))
    }
}

/// Default probing order, newest generation first.
pub fn default_probes() -> Vec<Box<dyn HookProbe>> {
    vec![
        Box::new(BeforeEmit),
        Box::new(AfterHtmlProcessing),
        Box::new(LegacyEvent),
    ]
}

/// First probe whose surface is present on `host`.
pub fn find_probe<'p>(
    probes: &'p [Box<dyn HookProbe>],
    host: &HostSurface,
) -> Option<&'p dyn HookProbe> {
    probes
        .iter()
        .find(|probe| probe.detect(host))
        .map(|probe| &**probe)
}

/// Existing hook of the first matching probe, with the probe name.
pub fn find_hook<'a>(
    probes: &[Box<dyn HookProbe>],
    host: &'a mut HostSurface,
) -> Option<(&'static str, &'a mut AsyncHook)> {
    let probe = find_probe(probes, host)?;
    probe.hook(host).map(|hook| (probe.name(), hook))
}
