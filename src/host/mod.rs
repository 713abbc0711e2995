//! Host build integration.
//!
//! The host is whatever build tool generates HTML. It is modeled only by the
//! surface this crate needs: somewhere to register a callback that receives
//! each emitted document and hands back the replacement.
//!
//! - `hook`: `EmitEvent`, `AsyncHook` (tap + completion callback)
//! - `probe`: ordered strategies locating the hook across host generations

mod hook;
mod probe;

pub use hook::{AsyncHook, Done, EmitEvent, HookError, TapFn};
pub use probe::{
    AfterHtmlProcessing, BeforeEmit, HookProbe, LEGACY_EVENT, LegacyEvent, default_probes,
    find_hook, find_probe,
};

use rustc_hash::FxHashMap;

/// Hooks exposed by the host's HTML generation step.
#[derive(Debug, Default)]
pub struct GeneratorHooks {
    /// Current API: fired right before a document is emitted.
    pub before_emit: Option<AsyncHook>,
    /// Previous API: fired after the generator finished its own processing.
    pub after_html_processing: Option<AsyncHook>,
}

/// Named event registry of hosts without typed hooks.
#[derive(Debug, Default)]
pub struct EventBus {
    events: FxHashMap<String, AsyncHook>,
}

impl EventBus {
    /// Hook for `event`, created on first use.
    pub fn on(&mut self, event: &str) -> &mut AsyncHook {
        self.events.entry(event.to_string()).or_default()
    }

    /// Hook for `event`, if anyone registered one.
    pub fn get_mut(&mut self, event: &str) -> Option<&mut AsyncHook> {
        self.events.get_mut(event)
    }

    pub fn contains(&self, event: &str) -> bool {
        self.events.contains_key(event)
    }

    /// Fire `event`; events nobody listens to pass the payload through.
    pub fn emit(&mut self, event: &str, payload: EmitEvent) -> Result<EmitEvent, HookError> {
        match self.events.get_mut(event) {
            Some(hook) => hook.call(payload),
            None => Ok(payload),
        }
    }
}

/// What a host build exposes to plugins.
#[derive(Debug, Default)]
pub struct HostSurface {
    /// `None` when the build has no HTML generation step.
    pub generator: Option<GeneratorHooks>,
    /// Event bus of legacy hosts.
    pub events: Option<EventBus>,
}

impl HostSurface {
    /// Host with the current generator API.
    pub fn with_before_emit() -> Self {
        Self {
            generator: Some(GeneratorHooks {
                before_emit: Some(AsyncHook::new()),
                after_html_processing: None,
            }),
            events: None,
        }
    }

    /// Host with the previous generator API.
    pub fn with_after_html_processing() -> Self {
        Self {
            generator: Some(GeneratorHooks {
                before_emit: None,
                after_html_processing: Some(AsyncHook::new()),
            }),
            events: None,
        }
    }

    /// Legacy host: generator present, hooks only through the event bus.
    pub fn legacy() -> Self {
        Self {
            generator: Some(GeneratorHooks::default()),
            events: Some(EventBus::default()),
        }
    }

    /// Emit one document through whichever hook the default probes find.
    ///
    /// Documents pass through unchanged when no hook is registered.
    ///
    /// Used by hosts driving the emission themselves and by tests.
    pub fn emit(&mut self, event: EmitEvent) -> Result<EmitEvent, HookError> {
        match find_hook(&default_probes(), self) {
            Some((_, hook)) => hook.call(event),
            None => Ok(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_bus_unknown_event_passes_through() {
        let mut bus = EventBus::default();
        let event = EmitEvent::new("a.html", "<p>");
        assert_eq!(bus.emit("nothing", event.clone()).unwrap(), event);
    }

    #[test]
    fn test_event_bus_on_reuses_hook() {
        let mut bus = EventBus::default();
        bus.on(LEGACY_EVENT)
            .tap_async("x", |event: EmitEvent, done: Done| done(Ok(event)));
        assert_eq!(bus.on(LEGACY_EVENT).taps().count(), 1);
    }

    #[test]
    fn test_emit_without_generator() {
        let mut host = HostSurface::default();
        let event = EmitEvent::new("a.html", "<p>");
        assert_eq!(host.emit(event.clone()).unwrap(), event);
    }
}
