//! Async-style tap hooks carrying HTML emission events.

use crossbeam::channel::{self, RecvTimeoutError};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// One HTML emission from the host's HTML generation step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitEvent {
    /// Generated document.
    pub html: String,
    /// Output file name the document is emitted under.
    pub output_name: String,
    /// Other host fields, passed through unchanged.
    pub fields: BTreeMap<String, String>,
}

impl EmitEvent {
    pub fn new(output_name: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            output_name: output_name.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Hook failures reported back to the host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("tap `{0}` dropped its completion callback")]
    Abandoned(String),

    #[error("tap `{tap}` failed: {message}")]
    Failed { tap: String, message: String },

    #[error("tap `{0}` did not complete in time")]
    TimedOut(String),
}

/// Completion callback handed to each tap.
pub type Done = Box<dyn FnOnce(Result<EmitEvent, HookError>) + Send>;

/// Tap body: receives the event and must eventually call `Done`.
pub type TapFn = Box<dyn FnMut(EmitEvent, Done) + Send>;

/// Ordered list of named async taps.
#[derive(Default)]
pub struct AsyncHook {
    taps: Vec<(String, TapFn)>,
}

impl AsyncHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` under `name`; taps run in registration order.
    pub fn tap_async<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnMut(EmitEvent, Done) + Send + 'static,
    {
        self.taps.push((name.into(), Box::new(callback)));
    }

    /// Names of registered taps.
    pub fn taps(&self) -> impl Iterator<Item = &str> {
        self.taps.iter().map(|(name, _)| name.as_str())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Run every tap in series, each receiving the previous tap's output.
    ///
    /// Blocks until each tap signals completion. A tap that holds on to its
    /// `Done` without ever calling it blocks forever; use
    /// [`call_timeout`](Self::call_timeout) when taps are not trusted.
    pub fn call(&mut self, event: EmitEvent) -> Result<EmitEvent, HookError> {
        self.run(event, None)
    }

    /// [`call`](Self::call), giving each tap at most `timeout` to complete.
    pub fn call_timeout(
        &mut self,
        event: EmitEvent,
        timeout: Duration,
    ) -> Result<EmitEvent, HookError> {
        self.run(event, Some(timeout))
    }

    fn run(
        &mut self,
        mut event: EmitEvent,
        timeout: Option<Duration>,
    ) -> Result<EmitEvent, HookError> {
        for (name, tap) in &mut self.taps {
            let (tx, rx) = channel::bounded(1);
            tap(
                event,
                Box::new(move |result: Result<EmitEvent, HookError>| {
                    tx.send(result).ok();
                }),
            );
            event = match timeout {
                None => rx
                    .recv()
                    .map_err(|_| HookError::Abandoned(name.clone()))??,
                Some(timeout) => rx.recv_timeout(timeout).map_err(|err| match err {
                    RecvTimeoutError::Timeout => HookError::TimedOut(name.clone()),
                    RecvTimeoutError::Disconnected => HookError::Abandoned(name.clone()),
                })??,
            };
        }
        Ok(event)
    }
}

impl std::fmt::Debug for AsyncHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHook")
            .field("taps", &self.taps().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taps_run_in_order() {
        let mut hook = AsyncHook::new();
        hook.tap_async("a", |mut event: EmitEvent, done: Done| {
            event.html.push('a');
            done(Ok(event));
        });
        hook.tap_async("b", |mut event: EmitEvent, done: Done| {
            event.html.push('b');
            done(Ok(event));
        });

        let out = hook.call(EmitEvent::new("index.html", "")).unwrap();
        assert_eq!(out.html, "ab");
        assert_eq!(hook.taps().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_completion_from_another_thread() {
        let mut hook = AsyncHook::new();
        hook.tap_async("thread", |mut event: EmitEvent, done: Done| {
            std::thread::spawn(move || {
                event.html = "done".into();
                done(Ok(event));
            });
        });
        assert_eq!(hook.call(EmitEvent::default()).unwrap().html, "done");
    }

    #[test]
    fn test_abandoned_tap() {
        let mut hook = AsyncHook::new();
        hook.tap_async("lost", |_event: EmitEvent, _done: Done| {});
        assert_eq!(
            hook.call(EmitEvent::default()),
            Err(HookError::Abandoned("lost".into()))
        );
    }

    #[test]
    fn test_stalled_tap_times_out() {
        let (keep_tx, keep_rx) = channel::unbounded::<Done>();
        let mut hook = AsyncHook::new();
        hook.tap_async("stall", move |_event: EmitEvent, done: Done| {
            // Keep `Done` alive without calling it
            keep_tx.send(done).ok();
        });

        let result = hook.call_timeout(EmitEvent::default(), Duration::from_millis(20));
        assert_eq!(result, Err(HookError::TimedOut("stall".into())));
        assert_eq!(keep_rx.len(), 1);
    }

    #[test]
    fn test_call_timeout_reports_abandoned_tap() {
        let mut hook = AsyncHook::new();
        hook.tap_async("fast", |mut event: EmitEvent, done: Done| {
            event.html.push('x');
            done(Ok(event));
        });
        hook.tap_async("lost", |_event: EmitEvent, _done: Done| {});

        let result = hook.call_timeout(EmitEvent::default(), Duration::from_secs(5));
        assert_eq!(result, Err(HookError::Abandoned("lost".into())));
    }

    #[test]
    fn test_failed_tap_stops_chain() {
        let mut hook = AsyncHook::new();
        hook.tap_async("fail", |_event: EmitEvent, done: Done| {
            done(Err(HookError::Failed {
                tap: "fail".into(),
                message: "boom".into(),
            }));
        });
        hook.tap_async("never", |_event: EmitEvent, _done: Done| {
            panic!("must not run");
        });
        assert!(matches!(
            hook.call(EmitEvent::default()),
            Err(HookError::Failed { .. })
        ));
    }

    #[test]
    fn test_fields_pass_through() {
        let event = EmitEvent::new("a.html", "<p>").with_field("chunk", "main");
        let mut hook = AsyncHook::new();
        hook.tap_async("noop", |event: EmitEvent, done: Done| done(Ok(event)));
        let out = hook.call(event.clone()).unwrap();
        assert_eq!(out, event);
    }
}
