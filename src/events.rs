//! Synchronous lifecycle event bus.
//!
//! Hooks are registered per event name during application setup and invoked
//! in registration order whenever the event is dispatched. There is no
//! threading or queueing involved; dispatch runs the hooks inline on the
//! calling coroutine.

use anyhow::Context;
use std::collections::HashMap;

/// Fired once, before any worker is spawned. A failing hook aborts startup.
pub const SERVER_START: &str = "server.start";
/// Fired in each worker coroutine before it takes its first job.
pub const WORKER_START: &str = "worker.start";
/// Fired when the HTTP layer accepts a connection.
pub const CONNECTION_OPEN: &str = "connection.open";
/// Fired when a connection's service is torn down.
pub const CONNECTION_CLOSE: &str = "connection.close";

/// Payload handed to every hook. Fields are filled in where they make sense
/// for the event (`worker` for worker events, `connection` for connection
/// events) and left `None` otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookArgs {
    pub worker: Option<usize>,
    pub connection: Option<usize>,
}

impl HookArgs {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn worker(id: usize) -> Self {
        Self {
            worker: Some(id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn connection(id: usize) -> Self {
        Self {
            connection: Some(id),
            ..Self::default()
        }
    }
}

type Hook = Box<dyn Fn(&HookArgs) -> anyhow::Result<()> + Send + Sync>;

/// Registry of named events and their hooks.
///
/// Registration happens while the application is being assembled (`&mut`);
/// once serving starts the bus is shared immutably across coroutines, so
/// dispatch needs no locking.
#[derive(Default)]
pub struct EventBus {
    hooks: HashMap<String, Vec<Hook>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook to `event`, after any hooks already registered for it.
    pub fn on<F>(&mut self, event: &str, hook: F)
    where
        F: Fn(&HookArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.hooks
            .entry(event.to_string())
            .or_default()
            .push(Box::new(hook));
    }

    /// Invoke the hooks for `event` in registration order.
    ///
    /// An event with no hooks is a no-op. Hooks are not isolated from each
    /// other: the first hook that returns an error stops dispatch, and the
    /// remaining hooks for that event do not run for this dispatch.
    pub fn dispatch(&self, event: &str, args: &HookArgs) -> anyhow::Result<()> {
        let Some(hooks) = self.hooks.get(event) else {
            return Ok(());
        };
        for (idx, hook) in hooks.iter().enumerate() {
            hook(args).with_context(|| format!("hook {idx} for event {event:?} failed"))?;
        }
        Ok(())
    }
}
