//! Worker lifecycle policy.
//!
//! Each worker tracks its own [`WorkerLifecycle`]; the policy decides when a
//! worker should stop taking new requests and be replaced. Restart requests
//! are deferred: a worker finishes the in-flight response first, then its
//! supervisor spawns a successor.

use serde::{Deserialize, Serialize};

/// Per-worker recycling policy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkerPolicy {
    /// Restart after every request. Keeps handler state from leaking between
    /// requests during development.
    pub dev: bool,
    /// Restart after serving this many requests.
    pub max_requests: Option<u64>,
    /// Restart after a handler error instead of dropping the connection.
    pub reload_on_exception: bool,
}

impl WorkerPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn dev(mut self, enabled: bool) -> Self {
        self.dev = enabled;
        self
    }

    #[must_use]
    pub fn max_requests(mut self, limit: Option<u64>) -> Self {
        self.max_requests = limit;
        self
    }

    #[must_use]
    pub fn reload_on_exception(mut self, enabled: bool) -> Self {
        self.reload_on_exception = enabled;
        self
    }
}

/// Where a worker is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    /// Serving requests.
    Running,
    /// A restart has been decided; the current response still goes out.
    ReloadPending,
    /// The worker has stopped pulling work and is shutting down.
    Restarting,
}

/// Tracks one worker's position against its policy.
///
/// `ReloadPending` is sticky: once set it survives further requests until
/// [`begin_restart`] moves the worker to `Restarting`.
///
/// [`begin_restart`]: WorkerLifecycle::begin_restart
#[derive(Debug, Clone)]
pub struct WorkerLifecycle {
    policy: WorkerPolicy,
    remaining: Option<u64>,
    state: WorkerState,
}

impl WorkerLifecycle {
    #[must_use]
    pub fn new(policy: WorkerPolicy) -> Self {
        Self {
            policy,
            remaining: policy.max_requests,
            state: WorkerState::Running,
        }
    }

    #[must_use]
    pub fn state(&self) -> WorkerState {
        self.state
    }

    #[must_use]
    pub fn policy(&self) -> &WorkerPolicy {
        &self.policy
    }

    /// Record a handler failure. Marks the worker for reload when the policy
    /// asks for it.
    pub fn note_exception(&mut self) {
        if self.policy.reload_on_exception && self.state == WorkerState::Running {
            self.state = WorkerState::ReloadPending;
        }
    }

    /// Record a completed response and decide whether the worker should now
    /// be replaced. Returns `true` when a reload is pending.
    pub fn after_response(&mut self) -> bool {
        if self.state == WorkerState::Running {
            if self.policy.dev {
                self.state = WorkerState::ReloadPending;
            } else if let Some(remaining) = self.remaining.as_mut() {
                if *remaining == 0 {
                    self.state = WorkerState::ReloadPending;
                } else {
                    *remaining -= 1;
                }
            }
        }
        self.state == WorkerState::ReloadPending
    }

    /// Transition into `Restarting`. Called once the in-flight response has
    /// been sent.
    pub fn begin_restart(&mut self) {
        self.state = WorkerState::Restarting;
    }
}
