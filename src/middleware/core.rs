use crate::error::{ConfigurationError, RequestError};
use crate::router::{RouteMatch, RouteTable};
use crate::server::{HttpRequest, HttpResponse};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::info;

use super::RouterStage;

/// Priority at which the routing stage runs. Reserved; [`Pipeline::register`]
/// rejects it.
pub const ROUTER_STAGE_PRIORITY: i32 = 1000;

/// A single stage of the assembled chain.
pub(crate) type Stage = dyn Fn(HttpRequest) -> Result<HttpResponse, RequestError> + Send + Sync;

/// A middleware wraps the stages registered after it (higher priority) plus
/// the routing stage and the selected handler.
///
/// Calling [`Next::run`] hands the request to the rest of the chain; skipping
/// it short-circuits with the middleware's own response. `next` is consumed by
/// `run`, so the rest of the chain can execute at most once per request.
pub trait Middleware: Send + Sync {
    fn handle(&self, req: HttpRequest, next: Next<'_>) -> Result<HttpResponse, RequestError>;
}

impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn handle(&self, req: HttpRequest, next: Next<'_>) -> Result<HttpResponse, RequestError> {
        (**self).handle(req, next)
    }
}

/// Continuation for the remainder of the chain.
pub struct Next<'a> {
    inner: &'a Stage,
}

impl Next<'_> {
    /// Run the rest of the chain. Consumes the continuation.
    pub fn run(self, req: HttpRequest) -> Result<HttpResponse, RequestError> {
        (self.inner)(req)
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Ordered registry of middleware, keyed by priority.
///
/// Lower priorities run first on the way in and last on the way out. The
/// routing stage is always present at [`ROUTER_STAGE_PRIORITY`], so stages
/// registered above it run between route selection and the handler.
#[derive(Clone, Default)]
pub struct Pipeline {
    entries: BTreeMap<i32, Arc<dyn Middleware>>,
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware at the given priority.
    ///
    /// Fails with [`ConfigurationError::ReservedPriority`] for the routing
    /// stage's slot and [`ConfigurationError::DuplicatePriority`] when the
    /// priority is already taken.
    pub fn register<M>(&mut self, priority: i32, middleware: M) -> Result<(), ConfigurationError>
    where
        M: Middleware + 'static,
    {
        if priority == ROUTER_STAGE_PRIORITY {
            return Err(ConfigurationError::ReservedPriority(priority));
        }
        match self.entries.entry(priority) {
            Entry::Occupied(_) => Err(ConfigurationError::DuplicatePriority(priority)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(middleware));
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compose the registered stages and the routing stage into a callable
    /// chain over the given route table.
    #[must_use]
    pub fn assemble(&self, table: Arc<RouteTable>) -> Chain {
        let mut stages = self.entries.clone();
        stages.insert(
            ROUTER_STAGE_PRIORITY,
            Arc::new(RouterStage::new(table)) as Arc<dyn Middleware>,
        );

        // Fold from the innermost stage outward so that lower priorities end
        // up wrapping higher ones.
        let mut head: Arc<Stage> = Arc::new(invoke_selected);
        for (_, middleware) in stages.iter().rev() {
            let middleware = Arc::clone(middleware);
            let inner = head;
            head = Arc::new(move |req| {
                middleware.handle(
                    req,
                    Next {
                        inner: inner.as_ref(),
                    },
                )
            });
        }

        info!(stages = stages.len(), "middleware chain assembled");
        Chain { head }
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("priorities", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The assembled middleware chain for one worker.
#[derive(Clone)]
pub struct Chain {
    head: Arc<Stage>,
}

impl Chain {
    /// Run a request through every stage down to the handler.
    pub fn run(&self, req: HttpRequest) -> Result<HttpResponse, RequestError> {
        (self.head)(req)
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain").finish_non_exhaustive()
    }
}

/// Terminal stage: invoke the handler recorded by the routing stage.
///
/// Handler panics are caught and surfaced as [`RequestError::Handler`] so a
/// panicking handler cannot take the worker coroutine down with it.
fn invoke_selected(req: HttpRequest) -> Result<HttpResponse, RequestError> {
    let Some(selected) = req.context.get::<RouteMatch>().cloned() else {
        return Err(RequestError::Handler(anyhow::anyhow!(
            "no route selection in request context"
        )));
    };

    match catch_unwind(AssertUnwindSafe(|| selected.handler.handle(req))) {
        Ok(Ok(resp)) => Ok(resp),
        Ok(Err(err)) => Err(RequestError::Handler(err)),
        Err(panic) => Err(RequestError::Handler(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(panic.as_ref())
        ))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
