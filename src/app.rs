//! # Application Module
//!
//! The top-level builder that ties routes, middleware, and lifecycle hooks
//! together, then boots the worker pool and the HTTP front end.
//!
//! ## Embedding
//!
//! ```no_run
//! # fn main() -> anyhow::Result<()> {
//! use maypole::app::App;
//! use maypole::config::ServerConfig;
//! use maypole::router::RouteDescriptor;
//! use maypole::server::{HttpRequest, HttpResponse};
//! use maypole::worker::WorkerPolicy;
//!
//! let server = App::new()
//!     .route(RouteDescriptor::get("/ping", |_req: HttpRequest| {
//!         Ok(HttpResponse::text(200, "pong"))
//!     }))
//!     .serve(ServerConfig::default(), WorkerPolicy::default())?;
//! server.wait_ready()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Running as a binary
//!
//! [`App::run`] parses the command line and executes `start` as
//! serve-then-wait-for-SIGINT/SIGTERM. The other lifecycle commands
//! (`stop`, `status`, ...) belong to whatever supervises the process and
//! return an explanatory error.

use crate::cli::{ServerCli, ServerCommand};
use crate::config::{RuntimeConfig, ServerConfig};
use crate::error::{ConfigurationError, ErrorTranslator};
use crate::events::{EventBus, HookArgs, SERVER_START};
use crate::middleware::{Middleware, Pipeline};
use crate::pool::{PoolMetrics, WorkerBlueprint, WorkerPool};
use crate::router::{RouteDescriptor, RouteSource};
use crate::server::{HttpServer, ServerHandle, ServiceFactory};
use crate::worker::WorkerPolicy;
use anyhow::Context as _;
use clap::Parser as _;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for a complete application.
///
/// Collects routes, middleware registrations, and event hooks, then
/// [`serve`](App::serve) boots everything and hands back a [`Server`].
#[derive(Default)]
pub struct App {
    routes: Vec<RouteDescriptor>,
    pipeline: Pipeline,
    events: EventBus,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one route.
    #[must_use]
    pub fn route(mut self, descriptor: RouteDescriptor) -> Self {
        self.routes.push(descriptor);
        self
    }

    /// Add every route a source produces, in the source's order.
    #[must_use]
    pub fn routes_from(mut self, source: &dyn RouteSource) -> Self {
        self.routes.extend(source.routes());
        self
    }

    /// Register a middleware at `priority`.
    ///
    /// Fails if the priority is already taken or reserved for the router
    /// stage; the pipeline is unchanged on failure.
    pub fn middleware<M>(mut self, priority: i32, middleware: M) -> Result<Self, ConfigurationError>
    where
        M: Middleware + 'static,
    {
        self.pipeline.register(priority, middleware)?;
        Ok(self)
    }

    /// Register a lifecycle hook for `event`.
    #[must_use]
    pub fn on<F>(mut self, event: &str, hook: F) -> Self
    where
        F: Fn(&HookArgs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on(event, hook);
        self
    }

    /// Validate the configuration, fire `server.start`, and boot the pool
    /// plus the HTTP listener.
    ///
    /// A failing `server.start` hook aborts startup, as does an invalid
    /// route set or an unbindable address.
    pub fn serve(self, config: ServerConfig, policy: WorkerPolicy) -> anyhow::Result<Server> {
        if config.reuse_port {
            warn!("reuse_port requested but the embedded listener does not support it");
        }

        let runtime = RuntimeConfig::from_env();
        may::config().set_stack_size(runtime.stack_size);

        let events = Arc::new(self.events);
        events
            .dispatch(SERVER_START, &HookArgs::none())
            .context("server.start hook failed")?;

        let blueprint = WorkerBlueprint {
            routes: Arc::new(self.routes),
            pipeline: self.pipeline,
            policy,
            translator: ErrorTranslator::new(policy.dev),
            events: Arc::clone(&events),
        };
        let pool = WorkerPool::start(blueprint, config.workers, runtime.stack_size)?;

        let factory = ServiceFactory::new(pool.sender(), events);
        let handle = HttpServer(factory)
            .start(config.addr())
            .with_context(|| format!("binding {}", config.addr()))?;

        info!(
            addr = %config.addr(),
            workers = config.workers,
            dev = policy.dev,
            "server started"
        );
        Ok(Server { handle, pool })
    }

    /// Parse the command line and run the server until signalled.
    pub fn run(self) -> anyhow::Result<()> {
        self.run_from(ServerCli::parse())
    }

    /// Like [`run`](App::run) with pre-parsed arguments.
    pub fn run_from(self, cli: ServerCli) -> anyhow::Result<()> {
        if cli.server_command != ServerCommand::Start {
            anyhow::bail!(
                "`{}` is handled by your process manager (systemd, supervisord, a container \
                 runtime); this binary only implements `start`",
                cli.server_command
            );
        }

        let server = self.serve(cli.server_config(), cli.worker_policy())?;
        let signal = wait_for_shutdown()?;
        info!(signal, "shutdown signal received");
        server.stop();
        Ok(())
    }
}

/// A running server: the HTTP listener plus the worker pool behind it.
pub struct Server {
    handle: ServerHandle,
    pool: WorkerPool,
}

impl Server {
    /// The address the listener was asked to bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.handle.addr()
    }

    /// Wait until the listener accepts connections.
    pub fn wait_ready(&self) -> io::Result<()> {
        self.handle.wait_ready()
    }

    /// Pool supervision counters.
    #[must_use]
    pub fn pool_metrics(&self) -> Arc<PoolMetrics> {
        Arc::clone(self.pool.metrics())
    }

    /// Stop accepting connections, then let the workers drain.
    pub fn stop(self) {
        self.handle.stop();
        drop(self.pool);
    }
}

#[cfg(unix)]
fn wait_for_shutdown() -> anyhow::Result<i32> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("installing signal handlers")?;
    Ok(signals.forever().next().unwrap_or(SIGTERM))
}

#[cfg(not(unix))]
fn wait_for_shutdown() -> anyhow::Result<i32> {
    // No signal iterator here; park until the process is killed.
    loop {
        std::thread::park();
    }
}
