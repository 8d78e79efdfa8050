//! # CLI Module
//!
//! Command-line surface for the server binary.
//!
//! ## Commands
//!
//! The first positional argument is the lifecycle command:
//!
//! ```bash
//! maypole start -p 8080 -w 4
//! ```
//!
//! Only `start` is implemented in-process. `stop`, `status`, `restart`,
//! `reload`, and `connections` are accepted for familiarity but delegated to
//! whatever supervises the process (systemd, supervisord, a container
//! runtime); invoking them explains that and exits non-zero.
//!
//! ## Options
//!
//! - `-p, --port <PORT>` bind port (default 8080)
//! - `-l, --listen <ADDR>` bind interface (default 0.0.0.0)
//! - `-w, --workers <N>` request workers (default 4)
//! - `-R, --reuse_port` accepted and ignored
//! - `-d, --dev` restart workers every request, verbose error bodies
//! - `-m, --max-request <N>` restart workers after N requests
//! - `-r, --reload-on-exception` restart workers after handler errors

use crate::config::ServerConfig;
use crate::worker::WorkerPolicy;
use clap::{Parser, ValueEnum};
use std::fmt;

/// Command-line interface for the server binary.
#[derive(Debug, Parser)]
#[command(name = "maypole")]
#[command(version, about = "Coroutine HTTP server with recyclable workers", long_about = None)]
pub struct ServerCli {
    /// Lifecycle command to run
    #[arg(value_enum)]
    pub server_command: ServerCommand,

    /// TCP port to bind
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    /// Interface to bind
    #[arg(short, long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Number of request workers
    #[arg(short, long, default_value_t = 4)]
    pub workers: usize,

    /// Ask for SO_REUSEPORT on the listener (accepted and ignored)
    #[arg(short = 'R', long = "reuse_port", default_value_t = false)]
    pub reuse_port: bool,

    /// Development mode: workers restart after every request and error
    /// responses carry the failure message
    #[arg(short, long, default_value_t = false)]
    pub dev: bool,

    /// Restart each worker after serving this many requests
    #[arg(short, long = "max-request")]
    pub max_request: Option<u64>,

    /// Restart a worker after a handler error instead of dropping the
    /// connection
    #[arg(short, long, default_value_t = false)]
    pub reload_on_exception: bool,
}

impl ServerCli {
    /// Server settings implied by the parsed flags.
    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            listen: self.listen.clone(),
            port: self.port,
            workers: self.workers,
            reuse_port: self.reuse_port,
        }
    }

    /// Worker recycling policy implied by the parsed flags.
    #[must_use]
    pub fn worker_policy(&self) -> WorkerPolicy {
        WorkerPolicy::new()
            .dev(self.dev)
            .max_requests(self.max_request)
            .reload_on_exception(self.reload_on_exception)
    }
}

/// Lifecycle commands accepted on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServerCommand {
    /// Boot the worker pool and serve until signalled
    Start,
    /// Stop a running server (delegated to the process manager)
    Stop,
    /// Report on a running server (delegated to the process manager)
    Status,
    /// Restart a running server (delegated to the process manager)
    Restart,
    /// Recycle the workers of a running server (delegated to the process manager)
    Reload,
    /// Show connection statistics (delegated to the process manager)
    Connections,
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServerCommand::Start => "start",
            ServerCommand::Stop => "stop",
            ServerCommand::Status => "status",
            ServerCommand::Restart => "restart",
            ServerCommand::Reload => "reload",
            ServerCommand::Connections => "connections",
        };
        f.write_str(name)
    }
}
