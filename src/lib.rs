//! # Maypole
//!
//! **Maypole** is a coroutine-powered HTTP application core for Rust: a
//! routing table, a priority-ordered middleware pipeline, and a pool of
//! recyclable request workers, served over the `may` runtime.
//!
//! ## Overview
//!
//! Maypole borrows its process model from multi-process PHP/Python app
//! servers: a fixed set of workers each own their routing state, handle one
//! request at a time, and get recycled according to a lifecycle policy
//! (every request in dev mode, after N requests, or after a handler error).
//! Here the workers are `may` coroutines instead of OS processes, and
//! "restart" is an in-process supervisor message instead of a signal.
//!
//! ## Architecture
//!
//! - **[`router`]** - Route descriptors, pattern compilation, and method +
//!   path lookup with URL argument extraction
//! - **[`middleware`]** - Priority-keyed pipeline composed into a
//!   next-continuation chain, with built-in router, timing, and metrics
//!   stages
//! - **[`dispatcher`]** - Runs the chain for one request and applies the
//!   error translation / worker policy rules
//! - **[`worker`]** - The recycling policy state machine
//! - **[`pool`]** - Worker coroutines, the shared job channel, and the
//!   supervisor that replaces retired or faulted workers
//! - **[`server`]** - `may_minihttp` adapter: wire request/response types
//!   and the per-connection service
//! - **[`events`]** - Synchronous lifecycle hooks (`server.start`,
//!   `worker.start`, `connection.open`, `connection.close`)
//! - **[`error`]** - Configuration and request error enums plus the
//!   error-to-response translator
//! - **[`app`]** - The builder that wires all of the above and boots it
//! - **[`cli`]**, **[`config`]** - Command-line surface and settings
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Conn as Connection<br/>(may_minihttp)
//!     participant Pool as Job Channel
//!     participant Worker as Worker<br/>(coroutine)
//!     participant Chain as Middleware Chain
//!     participant Handler
//!
//!     Client->>Conn: HTTP request
//!     Conn->>Conn: parse into HttpRequest
//!     Conn->>Pool: Job { request, reply }
//!     Pool->>Worker: recv()
//!     Worker->>Chain: run(request)
//!     Chain->>Chain: stages by ascending priority
//!     Chain->>Handler: terminal invocation
//!     Handler-->>Chain: Result<HttpResponse>
//!     Chain-->>Worker: response or RequestError
//!     Worker->>Worker: translate errors,<br/>apply worker policy
//!     Worker-->>Conn: reply channel
//!     Conn-->>Client: HTTP response
//! ```
//!
//! Routing errors become 404/405 responses. Handler errors become 500s when
//! `reload_on_exception` is set (the worker restarts afterwards); otherwise
//! they are fatal to the worker and the connection gets no response.
//!
//! ## Quick Start
//!
//! ```no_run
//! use maypole::{App, HttpRequest, HttpResponse, RouteDescriptor};
//!
//! fn main() -> anyhow::Result<()> {
//!     App::new()
//!         .route(RouteDescriptor::get("/hello/{name}", |req: HttpRequest| {
//!             let name = req.route_arg("name").unwrap_or("world");
//!             Ok(HttpResponse::text(200, format!("hello {name}")))
//!         }))
//!         .run()
//! }
//! ```
//!
//! ## Runtime Considerations
//!
//! Maypole uses the `may` coroutine runtime, not tokio or async-std:
//!
//! - Handlers run on worker coroutines; blocking operations should use
//!   `may`'s blocking facilities
//! - Coroutine stack size is configurable via the `MAYPOLE_STACK_SIZE`
//!   environment variable (decimal or `0x` hex)
//! - Handler panics are caught and folded into the error policy, so the
//!   crate must be built with unwinding panics (the default)

pub mod app;
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod middleware;
pub mod pool;
pub mod router;
pub mod server;
pub mod worker;

pub use app::{App, Server};
pub use config::ServerConfig;
pub use error::{ConfigurationError, ErrorTranslator, RequestError};
pub use router::{Handler, RouteDescriptor, RouteSource};
pub use server::{HttpRequest, HttpResponse};
pub use worker::WorkerPolicy;
