//! # Dispatcher Module
//!
//! The dispatcher is the seam between a worker and the request pipeline. It
//! owns the assembled middleware [`Chain`] plus the [`ErrorTranslator`] and
//! decides, per request, whether a failure becomes an HTTP error response or
//! is handed back to the worker loop.
//!
//! ## Request Flow
//!
//! 1. The worker pulls a parsed request off the shared job channel
//! 2. [`Dispatcher::dispatch`] runs it through the chain (middleware, route
//!    lookup, handler)
//! 3. Routing failures are translated to `404`/`405` responses
//! 4. Handler failures either translate to `500` (when the worker's policy
//!    reloads on exception) or propagate as a fatal worker error
//!
//! ## Error Handling
//!
//! Failures never take a worker coroutine down by surprise: handler panics
//! are already caught inside the chain, and the reload-on-exception policy
//! turns crashes into a clean worker replacement after the response has been
//! sent.
//!
//! [`Chain`]: crate::middleware::Chain
//! [`ErrorTranslator`]: crate::error::ErrorTranslator

mod core;

pub use self::core::Dispatcher;
