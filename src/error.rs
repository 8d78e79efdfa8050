//! Error taxonomy shared by the routing, pipeline, and worker layers.
//!
//! Two families with different lifetimes:
//!
//! - [`ConfigurationError`] is raised while the route table or middleware
//!   pipeline is being built. It is startup-fatal and never reaches a client.
//! - [`RequestError`] is raised while a request travels the pipeline and is
//!   turned into an HTTP response by [`ErrorTranslator`].

use crate::server::HttpResponse;
use http::{Method, StatusCode};
use thiserror::Error;

/// Rejected registration detected while building the route table or the
/// middleware pipeline. Startup aborts; nothing is served half-configured.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("route {method} {pattern} is already registered")]
    DuplicateRoute { method: Method, pattern: String },

    /// Two patterns whose literals and placeholder positions are identical
    /// (only the placeholder names differ) would race for the same requests.
    #[error("routes {first} and {second} are ambiguous for {method}")]
    AmbiguousRoute {
        method: Method,
        first: String,
        second: String,
    },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("middleware priority {0} is already registered")]
    DuplicatePriority(i32),

    #[error("middleware priority {0} is reserved for the router stage")]
    ReservedPriority(i32),
}

/// Failure raised while a request travels the middleware chain.
///
/// Anything a handler (or a middleware acting on its behalf) fails with ends
/// up in the [`Handler`](RequestError::Handler) catch-all; the two routing
/// variants are raised by the router stage before a handler is ever selected.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("no route matches the request path")]
    RouteNotFound,

    #[error("method not allowed (allowed: {allowed:?})")]
    MethodNotAllowed { allowed: Vec<Method> },

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

impl RequestError {
    /// HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            RequestError::RouteNotFound => 404,
            RequestError::MethodNotAllowed { .. } => 405,
            RequestError::Handler(_) => 500,
        }
    }
}

/// Canonical reason phrase for a status code (`404` → `Not Found`).
#[must_use]
pub fn status_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown")
}

fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turns a [`RequestError`] into the plain-text HTTP response the client sees.
///
/// Translation is pure and infallible; whatever happens upstream, the client
/// gets a well-formed status line and body.
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    dev: bool,
}

impl ErrorTranslator {
    /// `dev` controls whether 500 bodies carry the underlying error message
    /// or only the canonical phrase.
    #[must_use]
    pub fn new(dev: bool) -> Self {
        Self { dev }
    }

    #[must_use]
    pub fn translate(&self, err: &RequestError) -> HttpResponse {
        match err {
            RequestError::RouteNotFound => HttpResponse::text(404, status_phrase(404)),
            RequestError::MethodNotAllowed { allowed } => {
                let list = join_methods(allowed);
                let body = format!("{} Allowed methods: {}", status_phrase(405), list);
                HttpResponse::text(405, body).with_header("Allow", list)
            }
            RequestError::Handler(cause) => {
                let body = if self.dev {
                    cause.to_string()
                } else {
                    status_phrase(500).to_string()
                };
                HttpResponse::text(500, body)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn not_found_uses_canonical_phrase() {
        let resp = ErrorTranslator::new(false).translate(&RequestError::RouteNotFound);
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body_text(), "Not Found");
    }

    #[test]
    fn method_not_allowed_lists_methods() {
        let err = RequestError::MethodNotAllowed {
            allowed: vec![Method::GET, Method::PUT],
        };
        let resp = ErrorTranslator::new(false).translate(&err);
        assert_eq!(resp.status, 405);
        assert_eq!(
            resp.body_text(),
            "Method Not Allowed Allowed methods: GET, PUT"
        );
        assert_eq!(resp.header("allow"), Some("GET, PUT"));
    }

    #[test]
    fn handler_error_message_only_in_dev() {
        let err = RequestError::Handler(anyhow!("database exploded"));
        let dev = ErrorTranslator::new(true).translate(&err);
        assert_eq!(dev.status, 500);
        assert_eq!(dev.body_text(), "database exploded");

        let prod = ErrorTranslator::new(false).translate(&err);
        assert_eq!(prod.status, 500);
        assert_eq!(prod.body_text(), "Internal Server Error");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RequestError::RouteNotFound.status(), 404);
        assert_eq!(
            RequestError::MethodNotAllowed { allowed: vec![] }.status(),
            405
        );
        assert_eq!(RequestError::Handler(anyhow!("x")).status(), 500);
    }
}
