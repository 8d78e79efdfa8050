//! HTTP embedding: wire parsing, response writing, and the listener loop.
//!
//! The types here sit between may_minihttp and the worker pool. Nothing in
//! this module routes or runs handlers; it only turns wire requests into
//! [`HttpRequest`] jobs and worker responses back into bytes.

mod http_server;
mod request;
mod response;
mod service;

pub use self::http_server::{HttpServer, ServerHandle};
pub use self::request::{
    parse_request, HeaderVec, HttpRequest, ParamVec, RequestContext, RequestId,
    MAX_INLINE_HEADERS,
};
pub use self::response::{write_response, HttpResponse};
pub use self::service::{AppService, ServiceFactory};
