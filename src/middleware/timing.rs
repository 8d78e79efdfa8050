use super::{Middleware, Next};
use crate::error::RequestError;
use crate::server::{HttpRequest, HttpResponse};
use std::time::Instant;

/// Stamps successful responses with an `X-Response-Time-Ms` header holding
/// the whole-millisecond time spent in the stages it wraps.
///
/// Errors pass through untouched; the translated error response is produced
/// outside the chain.
#[derive(Debug, Default)]
pub struct ResponseTime;

impl ResponseTime {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for ResponseTime {
    fn handle(&self, req: HttpRequest, next: Next<'_>) -> Result<HttpResponse, RequestError> {
        let started = Instant::now();
        let mut resp = next.run(req)?;
        resp.set_header(
            "X-Response-Time-Ms",
            started.elapsed().as_millis().to_string(),
        );
        Ok(resp)
    }
}
