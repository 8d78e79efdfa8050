use super::request::HeaderVec;
use crate::error::status_phrase;
use dashmap::DashMap;
use may_minihttp::Response;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::sync::Arc;

/// An owned HTTP response produced by a handler or middleware.
///
/// String bodies go to the wire as `text/plain`, everything else as
/// `application/json`, unless an explicit `Content-Type` header was set.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderVec,
    pub body: Value,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Plain-text response.
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, HeaderVec::new(), Value::String(body.into()))
    }

    /// JSON response.
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, HeaderVec::new(), body)
    }

    /// Get a header by name (case-insensitive).
    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (name match is case-insensitive).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// The body as text; empty for non-string bodies.
    #[must_use]
    pub fn body_text(&self) -> &str {
        self.body.as_str().unwrap_or_default()
    }
}

const HEADER_CACHE_CAP: usize = 1024;

// minihttp takes whole header lines as `&'static str`. Distinct lines are
// interned and leaked once; past the cap each response leaks its own line.
static HEADER_LINES: Lazy<DashMap<String, &'static str>> = Lazy::new(DashMap::new);

fn intern_header_line(name: &str, value: &str) -> &'static str {
    let line = format!("{name}: {value}");
    if let Some(cached) = HEADER_LINES.get(&line) {
        return *cached;
    }
    let leaked: &'static str = Box::leak(line.clone().into_boxed_str());
    if HEADER_LINES.len() < HEADER_CACHE_CAP {
        HEADER_LINES.insert(line, leaked);
    }
    leaked
}

/// Serialize an [`HttpResponse`] into the wire response.
pub fn write_response(res: &mut Response, resp: &HttpResponse) {
    res.status_code(resp.status as usize, status_phrase(resp.status));

    let mut has_content_type = false;
    for (name, value) in &resp.headers {
        if name.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        res.header(intern_header_line(name, value));
    }

    match &resp.body {
        Value::Null => {}
        Value::String(s) => {
            if !has_content_type {
                res.header("Content-Type: text/plain");
            }
            res.body_vec(s.clone().into_bytes());
        }
        other => {
            if !has_content_type {
                res.header("Content-Type: application/json");
            }
            res.body_vec(serde_json::to_vec(other).unwrap_or_default());
        }
    }
}
