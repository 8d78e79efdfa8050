use crate::router::{RouteArgs, RouteMatch};
use http::Method;
use may_minihttp::Request;
use smallvec::SmallVec;
use std::fmt;
use std::io::Read;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Maximum inline headers before heap allocation; most requests carry fewer.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage. Names are lowercased `Arc<str>` (they
/// repeat across requests), values are per-request strings.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Stack-allocated query parameter storage.
pub type ParamVec = SmallVec<[(Arc<str>, String); 8]>;

/// ULID correlation id, assigned when the wire request is parsed.
///
/// Every log line the request touches carries it, so one id ties the
/// connection, worker, and handler records together.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RequestId(ulid::Ulid);

impl RequestId {
    #[must_use]
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }

    /// Parse a client-supplied id; `None` when it is not a ULID.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        ulid::Ulid::from_string(value).ok().map(Self)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Typed per-request store.
///
/// Created empty for every request and dropped with it; stages deposit
/// values (the router stage stores its [`RouteMatch`] here) for stages and
/// handlers further in.
#[derive(Debug, Default, Clone)]
pub struct RequestContext(http::Extensions);

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous value of the same type.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.0.insert(value)
    }

    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.0.get()
    }

    pub fn get_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.0.get_mut()
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<T> {
        self.0.remove()
    }
}

/// An owned HTTP request as it travels the middleware chain.
///
/// Built once per wire request by [`parse_request`]; middlewares receive it
/// by value and may pass a modified request inward.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Correlation id, taken from an `x-request-id` header when one parses
    /// as a ULID, freshly generated otherwise.
    pub id: RequestId,
    pub method: Method,
    /// Request path with the query string stripped.
    pub path: String,
    /// Headers with lowercased names.
    pub headers: HeaderVec,
    /// Decoded query string parameters, in wire order.
    pub query_params: ParamVec,
    /// Body parsed as JSON when present and well-formed.
    pub body: Option<serde_json::Value>,
    pub context: RequestContext,
}

impl HttpRequest {
    /// Build a request by hand; the server adapter uses [`parse_request`].
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method,
            path: path.into(),
            headers: HeaderVec::new(),
            query_params: ParamVec::new(),
            body: None,
            context: RequestContext::new(),
        }
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

    /// Get a query parameter by name; duplicates resolve to the last one.
    #[inline]
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path arguments deposited by the router stage, if routing ran.
    #[must_use]
    pub fn route_args(&self) -> Option<&RouteArgs> {
        self.context.get::<RouteMatch>().map(|m| &m.args)
    }

    /// Single path argument by placeholder name.
    #[must_use]
    pub fn route_arg(&self, name: &str) -> Option<&str> {
        self.route_args().and_then(|args| args.get(name))
    }
}

/// Split the query string off a raw request path.
fn split_query(raw_path: &str) -> (&str, Option<&str>) {
    match raw_path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (raw_path, None),
    }
}

fn parse_query_params(query: Option<&str>) -> ParamVec {
    let Some(query) = query else {
        return ParamVec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (Arc::from(k.as_ref()), v.into_owned()))
        .collect()
}

/// Honor a parsable `x-request-id` header, otherwise mint a fresh id.
fn correlation_id(headers: &HeaderVec) -> RequestId {
    headers
        .iter()
        .find(|(k, _)| k.as_ref() == "x-request-id")
        .and_then(|(_, v)| RequestId::parse(v))
        .unwrap_or_else(RequestId::new)
}

/// Extract an owned [`HttpRequest`] from a raw `may_minihttp` request.
///
/// Unknown methods fall back to GET; a non-JSON body is dropped after a
/// debug log. Neither condition fails the request.
pub fn parse_request(req: Request) -> HttpRequest {
    let method = Method::from_str(req.method()).unwrap_or(Method::GET);
    let raw_path = req.path().to_string();
    let (path, query) = split_query(&raw_path);
    let path = path.to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase().as_str()),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();

    let id = correlation_id(&headers);
    let query_params = parse_query_params(query);

    let body = {
        let mut body_str = String::new();
        match req.body().read_to_string(&mut body_str) {
            Ok(size) if size > 0 => match serde_json::from_str(&body_str) {
                Ok(json) => Some(json),
                Err(_) => {
                    debug!(request_id = %id, body_bytes = body_str.len(), "non-JSON body dropped");
                    None
                }
            },
            _ => None,
        }
    };

    debug!(
        request_id = %id,
        method = %method,
        path = %path,
        header_count = headers.len(),
        query_params = query_params.len(),
        "request parsed"
    );

    HttpRequest {
        id,
        method,
        path,
        headers,
        query_params,
        body,
        context: RequestContext::new(),
    }
}
