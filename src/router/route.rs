use crate::server::{HttpRequest, HttpResponse};
use http::Method;
use std::fmt;
use std::sync::Arc;

/// A request handler selected by the route table.
///
/// Handlers run on a worker coroutine with the request by value; the response
/// (or error) travels back through the middleware chain. Any closure with the
/// matching signature is a handler.
pub trait Handler: Send + Sync {
    fn handle(&self, req: HttpRequest) -> anyhow::Result<HttpResponse>;
}

impl<F> Handler for F
where
    F: Fn(HttpRequest) -> anyhow::Result<HttpResponse> + Send + Sync,
{
    fn handle(&self, req: HttpRequest) -> anyhow::Result<HttpResponse> {
        self(req)
    }
}

/// Shared handle to a handler; cloned into every worker's route table.
pub type HandlerRef = Arc<dyn Handler>;

/// One routing registration: a path template, the methods it serves, and the
/// handler invoked on a match.
///
/// Patterns are literal segments mixed with `{name}` placeholders, e.g.
/// `/users/{id}/posts/{post_id}`. A placeholder spans a whole segment.
#[derive(Clone)]
pub struct RouteDescriptor {
    pub methods: Vec<Method>,
    pub pattern: String,
    pub handler: HandlerRef,
}

impl RouteDescriptor {
    pub fn new<M>(methods: M, pattern: impl Into<String>, handler: impl Handler + 'static) -> Self
    where
        M: IntoIterator<Item = Method>,
    {
        Self {
            methods: methods.into_iter().collect(),
            pattern: pattern.into(),
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn get(pattern: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self::new([Method::GET], pattern, handler)
    }

    #[must_use]
    pub fn post(pattern: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self::new([Method::POST], pattern, handler)
    }

    #[must_use]
    pub fn put(pattern: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self::new([Method::PUT], pattern, handler)
    }

    #[must_use]
    pub fn delete(pattern: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self::new([Method::DELETE], pattern, handler)
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("methods", &self.methods)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Anything that can contribute route registrations.
///
/// Discovery mechanisms (annotation scanners, config loaders, hand-written
/// controller structs) live behind this seam; the table only ever consumes
/// plain descriptors.
pub trait RouteSource {
    fn routes(&self) -> Vec<RouteDescriptor>;
}

impl RouteSource for Vec<RouteDescriptor> {
    fn routes(&self) -> Vec<RouteDescriptor> {
        self.clone()
    }
}
