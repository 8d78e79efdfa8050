//! Route table core - hot path for request matching.

use super::route::{HandlerRef, RouteDescriptor};
use crate::error::ConfigurationError;
use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Maximum number of path arguments before heap allocation.
/// Most REST paths carry well under 8 placeholders.
pub const MAX_INLINE_ARGS: usize = 8;

type ArgVec = SmallVec<[(Arc<str>, String); MAX_INLINE_ARGS]>;

/// Placeholder values captured from a matched path, in pattern order.
///
/// Names are `Arc<str>` clones of the compiled pattern's placeholder names;
/// values are the percent-decoded path segments for this request.
#[derive(Debug, Clone, Default)]
pub struct RouteArgs {
    pairs: ArgVec,
}

impl RouteArgs {
    /// Look up an argument by placeholder name.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_ref(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A successful lookup: the handler to invoke and the decoded path arguments.
#[derive(Clone)]
pub struct RouteMatch {
    pub handler: HandlerRef,
    pub args: RouteArgs,
    /// Pattern that matched, as registered (for logs and metrics labels).
    pub pattern: Arc<str>,
}

impl fmt::Debug for RouteMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteMatch")
            .field("pattern", &self.pattern)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// Result of matching a method + path against the table.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Exactly one pattern matched with the method registered.
    Found(RouteMatch),
    /// At least one pattern matched the path, but none carries the method.
    /// The union of their methods is reported, registration order, deduped.
    MethodNotAllowed(Vec<Method>),
    /// No pattern matched the path at all.
    NotFound,
}

struct CompiledRoute {
    pattern: Arc<str>,
    /// Pattern with placeholder names erased (`/users/{}/posts`): two routes
    /// with equal shapes match exactly the same paths.
    shape: String,
    regex: Regex,
    params: Vec<Arc<str>>,
    handlers: Vec<(Method, HandlerRef)>,
}

impl CompiledRoute {
    fn handler_for(&self, method: &Method) -> Option<&HandlerRef> {
        self.handlers
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }
}

/// Compiled routing table, built once at startup and then only read.
///
/// Every worker builds its own identical copy from the registered
/// descriptors; lookups never take a lock.
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.len())
            .finish()
    }
}

impl RouteTable {
    /// Compile `descriptors` into a table.
    ///
    /// Descriptors with the same pattern merge their method sets. All
    /// conflicts are rejected here rather than at lookup time: duplicate
    /// method + pattern registrations, same-shape patterns sharing a method,
    /// and malformed patterns.
    pub fn build(descriptors: Vec<RouteDescriptor>) -> Result<Self, ConfigurationError> {
        let mut routes: Vec<CompiledRoute> = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let idx = match routes
                .iter()
                .position(|r| r.pattern.as_ref() == descriptor.pattern)
            {
                Some(idx) => idx,
                None => {
                    let (regex, params, shape) = compile_pattern(&descriptor.pattern)?;
                    routes.push(CompiledRoute {
                        pattern: Arc::from(descriptor.pattern.as_str()),
                        shape,
                        regex,
                        params,
                        handlers: Vec::new(),
                    });
                    routes.len() - 1
                }
            };

            let mut seen: Vec<Method> = Vec::with_capacity(descriptor.methods.len());
            for method in &descriptor.methods {
                if seen.contains(method) {
                    continue;
                }
                seen.push(method.clone());
                if routes[idx].handler_for(method).is_some() {
                    return Err(ConfigurationError::DuplicateRoute {
                        method: method.clone(),
                        pattern: descriptor.pattern.clone(),
                    });
                }
                routes[idx]
                    .handlers
                    .push((method.clone(), Arc::clone(&descriptor.handler)));
            }
        }

        // Same shape means the regexes accept identical path sets, so any
        // shared method could never be resolved deterministically.
        for i in 0..routes.len() {
            for j in i + 1..routes.len() {
                if routes[i].shape != routes[j].shape {
                    continue;
                }
                let clash = routes[i]
                    .handlers
                    .iter()
                    .find(|(m, _)| routes[j].handler_for(m).is_some());
                if let Some((method, _)) = clash {
                    return Err(ConfigurationError::AmbiguousRoute {
                        method: method.clone(),
                        first: routes[i].pattern.to_string(),
                        second: routes[j].pattern.to_string(),
                    });
                }
            }
        }

        let summary: Vec<String> = routes
            .iter()
            .take(10)
            .flat_map(|r| {
                r.handlers
                    .iter()
                    .map(|(m, _)| format!("{m} {}", r.pattern))
                    .collect::<Vec<_>>()
            })
            .collect();
        info!(
            patterns = routes.len(),
            routes_summary = ?summary,
            "route table compiled"
        );

        Ok(Self { routes })
    }

    /// Match a request against the table.
    ///
    /// `path` must already have its query string stripped. Patterns are tried
    /// in registration order; the first one matching the path with `method`
    /// registered wins.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> RouteOutcome {
        let mut allowed: Vec<Method> = Vec::new();

        for route in &self.routes {
            let Some(caps) = route.regex.captures(path) else {
                continue;
            };
            if let Some(handler) = route.handler_for(method) {
                let mut pairs = ArgVec::new();
                for (name, cap) in route.params.iter().zip(caps.iter().skip(1)) {
                    if let Some(m) = cap {
                        pairs.push((Arc::clone(name), decode_segment(m.as_str())));
                    }
                }
                debug!(
                    method = %method,
                    path = %path,
                    pattern = %route.pattern,
                    "route matched"
                );
                return RouteOutcome::Found(RouteMatch {
                    handler: Arc::clone(handler),
                    args: RouteArgs { pairs },
                    pattern: Arc::clone(&route.pattern),
                });
            }
            for (m, _) in &route.handlers {
                if !allowed.contains(m) {
                    allowed.push(m.clone());
                }
            }
        }

        if allowed.is_empty() {
            debug!(method = %method, path = %path, "no route matched");
            RouteOutcome::NotFound
        } else {
            debug!(method = %method, path = %path, allowed = ?allowed, "method not allowed");
            RouteOutcome::MethodNotAllowed(allowed)
        }
    }

    /// Number of distinct compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Compile a path template into an anchored regex plus its placeholder names
/// and shape. Empty segments (doubled or trailing slashes) are skipped, so
/// `/a/` compiles to the same matcher as `/a`.
fn compile_pattern(
    pattern: &str,
) -> Result<(Regex, Vec<Arc<str>>, String), ConfigurationError> {
    let invalid = |reason: &str| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if !pattern.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut regex_src = String::with_capacity(pattern.len() + 8);
    regex_src.push('^');
    let mut shape = String::with_capacity(pattern.len());
    let mut params: Vec<Arc<str>> = Vec::with_capacity(pattern.matches('{').count());

    for segment in pattern.split('/') {
        if segment.is_empty() {
            continue;
        }
        if let Some(inner) = segment.strip_prefix('{') {
            let name = inner
                .strip_suffix('}')
                .ok_or_else(|| invalid("unclosed placeholder"))?;
            if name.is_empty() {
                return Err(invalid("empty placeholder name"));
            }
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(invalid("placeholder names are [A-Za-z0-9_]"));
            }
            if params.iter().any(|p| p.as_ref() == name) {
                return Err(invalid("duplicate placeholder name"));
            }
            regex_src.push_str("/([^/]+)");
            shape.push_str("/{}");
            params.push(Arc::from(name));
        } else if segment.contains('{') || segment.contains('}') {
            return Err(invalid("a placeholder must span a whole segment"));
        } else {
            regex_src.push('/');
            regex_src.push_str(&regex::escape(segment));
            shape.push('/');
            shape.push_str(segment);
        }
    }

    // Bare "/" (or only empty segments) still has to match the root path.
    if regex_src.len() == 1 {
        regex_src.push('/');
        shape.push('/');
    }
    regex_src.push('$');

    let regex = Regex::new(&regex_src).map_err(|e| invalid(&e.to_string()))?;
    Ok((regex, params, shape))
}

fn decode_segment(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        // Undecodable percent sequences keep their raw spelling.
        Err(_) => raw.to_string(),
    }
}
