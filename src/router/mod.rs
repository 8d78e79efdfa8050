//! # Router Module
//!
//! Path matching and route resolution. Registrations are plain
//! [`RouteDescriptor`] values (pattern + methods + handler); at startup they
//! compile into a [`RouteTable`] that answers every request with one of three
//! outcomes: a match with decoded arguments, a method-not-allowed carrying
//! the union of methods registered for that path, or not-found.
//!
//! ## Matching
//!
//! Patterns mix literal segments with `{name}` placeholders:
//!
//! 1. **Compilation**: each pattern becomes an anchored regex; literals are
//!    escaped, placeholders capture one segment. Conflicting registrations
//!    (duplicate method + pattern, same-shape patterns sharing a method,
//!    malformed placeholders) are rejected here, never at request time.
//!
//! 2. **Lookup**: patterns are tried in registration order against the
//!    query-stripped path. Captured segments are percent-decoded into
//!    [`RouteArgs`].
//!
//! ## Example
//!
//! ```rust
//! use maypole::router::{RouteDescriptor, RouteOutcome, RouteTable};
//! use maypole::server::{HttpRequest, HttpResponse};
//! use http::Method;
//!
//! # fn main() -> Result<(), maypole::error::ConfigurationError> {
//! let table = RouteTable::build(vec![RouteDescriptor::get(
//!     "/hello/{name}",
//!     |_req: HttpRequest| Ok(HttpResponse::text(200, "hi")),
//! )])?;
//!
//! match table.lookup(&Method::GET, "/hello/Ada%20Lovelace") {
//!     RouteOutcome::Found(m) => assert_eq!(m.args.get("name"), Some("Ada Lovelace")),
//!     _ => unreachable!(),
//! }
//! # Ok(())
//! # }
//! ```

mod core;
mod route;
#[cfg(test)]
mod tests;

pub use self::core::{RouteArgs, RouteMatch, RouteOutcome, RouteTable, MAX_INLINE_ARGS};
pub use self::route::{Handler, HandlerRef, RouteDescriptor, RouteSource};
