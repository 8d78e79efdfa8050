use super::{RouteDescriptor, RouteOutcome, RouteTable};
use crate::error::ConfigurationError;
use crate::server::HttpResponse;
use http::Method;

fn ok_handler(_req: crate::server::HttpRequest) -> anyhow::Result<HttpResponse> {
    Ok(HttpResponse::text(200, "ok"))
}

fn table(descriptors: Vec<RouteDescriptor>) -> RouteTable {
    RouteTable::build(descriptors).unwrap()
}

#[test]
fn root_path_matches() {
    let t = table(vec![RouteDescriptor::get("/", ok_handler)]);
    assert!(matches!(
        t.lookup(&Method::GET, "/"),
        RouteOutcome::Found(_)
    ));
}

#[test]
fn placeholder_captures_decoded_segment() {
    let t = table(vec![RouteDescriptor::get("/hello/{name}", ok_handler)]);
    match t.lookup(&Method::GET, "/hello/Ada%20Lovelace") {
        RouteOutcome::Found(m) => {
            assert_eq!(m.args.get("name"), Some("Ada Lovelace"));
            assert_eq!(m.pattern.as_ref(), "/hello/{name}");
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn multiple_placeholders_in_order() {
    let t = table(vec![RouteDescriptor::get(
        "/users/{id}/posts/{post_id}",
        ok_handler,
    )]);
    match t.lookup(&Method::GET, "/users/42/posts/abc") {
        RouteOutcome::Found(m) => {
            assert_eq!(m.args.get("id"), Some("42"));
            assert_eq!(m.args.get("post_id"), Some("abc"));
            assert_eq!(m.args.len(), 2);
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn placeholder_does_not_cross_segments() {
    let t = table(vec![RouteDescriptor::get("/hello/{name}", ok_handler)]);
    assert!(matches!(
        t.lookup(&Method::GET, "/hello/a/b"),
        RouteOutcome::NotFound
    ));
}

#[test]
fn unregistered_method_reports_allowed_union() {
    let t = table(vec![RouteDescriptor::new(
        [Method::GET, Method::PUT],
        "/items/{id}",
        ok_handler,
    )]);
    match t.lookup(&Method::DELETE, "/items/7") {
        RouteOutcome::MethodNotAllowed(allowed) => {
            assert_eq!(allowed, vec![Method::GET, Method::PUT]);
        }
        other => panic!("expected MethodNotAllowed, got {other:?}"),
    }
}

#[test]
fn allowed_union_spans_same_shape_patterns() {
    // Same path set served by two patterns with disjoint methods: a third
    // method must see both in the allowed list.
    let t = table(vec![
        RouteDescriptor::get("/things/{id}", ok_handler),
        RouteDescriptor::post("/things/{thing_id}", ok_handler),
    ]);
    match t.lookup(&Method::DELETE, "/things/5") {
        RouteOutcome::MethodNotAllowed(allowed) => {
            assert_eq!(allowed, vec![Method::GET, Method::POST]);
        }
        other => panic!("expected MethodNotAllowed, got {other:?}"),
    }
}

#[test]
fn method_resolves_between_same_shape_patterns() {
    let t = table(vec![
        RouteDescriptor::get("/things/{id}", |req: crate::server::HttpRequest| {
            let id = req.route_arg("id").unwrap_or("").to_string();
            Ok(HttpResponse::text(200, id))
        }),
        RouteDescriptor::post("/things/{thing_id}", ok_handler),
    ]);
    match t.lookup(&Method::GET, "/things/5") {
        RouteOutcome::Found(m) => assert_eq!(m.args.get("id"), Some("5")),
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn no_routes_means_not_found() {
    let t = table(Vec::new());
    assert!(t.is_empty());
    assert!(matches!(
        t.lookup(&Method::GET, "/anything"),
        RouteOutcome::NotFound
    ));
}

#[test]
fn trailing_slash_is_a_distinct_request_path() {
    let t = table(vec![RouteDescriptor::get("/exact", ok_handler)]);
    assert!(matches!(
        t.lookup(&Method::GET, "/exact"),
        RouteOutcome::Found(_)
    ));
    assert!(matches!(
        t.lookup(&Method::GET, "/exact/"),
        RouteOutcome::NotFound
    ));
}

#[test]
fn literal_segments_are_not_regex() {
    let t = table(vec![RouteDescriptor::get("/favicon.ico", ok_handler)]);
    assert!(matches!(
        t.lookup(&Method::GET, "/favicon.ico"),
        RouteOutcome::Found(_)
    ));
    // '.' must not act as a wildcard.
    assert!(matches!(
        t.lookup(&Method::GET, "/faviconxico"),
        RouteOutcome::NotFound
    ));
}

#[test]
fn duplicate_method_and_pattern_is_rejected() {
    let err = RouteTable::build(vec![
        RouteDescriptor::get("/dup", ok_handler),
        RouteDescriptor::get("/dup", ok_handler),
    ])
    .unwrap_err();
    match err {
        ConfigurationError::DuplicateRoute { method, pattern } => {
            assert_eq!(method, Method::GET);
            assert_eq!(pattern, "/dup");
        }
        other => panic!("expected DuplicateRoute, got {other:?}"),
    }
}

#[test]
fn same_shape_with_shared_method_is_rejected() {
    let err = RouteTable::build(vec![
        RouteDescriptor::get("/users/{id}", ok_handler),
        RouteDescriptor::get("/users/{user_id}", ok_handler),
    ])
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::AmbiguousRoute { .. }));
}

#[test]
fn trailing_slash_pattern_collides_with_bare_pattern() {
    let err = RouteTable::build(vec![
        RouteDescriptor::get("/a", ok_handler),
        RouteDescriptor::get("/a/", ok_handler),
    ])
    .unwrap_err();
    assert!(matches!(err, ConfigurationError::AmbiguousRoute { .. }));
}

#[test]
fn methods_within_one_descriptor_are_deduplicated() {
    let t = table(vec![RouteDescriptor::new(
        [Method::GET, Method::GET],
        "/dedup",
        ok_handler,
    )]);
    assert!(matches!(
        t.lookup(&Method::GET, "/dedup"),
        RouteOutcome::Found(_)
    ));
}

#[test]
fn malformed_patterns_are_rejected() {
    for pattern in [
        "no-leading-slash",
        "/x/{unclosed",
        "/x/{}",
        "/x/{bad name}",
        "/x/pre{fix}",
        "/x/{a}/{a}",
    ] {
        let err = RouteTable::build(vec![RouteDescriptor::get(pattern, ok_handler)]).unwrap_err();
        assert!(
            matches!(err, ConfigurationError::InvalidPattern { .. }),
            "pattern {pattern:?} should be invalid"
        );
    }
}

#[test]
fn undecodable_segment_falls_back_to_raw() {
    let t = table(vec![RouteDescriptor::get("/raw/{v}", ok_handler)]);
    match t.lookup(&Method::GET, "/raw/%ff") {
        RouteOutcome::Found(m) => assert_eq!(m.args.get("v"), Some("%ff")),
        other => panic!("expected Found, got {other:?}"),
    }
}
