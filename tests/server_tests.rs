//! Integration tests for the HTTP server and the full request pipeline.
//!
//! # Test Coverage
//!
//! - Routing, URL argument decoding, and 404/405 translation over the wire
//! - Built-in timing and metrics middleware behaviour end to end
//! - Worker recycling: dev mode, request budgets, reload-on-exception
//! - Fatal handler errors aborting the connection and replacing the worker
//! - Keep-alive ordering and connection lifecycle hooks
//!
//! # Test Strategy
//!
//! Each test assembles a small [`App`], serves it on a random loopback port,
//! and talks to it with raw `TcpStream` requests. The RAII fixture stops the
//! listener and drains the pool on drop, even when an assertion fails.
//!
//! # Important Notes
//!
//! - Worker replacement is asynchronous; tests sleep briefly before
//!   asserting on the pool counters
//! - Responses are read with a short timeout because the server keeps
//!   connections alive

use http::Method;
use maypole::app::{App, Server};
use maypole::config::ServerConfig;
use maypole::events::{CONNECTION_CLOSE, CONNECTION_OPEN};
use maypole::middleware::{RequestMetrics, ResponseTime};
use maypole::{HttpRequest, HttpResponse, RouteDescriptor, WorkerPolicy};
use serde_json::json;
use std::io::Write;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod common;
use common::http::{free_addr, get, header, parse_response, read_available, send_request};
use tracing_util::TestTracing;

/// Test fixture with automatic teardown.
///
/// Dropping it stops the listener and lets the worker pool drain, so a
/// failing assertion cannot leak a bound port into the next test.
struct TestServer {
    _tracing: TestTracing,
    server: Option<Server>,
    addr: SocketAddr,
}

impl TestServer {
    fn start(app: App, policy: WorkerPolicy, workers: usize) -> Self {
        let tracing = TestTracing::init();

        let addr = free_addr();
        let config = ServerConfig {
            listen: addr.ip().to_string(),
            port: addr.port(),
            workers,
            reuse_port: false,
        };
        let server = app.serve(config, policy).unwrap();
        server.wait_ready().unwrap();

        Self {
            _tracing: tracing,
            server: Some(server),
            addr,
        }
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn server(&self) -> &Server {
        self.server.as_ref().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(server) = self.server.take() {
            server.stop();
        }
    }
}

/// Routes shared by most tests: a plain handler, one with a URL argument,
/// one registered for two methods, and one that always fails.
fn demo_app() -> App {
    App::new()
        .route(RouteDescriptor::get("/ping", |_req: HttpRequest| {
            Ok(HttpResponse::text(200, "pong"))
        }))
        .route(RouteDescriptor::get("/hello/{name}", |req: HttpRequest| {
            let name = req.route_arg("name").unwrap_or("world");
            Ok(HttpResponse::json(
                200,
                json!({ "greeting": format!("hello {name}") }),
            ))
        }))
        .route(RouteDescriptor::new(
            [Method::GET, Method::PUT],
            "/items/{id}",
            |req: HttpRequest| {
                let id = req.route_arg("id").unwrap_or("?");
                Ok(HttpResponse::text(200, format!("item {id}")))
            },
        ))
        .route(RouteDescriptor::get("/boom", |_req: HttpRequest| {
            Err(anyhow::anyhow!("boom exploded"))
        }))
}

#[test]
fn routed_request_returns_the_handler_response() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 2);

    let (status, headers, body) = parse_response(&get(&fixture.addr(), "/ping"));
    assert_eq!(status, 200);
    assert_eq!(body, "pong");
    assert_eq!(header(&headers, "Content-Type"), Some("text/plain"));

    // The query string is stripped before routing.
    let (status, _, body) = parse_response(&get(&fixture.addr(), "/ping?debug=1"));
    assert_eq!(status, 200);
    assert_eq!(body, "pong");
}

#[test]
fn route_args_are_percent_decoded() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 2);

    let (status, headers, body) = parse_response(&get(&fixture.addr(), "/hello/Ada%20Lovelace"));
    assert_eq!(status, 200);
    assert_eq!(header(&headers, "Content-Type"), Some("application/json"));
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["greeting"], "hello Ada Lovelace");
}

#[test]
fn unknown_path_translates_to_404() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 2);

    let (status, _, body) = parse_response(&get(&fixture.addr(), "/no/such/path"));
    assert_eq!(status, 404);
    assert_eq!(body, "Not Found");
}

#[test]
fn wrong_method_translates_to_405_with_allow() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 2);

    let resp = send_request(
        &fixture.addr(),
        "DELETE /items/7 HTTP/1.1\r\nHost: localhost\r\n\r\n",
    );
    let (status, headers, body) = parse_response(&resp);
    assert_eq!(status, 405);
    assert_eq!(header(&headers, "Allow"), Some("GET, PUT"));
    assert_eq!(body, "Method Not Allowed Allowed methods: GET, PUT");
}

#[test]
fn response_time_header_is_stamped() {
    let app = demo_app().middleware(10, ResponseTime::new()).unwrap();
    let fixture = TestServer::start(app, WorkerPolicy::default(), 2);

    let (status, headers, _) = parse_response(&get(&fixture.addr(), "/ping"));
    assert_eq!(status, 200);
    let elapsed = header(&headers, "X-Response-Time-Ms").unwrap();
    assert!(elapsed.parse::<u64>().is_ok(), "not a number: {elapsed:?}");
}

#[test]
fn metrics_endpoint_reports_request_counts() {
    let metrics = Arc::new(RequestMetrics::new());
    let app = demo_app()
        .middleware(20, Arc::clone(&metrics))
        .unwrap();
    let fixture = TestServer::start(app, WorkerPolicy::default(), 2);

    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
    // A missed route passes through the metrics stage as an error.
    assert_eq!(parse_response(&get(&fixture.addr(), "/missing")).0, 404);

    let (status, headers, body) = parse_response(&get(&fixture.addr(), "/metrics"));
    assert_eq!(status, 200);
    assert_eq!(
        header(&headers, "Content-Type"),
        Some("text/plain; version=0.0.4")
    );
    assert!(body.contains("maypole_requests_total 3"), "{body}");
    assert!(body.contains("maypole_request_errors_total 1"), "{body}");
    assert!(body.contains("maypole_request_latency_us_avg"), "{body}");
    assert!(body.contains("maypole_connections_total"), "{body}");
}

#[test]
fn dev_mode_recycles_the_worker_every_request() {
    let policy = WorkerPolicy::new().dev(true);
    let fixture = TestServer::start(demo_app(), policy, 1);

    for _ in 0..3 {
        assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
    }

    std::thread::sleep(Duration::from_millis(200));
    let pool = fixture.server().pool_metrics();
    assert!(
        pool.get_restarted_count() >= 2,
        "restarts: {}",
        pool.get_restarted_count()
    );
}

#[test]
fn max_requests_budget_recycles_the_worker() {
    let policy = WorkerPolicy::new().max_requests(Some(2));
    let fixture = TestServer::start(demo_app(), policy, 1);

    // Budget 2 means the third request trips the recycle.
    for _ in 0..3 {
        assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
    }

    std::thread::sleep(Duration::from_millis(200));
    let pool = fixture.server().pool_metrics();
    assert!(pool.get_restarted_count() >= 1);

    // The replacement worker keeps serving.
    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
}

#[test]
fn reload_on_exception_returns_500_and_recycles() {
    let policy = WorkerPolicy::new().reload_on_exception(true);
    let fixture = TestServer::start(demo_app(), policy, 1);

    let (status, _, body) = parse_response(&get(&fixture.addr(), "/boom"));
    assert_eq!(status, 500);
    assert_eq!(body, "Internal Server Error");

    std::thread::sleep(Duration::from_millis(200));
    let pool = fixture.server().pool_metrics();
    assert_eq!(pool.get_restarted_count(), 1);
    assert_eq!(pool.get_faulted_count(), 0);

    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
}

#[test]
fn dev_mode_error_bodies_carry_the_cause() {
    let policy = WorkerPolicy::new().dev(true).reload_on_exception(true);
    let fixture = TestServer::start(demo_app(), policy, 1);

    let (status, _, body) = parse_response(&get(&fixture.addr(), "/boom"));
    assert_eq!(status, 500);
    assert!(body.contains("boom exploded"), "{body}");
}

#[test]
fn fatal_handler_error_aborts_the_connection() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 1);

    // Without reload_on_exception the worker sends nothing back; the HTTP
    // layer answers with its own bare 500 or just drops the connection.
    let resp = get(&fixture.addr(), "/boom");
    assert!(
        resp.is_empty() || resp.contains("500"),
        "unexpected response: {resp:?}"
    );

    std::thread::sleep(Duration::from_millis(200));
    let pool = fixture.server().pool_metrics();
    assert_eq!(pool.get_faulted_count(), 1);

    // A replacement worker picks up where the faulted one stopped.
    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
}

#[test]
fn keep_alive_requests_are_answered_in_order() {
    let fixture = TestServer::start(demo_app(), WorkerPolicy::default(), 2);

    let mut stream = TcpStream::connect(fixture.addr()).unwrap();
    stream
        .write_all(
            b"GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n\
              GET /items/9 HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .unwrap();
    stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let resp = read_available(&mut stream);

    assert_eq!(resp.matches("HTTP/1.1 200").count(), 2, "{resp}");
    let pong = resp.find("pong").unwrap();
    let item = resp.find("item 9").unwrap();
    assert!(pong < item, "responses out of order: {resp}");
}

#[test]
fn connection_hooks_fire_per_connection() {
    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));
    let open_counter = Arc::clone(&opened);
    let close_counter = Arc::clone(&closed);

    let app = demo_app()
        .on(CONNECTION_OPEN, move |args| {
            assert!(args.connection.is_some());
            open_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on(CONNECTION_CLOSE, move |_args| {
            close_counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let fixture = TestServer::start(app, WorkerPolicy::default(), 2);

    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);
    assert_eq!(parse_response(&get(&fixture.addr(), "/ping")).0, 200);

    std::thread::sleep(Duration::from_millis(200));
    // The readiness probe counts too, so expect at least the two requests.
    assert!(opened.load(Ordering::SeqCst) >= 2);
    assert!(closed.load(Ordering::SeqCst) >= 1);
}
