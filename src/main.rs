//! Demonstration server.
//!
//! A small application exercising the library end to end: a couple of
//! routes, the timing and metrics middlewares, and connection hooks feeding
//! the connection gauge.
//!
//! ```bash
//! MAYPOLE_LOG=debug cargo run -- start -p 8080 -w 4
//! curl http://localhost:8080/hello/Ada
//! curl http://localhost:8080/metrics
//! ```

use anyhow::Context as _;
use maypole::events::{CONNECTION_CLOSE, CONNECTION_OPEN};
use maypole::middleware::{RequestMetrics, ResponseTime};
use maypole::{App, HttpRequest, HttpResponse, RouteDescriptor};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("MAYPOLE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("MAYPOLE_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("initializing logging")
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let metrics = Arc::new(RequestMetrics::new());
    let open_gauge = Arc::clone(&metrics);
    let close_gauge = Arc::clone(&metrics);

    App::new()
        .route(RouteDescriptor::get("/", |_req: HttpRequest| {
            Ok(HttpResponse::json(
                200,
                json!({ "service": "maypole", "status": "ok" }),
            ))
        }))
        .route(RouteDescriptor::get("/hello/{name}", |req: HttpRequest| {
            let name = req.route_arg("name").unwrap_or("world");
            Ok(HttpResponse::text(200, format!("hello {name}")))
        }))
        .route(RouteDescriptor::get("/boom", |_req: HttpRequest| {
            Err(anyhow::anyhow!("the boom handler always fails"))
        }))
        .middleware(10, ResponseTime::new())?
        .middleware(20, Arc::clone(&metrics))?
        .on(CONNECTION_OPEN, move |_args| {
            open_gauge.connection_opened();
            Ok(())
        })
        .on(CONNECTION_CLOSE, move |_args| {
            close_gauge.connection_closed();
            Ok(())
        })
        .run()
}
