//! Priority-ordered request middleware.
//!
//! Stages registered on a [`Pipeline`] wrap each other by priority: lower
//! priorities run first on the way in and last on the way out. Route lookup
//! itself is a stage ([`RouterStage`]) pinned at [`ROUTER_STAGE_PRIORITY`],
//! so middleware registered above it observe the selected route while
//! middleware below it run even for requests that will not match.
//!
//! Built-ins:
//! - [`ResponseTime`] stamps responses with their processing time
//! - [`RequestMetrics`] counts requests and serves `GET /metrics`

mod core;
mod metrics;
mod router_stage;
mod timing;


pub use self::core::{Chain, Middleware, Next, Pipeline, ROUTER_STAGE_PRIORITY};
pub use self::metrics::{MetricsSnapshot, RequestMetrics};
pub use self::router_stage::RouterStage;
pub use self::timing::ResponseTime;
