use super::{Middleware, Next};
use crate::error::RequestError;
use crate::router::{RouteOutcome, RouteTable};
use crate::server::{HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::debug;

/// The routing stage of the chain.
///
/// Resolves the request against the route table, records the selection in the
/// request context, and passes the request on. [`Pipeline::assemble`] installs
/// it at [`ROUTER_STAGE_PRIORITY`], so it never needs to be registered by
/// hand.
///
/// [`Pipeline::assemble`]: super::Pipeline::assemble
/// [`ROUTER_STAGE_PRIORITY`]: super::ROUTER_STAGE_PRIORITY
#[derive(Debug)]
pub struct RouterStage {
    table: Arc<RouteTable>,
}

impl RouterStage {
    pub(crate) fn new(table: Arc<RouteTable>) -> Self {
        Self { table }
    }
}

impl Middleware for RouterStage {
    fn handle(&self, mut req: HttpRequest, next: Next<'_>) -> Result<HttpResponse, RequestError> {
        match self.table.lookup(&req.method, &req.path) {
            RouteOutcome::Found(matched) => {
                debug!(request_id = %req.id, pattern = %matched.pattern, "route selected");
                req.context.insert(matched);
                next.run(req)
            }
            RouteOutcome::MethodNotAllowed(allowed) => {
                debug!(request_id = %req.id, path = %req.path, "method not allowed");
                Err(RequestError::MethodNotAllowed { allowed })
            }
            RouteOutcome::NotFound => {
                debug!(request_id = %req.id, path = %req.path, "no route matched");
                Err(RequestError::RouteNotFound)
            }
        }
    }
}
