use crate::error::{ErrorTranslator, RequestError};
use crate::middleware::Chain;
use crate::server::{HttpRequest, HttpResponse};
use crate::worker::WorkerLifecycle;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runs requests through the middleware chain and turns failures into
/// responses according to policy.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    chain: Chain,
    translator: ErrorTranslator,
}

impl Dispatcher {
    #[must_use]
    pub fn new(chain: Chain, translator: ErrorTranslator) -> Self {
        Self { chain, translator }
    }

    /// Dispatch one request.
    ///
    /// Routing failures always translate into an error response. Handler
    /// failures translate only when the worker's policy reloads on
    /// exception; otherwise the failure is returned as-is and the worker
    /// loop decides what to do with the connection.
    pub fn dispatch(
        &self,
        req: HttpRequest,
        lifecycle: &mut WorkerLifecycle,
    ) -> Result<HttpResponse, anyhow::Error> {
        let request_id = req.id;
        let method = req.method.clone();
        let path = req.path.clone();
        let start = Instant::now();

        match self.chain.run(req) {
            Ok(resp) => {
                info!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status = resp.status,
                    latency_ms = start.elapsed().as_millis() as u64,
                    "request completed"
                );
                Ok(resp)
            }
            Err(err @ (RequestError::RouteNotFound | RequestError::MethodNotAllowed { .. })) => {
                debug!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    status = err.status(),
                    "request not routable"
                );
                Ok(self.translator.translate(&err))
            }
            Err(RequestError::Handler(cause)) => {
                if lifecycle.policy().reload_on_exception {
                    warn!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        error = %cause,
                        "handler failed, worker will reload"
                    );
                    lifecycle.note_exception();
                    Ok(self.translator.translate(&RequestError::Handler(cause)))
                } else {
                    error!(
                        request_id = %request_id,
                        method = %method,
                        path = %path,
                        error = %cause,
                        "handler failed"
                    );
                    Err(cause)
                }
            }
        }
    }
}
