use super::request::parse_request;
use super::response::write_response;
use crate::events::{EventBus, HookArgs, CONNECTION_CLOSE, CONNECTION_OPEN};
use crate::pool::Job;
use may::sync::mpsc;
use may_minihttp::{HttpService, HttpServiceFactory, Request, Response};
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds one [`AppService`] per accepted connection and fires the
/// connection events around its lifetime.
pub struct ServiceFactory {
    jobs: mpsc::Sender<Job>,
    events: Arc<EventBus>,
}

impl ServiceFactory {
    #[must_use]
    pub fn new(jobs: mpsc::Sender<Job>, events: Arc<EventBus>) -> Self {
        Self { jobs, events }
    }
}

impl HttpServiceFactory for ServiceFactory {
    type Service = AppService;

    fn new_service(&self, id: usize) -> AppService {
        if let Err(err) = self.events.dispatch(CONNECTION_OPEN, &HookArgs::connection(id)) {
            warn!(connection = id, error = %err, "connection.open hook failed");
        }
        debug!(connection = id, "connection open");

        AppService {
            connection: id,
            jobs: self.jobs.clone(),
            events: Arc::clone(&self.events),
        }
    }
}

/// Connection-scoped HTTP service.
///
/// Parses each wire request, submits it to the worker pool, and writes the
/// worker's response back. The service lives exactly as long as its
/// connection, so keep-alive requests share one instance.
pub struct AppService {
    connection: usize,
    jobs: mpsc::Sender<Job>,
    events: Arc<EventBus>,
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let request = parse_request(req);
        let request_id = request.id;

        let (reply_tx, reply_rx) = mpsc::channel();
        if self
            .jobs
            .send(Job {
                request,
                reply: reply_tx,
            })
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "worker pool is gone",
            ));
        }

        match reply_rx.recv() {
            Ok(resp) => {
                write_response(res, &resp);
                Ok(())
            }
            Err(_) => {
                // The worker faulted and dropped the reply channel. Report an
                // I/O error so the HTTP layer ends this exchange without an
                // application response.
                debug!(
                    request_id = %request_id,
                    connection = self.connection,
                    "worker produced no response"
                );
                Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "request failed without a response",
                ))
            }
        }
    }
}

impl Drop for AppService {
    fn drop(&mut self) {
        if let Err(err) = self
            .events
            .dispatch(CONNECTION_CLOSE, &HookArgs::connection(self.connection))
        {
            warn!(connection = self.connection, error = %err, "connection.close hook failed");
        }
        debug!(connection = self.connection, "connection closed");
    }
}
