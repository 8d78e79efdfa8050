//! # Worker Pool Module
//!
//! Spawns N worker coroutines that share one unbounded job channel and a
//! supervisor that replaces workers as their lifecycle policy retires them.
//!
//! ## Worker model
//!
//! - Every worker builds its own [`RouteTable`] and middleware [`Chain`] from
//!   the shared [`WorkerBlueprint`]; lookups never take a lock
//! - Workers pull jobs off the shared channel, so load balances automatically
//! - A retiring worker finishes its in-flight response, tells the supervisor,
//!   and exits; the supervisor spawns a successor with a fresh id
//! - Worker ids are monotonic: replacements never reuse a retired id
//!
//! ## Shutdown
//!
//! Dropping the pool tells the supervisor to stop replacing workers. Workers
//! themselves exit once every job sender (the pool's own plus any held by
//! open connections) is gone.
//!
//! [`RouteTable`]: crate::router::RouteTable
//! [`Chain`]: crate::middleware::Chain

use crate::dispatcher::Dispatcher;
use crate::error::ErrorTranslator;
use crate::events::{EventBus, HookArgs, WORKER_START};
use crate::middleware::Pipeline;
use crate::router::{RouteDescriptor, RouteTable};
use crate::server::{HttpRequest, HttpResponse};
use crate::worker::{WorkerLifecycle, WorkerPolicy};
use anyhow::Context as _;
use may::sync::mpsc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One unit of work: a parsed request plus the channel its response goes
/// back on.
#[derive(Debug)]
pub struct Job {
    pub request: HttpRequest,
    pub reply: mpsc::Sender<HttpResponse>,
}

/// Control messages from workers to the supervisor.
enum WorkerEvent {
    /// The worker retired per its policy and wants a successor.
    RestartRequested { worker: usize },
    /// The worker hit a fatal error and exited.
    Faulted { worker: usize, error: anyhow::Error },
    /// The pool is going away; stop replacing workers.
    Shutdown,
}

/// Everything a worker needs to build its private routing state.
#[derive(Clone)]
pub struct WorkerBlueprint {
    pub routes: Arc<Vec<RouteDescriptor>>,
    pub pipeline: Pipeline,
    pub policy: WorkerPolicy,
    pub translator: ErrorTranslator,
    pub events: Arc<EventBus>,
}

/// Counters for pool supervision.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    workers_started: AtomicU64,
    workers_restarted: AtomicU64,
    workers_faulted: AtomicU64,
    requests_served: AtomicU64,
}

impl PoolMetrics {
    fn record_start(&self) {
        self.workers_started.fetch_add(1, Ordering::Relaxed);
    }

    fn record_restart(&self) {
        self.workers_restarted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_fault(&self) {
        self.workers_faulted.fetch_add(1, Ordering::Relaxed);
    }

    fn record_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }

    /// Workers spawned over the pool's lifetime, initial set included.
    #[must_use]
    pub fn get_started_count(&self) -> u64 {
        self.workers_started.load(Ordering::Relaxed)
    }

    /// Policy-driven worker replacements.
    #[must_use]
    pub fn get_restarted_count(&self) -> u64 {
        self.workers_restarted.load(Ordering::Relaxed)
    }

    /// Workers lost to fatal errors.
    #[must_use]
    pub fn get_faulted_count(&self) -> u64 {
        self.workers_faulted.load(Ordering::Relaxed)
    }

    /// Requests answered across all workers.
    #[must_use]
    pub fn get_request_count(&self) -> u64 {
        self.requests_served.load(Ordering::Relaxed)
    }
}

/// A pool of request workers plus the supervisor that keeps it at size.
pub struct WorkerPool {
    jobs: mpsc::Sender<Job>,
    events_tx: mpsc::Sender<WorkerEvent>,
    metrics: Arc<PoolMetrics>,
    size: usize,
}

impl WorkerPool {
    /// Validate the blueprint, spawn the initial workers and the supervisor.
    ///
    /// The routing configuration is checked once up front; workers rebuild
    /// from the same descriptors and cannot fail differently.
    pub fn start(
        blueprint: WorkerBlueprint,
        size: usize,
        stack_size: usize,
    ) -> anyhow::Result<Self> {
        RouteTable::build(blueprint.routes.as_ref().clone())
            .context("invalid routing configuration")?;

        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(job_rx);
        let (event_tx, event_rx) = mpsc::channel::<WorkerEvent>();
        let metrics = Arc::new(PoolMetrics::default());

        info!(workers = size, stack_size, "starting worker pool");

        for worker_id in 0..size {
            spawn_worker(
                worker_id,
                blueprint.clone(),
                Arc::clone(&job_rx),
                event_tx.clone(),
                stack_size,
                Arc::clone(&metrics),
            )
            .with_context(|| format!("spawning worker {worker_id}"))?;
        }

        spawn_supervisor(
            blueprint,
            job_rx,
            event_tx.clone(),
            event_rx,
            stack_size,
            Arc::clone(&metrics),
            size,
        )
        .context("spawning pool supervisor")?;

        Ok(Self {
            jobs: job_tx,
            events_tx: event_tx,
            metrics,
            size,
        })
    }

    /// A sender for submitting jobs; clone one per connection.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<Job> {
        self.jobs.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<PoolMetrics> {
        &self.metrics
    }

    /// Initial pool size. The live count matches except for the window
    /// between a worker retiring and its successor starting.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.events_tx.send(WorkerEvent::Shutdown);
    }
}

fn spawn_worker(
    worker_id: usize,
    blueprint: WorkerBlueprint,
    jobs: Arc<mpsc::Receiver<Job>>,
    events_tx: mpsc::Sender<WorkerEvent>,
    stack_size: usize,
    metrics: Arc<PoolMetrics>,
) -> std::io::Result<()> {
    let worker_metrics = Arc::clone(&metrics);
    // SAFETY: may::coroutine::Builder::spawn() is unsafe because the runtime
    // requires TLS-free coroutine bodies. The worker owns everything it
    // touches (blueprint clone, channel endpoints, metrics Arc), all of it
    // Send + 'static.
    let handle = unsafe {
        may::coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || worker_main(worker_id, &blueprint, &jobs, &events_tx, &worker_metrics))?
    };
    drop(handle); // detached; workers exit when the job channel closes
    metrics.record_start();
    Ok(())
}

fn worker_main(
    worker_id: usize,
    blueprint: &WorkerBlueprint,
    jobs: &mpsc::Receiver<Job>,
    events_tx: &mpsc::Sender<WorkerEvent>,
    metrics: &PoolMetrics,
) {
    let table = match RouteTable::build(blueprint.routes.as_ref().clone()) {
        Ok(table) => Arc::new(table),
        Err(err) => {
            error!(worker = worker_id, error = %err, "worker could not build its route table");
            let _ = events_tx.send(WorkerEvent::Faulted {
                worker: worker_id,
                error: err.into(),
            });
            return;
        }
    };
    let chain = blueprint.pipeline.assemble(table);
    let dispatcher = Dispatcher::new(chain, blueprint.translator);
    let mut lifecycle = WorkerLifecycle::new(blueprint.policy);

    if let Err(err) = blueprint
        .events
        .dispatch(WORKER_START, &HookArgs::worker(worker_id))
    {
        warn!(worker = worker_id, error = %err, "worker.start hook failed");
    }
    debug!(worker = worker_id, "worker ready");

    loop {
        let Ok(job) = jobs.recv() else {
            debug!(worker = worker_id, "job channel closed, worker exiting");
            return;
        };

        match dispatcher.dispatch(job.request, &mut lifecycle) {
            Ok(resp) => {
                // Count before replying so a caller woken by the reply never
                // sees a total missing the request it just got answered.
                metrics.record_request();
                let _ = job.reply.send(resp);
                if lifecycle.after_response() {
                    lifecycle.begin_restart();
                    info!(worker = worker_id, "worker retiring per policy");
                    let _ = events_tx.send(WorkerEvent::RestartRequested { worker: worker_id });
                    return;
                }
            }
            Err(error) => {
                // No response: the connection is dropped, matching the
                // reload_on_exception=false contract.
                drop(job.reply);
                let _ = events_tx.send(WorkerEvent::Faulted {
                    worker: worker_id,
                    error,
                });
                return;
            }
        }
    }
}

fn spawn_supervisor(
    blueprint: WorkerBlueprint,
    jobs: Arc<mpsc::Receiver<Job>>,
    events_tx: mpsc::Sender<WorkerEvent>,
    events_rx: mpsc::Receiver<WorkerEvent>,
    stack_size: usize,
    metrics: Arc<PoolMetrics>,
    initial_size: usize,
) -> std::io::Result<()> {
    // SAFETY: same contract as spawn_worker; the supervisor owns its state.
    let handle = unsafe {
        may::coroutine::Builder::new().spawn(move || {
            let mut next_worker = initial_size;
            loop {
                let respawn = match events_rx.recv() {
                    Ok(WorkerEvent::RestartRequested { worker }) => {
                        metrics.record_restart();
                        debug!(retired = worker, "restart requested");
                        true
                    }
                    Ok(WorkerEvent::Faulted { worker, error }) => {
                        metrics.record_fault();
                        error!(worker, error = %error, "worker faulted");
                        true
                    }
                    Ok(WorkerEvent::Shutdown) | Err(_) => false,
                };
                if !respawn {
                    debug!("pool supervisor exiting");
                    return;
                }

                let replacement = next_worker;
                next_worker += 1;
                info!(replacement, "spawning replacement worker");
                if let Err(err) = spawn_worker(
                    replacement,
                    blueprint.clone(),
                    Arc::clone(&jobs),
                    events_tx.clone(),
                    stack_size,
                    Arc::clone(&metrics),
                ) {
                    error!(replacement, error = %err, "failed to spawn replacement worker");
                }
            }
        })?
    };
    drop(handle);
    Ok(())
}
