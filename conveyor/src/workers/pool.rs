use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

use crate::config::PoolConfig;
use crate::conveyor_error;
use crate::error::{ConveyorError, ConveyorResult, ErrorKind};
use crate::queue::{BoundedQueue, QueueReader};
use crate::shutdown::ShutdownRx;
use crate::state::SharedCounter;
use crate::types::{Job, TaskResult};
use crate::workers::base::{Worker, WorkerHandle};

/// Live counters for a running pool.
///
/// Cheap to clone; all clones observe the same counters. A job is counted in
/// exactly one bucket once its result has been produced.
#[derive(Debug, Clone, Default)]
pub struct PoolMetrics {
    processed: SharedCounter,
    failed: SharedCounter,
    panicked: SharedCounter,
}

impl PoolMetrics {
    /// Number of jobs that completed successfully.
    pub fn processed(&self) -> u64 {
        self.processed.value()
    }

    /// Number of jobs whose processing returned an error.
    pub fn failed(&self) -> u64 {
        self.failed.value()
    }

    /// Number of jobs whose processing panicked.
    pub fn panicked(&self) -> u64 {
        self.panicked.value()
    }
}

/// Pool of identical workers draining a shared job queue.
///
/// [`WorkerPool`] owns a bounded job queue and a bounded result queue. Once
/// started, a fixed set of workers competes for jobs, applies the processing
/// function, and emits one [`TaskResult`] per consumed job. Failures and panics
/// are contained to the failing job: the result carries the error and the
/// worker moves on.
///
/// Closing the job queue is the graceful drain path: workers finish the
/// remaining jobs and the result queue closes once all of them have exited.
/// Firing the shutdown signal is the fast path: workers abandon the job queue
/// at their next suspension point.
pub struct WorkerPool<I, O, F> {
    config: PoolConfig,
    jobs: BoundedQueue<Job<I>>,
    results: BoundedQueue<TaskResult<O>>,
    process: F,
    shutdown_rx: ShutdownRx,
    metrics: PoolMetrics,
}

impl<I, O, F> WorkerPool<I, O, F> {
    /// Creates a new pool with its queues sized from `config`.
    ///
    /// Returns [`ErrorKind::ConfigError`] if the configuration is invalid.
    pub fn new(config: PoolConfig, shutdown_rx: ShutdownRx, process: F) -> ConveyorResult<Self> {
        config.validate()?;

        Ok(Self {
            jobs: BoundedQueue::new(config.job_queue_capacity),
            results: BoundedQueue::new(config.result_queue_capacity),
            config,
            process,
            shutdown_rx,
            metrics: PoolMetrics::default(),
        })
    }

    /// Returns the submission side of the job queue.
    ///
    /// The caller that produces jobs is also responsible for closing this queue
    /// when no more jobs will be submitted.
    pub fn jobs(&self) -> BoundedQueue<Job<I>> {
        self.jobs.clone()
    }

    /// Returns the consumer side of the result queue.
    pub fn results(&self) -> QueueReader<TaskResult<O>> {
        self.results.reader()
    }

    /// Returns a live view of the pool counters.
    pub fn metrics(&self) -> PoolMetrics {
        self.metrics.clone()
    }
}

impl<I, O, F> std::fmt::Debug for WorkerPool<I, O, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("jobs", &self.jobs)
            .field("results", &self.results)
            .finish()
    }
}

impl<I, O, F, Fut> Worker<PoolHandle, PoolMetrics> for WorkerPool<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Job<I>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ConveyorResult<O>> + Send + 'static,
{
    type Error = ConveyorError;

    async fn start(self) -> ConveyorResult<PoolHandle> {
        let mut join_set = JoinSet::new();
        for worker_id in 0..self.config.workers {
            join_set.spawn(worker_loop(
                worker_id,
                self.jobs.clone(),
                self.results.clone(),
                self.process.clone(),
                self.shutdown_rx.clone(),
                self.metrics.clone(),
            ));
        }

        debug!(workers = self.config.workers, "worker pool started");

        let results = self.results;
        let supervisor = tokio::spawn(async move {
            let mut errors = Vec::new();

            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!(error = %err, "pool worker exited with error");
                        errors.push(err);
                    }
                    Err(join_err) => {
                        errors.push(conveyor_error!(
                            ErrorKind::TaskPanic,
                            "pool worker task panicked",
                            detail = join_err.to_string()
                        ));
                    }
                }
            }

            // All workers have exited, so no further results can be produced.
            results.close();
            debug!("worker pool drained, result queue closed");

            if errors.is_empty() { Ok(()) } else { Err(errors.into()) }
        });

        Ok(PoolHandle {
            metrics: self.metrics,
            supervisor,
        })
    }
}

/// Handle to a started [`WorkerPool`].
#[derive(Debug)]
pub struct PoolHandle {
    metrics: PoolMetrics,
    supervisor: JoinHandle<ConveyorResult<()>>,
}

impl WorkerHandle<PoolMetrics> for PoolHandle {
    fn state(&self) -> PoolMetrics {
        self.metrics.clone()
    }

    async fn wait(self) -> ConveyorResult<()> {
        match self.supervisor.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(conveyor_error!(
                ErrorKind::TaskPanic,
                "pool supervisor task panicked",
                detail = join_err.to_string()
            )),
        }
    }
}

async fn worker_loop<I, O, F, Fut>(
    worker_id: usize,
    jobs: BoundedQueue<Job<I>>,
    results: BoundedQueue<TaskResult<O>>,
    process: F,
    shutdown_rx: ShutdownRx,
    metrics: PoolMetrics,
) -> ConveyorResult<()>
where
    F: Fn(Job<I>) -> Fut,
    Fut: Future<Output = ConveyorResult<O>>,
{
    loop {
        let job = match jobs.get_or_shutdown(&shutdown_rx).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                debug!(worker_id, "job queue closed, worker exiting");
                return Ok(());
            }
            Err(_) => {
                debug!(worker_id, "shutdown requested, worker exiting");
                return Ok(());
            }
        };

        let job_id = job.id;
        let output = match AssertUnwindSafe(process(job)).catch_unwind().await {
            Ok(Ok(value)) => {
                metrics.processed.increment();
                Ok(value)
            }
            Ok(Err(err)) => {
                metrics.failed.increment();
                warn!(worker_id, job_id, error = %err, "job failed");
                Err(err)
            }
            Err(panic) => {
                metrics.panicked.increment();
                let message = panic_message(panic.as_ref());
                error!(worker_id, job_id, panic = %message, "job panicked");
                Err(conveyor_error!(
                    ErrorKind::TaskPanic,
                    "job processing panicked",
                    detail = message
                ))
            }
        };

        let result = TaskResult { job_id, output };
        if results.put_or_shutdown(result, &shutdown_rx).await.is_err() {
            debug!(worker_id, "result delivery interrupted, worker exiting");
            return Ok(());
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
