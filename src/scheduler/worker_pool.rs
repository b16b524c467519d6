//! Worker pool for executing work from a scheduled queue.
//!
//! Each worker runs as an independent async task that takes work from the
//! queue's shared scheduled list and drives it through the coordinator:
//!
//! ```text
//! take ──► work_running ──► WorkHandler::execute (bounded by job_timeout) ──► work_completed
//! ```
//!
//! # Features
//!
//! - Configurable number of workers
//! - Graceful shutdown with a cancellation token
//! - Optional suspension of pending work on shutdown
//! - Pool statistics tracking
//!
//! Handler failures and timeouts are recorded on the item's `error` field and
//! the item still completes. The pool never retries.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::QueuingError;
use crate::queuing::{ScheduledQueue, WorkQueuing};
use crate::work::WorkItem;

/// Pause after a store failure before the worker tries again.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Errors that can occur in the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// A coordinator call failed.
    #[error("Queuing error: {0}")]
    Queuing(#[from] QueuingError),

    /// The pool configuration is unusable.
    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),

    /// Pool is already running.
    #[error("Pool is already running")]
    AlreadyRunning,

    /// Pool is not running.
    #[error("Pool is not running")]
    NotRunning,

    /// Shutdown timed out.
    #[error("Shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}

/// Executes one kind of work.
///
/// Implementations record their output with [`WorkItem::set_result`]. An
/// `Err` is stored on the item as its error message.
#[async_trait]
pub trait WorkHandler: Send + Sync {
    async fn execute(&self, work: &mut WorkItem) -> anyhow::Result<()>;
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker tasks to spawn.
    pub num_workers: usize,
    /// Queue the workers take work from.
    pub queue_id: String,
    /// Maximum time allowed for executing a single work item.
    pub job_timeout: Duration,
    /// Timeout for graceful shutdown.
    pub shutdown_timeout: Duration,
    /// Move pending work to the suspended list before stopping.
    pub suspend_on_shutdown: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_id: "default".to_string(),
            job_timeout: Duration::from_secs(1800), // 30 minutes
            shutdown_timeout: Duration::from_secs(60),
            suspend_on_shutdown: true,
        }
    }
}

impl WorkerPoolConfig {
    /// Creates a new configuration with the specified number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Sets the queue id.
    pub fn with_queue_id(mut self, queue_id: impl Into<String>) -> Self {
        self.queue_id = queue_id.into();
        self
    }

    /// Sets the job timeout.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    /// Sets the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets whether pending work is suspended on shutdown.
    pub fn with_suspend_on_shutdown(mut self, suspend: bool) -> Self {
        self.suspend_on_shutdown = suspend;
        self
    }

    fn validate(&self) -> Result<(), PoolError> {
        if self.num_workers == 0 {
            return Err(PoolError::InvalidConfig(
                "num_workers must be greater than 0".to_string(),
            ));
        }
        if self.queue_id.is_empty() {
            return Err(PoolError::InvalidConfig(
                "queue_id cannot be empty".to_string(),
            ));
        }
        if self.job_timeout.is_zero() {
            return Err(PoolError::InvalidConfig(
                "job_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Statistics about the worker pool.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total number of workers in the pool.
    pub num_workers: usize,
    /// Number of workers currently executing work.
    pub active_workers: usize,
    /// Total number of work items completed successfully.
    pub jobs_completed: u64,
    /// Total number of work items that failed or timed out.
    pub jobs_failed: u64,
    /// Average execution duration.
    pub average_job_duration: Duration,
}

impl PoolStats {
    /// Returns the total number of work items processed (completed + failed).
    pub fn total_processed(&self) -> u64 {
        self.jobs_completed + self.jobs_failed
    }

    /// Returns the success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_processed();
        if total == 0 {
            return 0.0;
        }
        (self.jobs_completed as f64 / total as f64) * 100.0
    }
}

/// Shared state for tracking pool statistics.
struct SharedPoolStats {
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    total_duration_ms: AtomicU64,
    active_workers: AtomicU64,
}

impl SharedPoolStats {
    fn new() -> Self {
        Self {
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            active_workers: AtomicU64::new(0),
        }
    }

    fn record(&self, success: bool, duration: Duration) {
        if success {
            self.jobs_completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.jobs_failed.fetch_add(1, Ordering::SeqCst);
        }
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    fn increment_active(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement_active(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    fn to_pool_stats(&self, num_workers: usize) -> PoolStats {
        let completed = self.jobs_completed.load(Ordering::SeqCst);
        let failed = self.jobs_failed.load(Ordering::SeqCst);
        let total_duration_ms = self.total_duration_ms.load(Ordering::SeqCst);
        let active = self.active_workers.load(Ordering::SeqCst);

        let total_jobs = completed + failed;
        let average_duration = if total_jobs > 0 {
            Duration::from_millis(total_duration_ms / total_jobs)
        } else {
            Duration::ZERO
        };

        PoolStats {
            num_workers,
            active_workers: active as usize,
            jobs_completed: completed,
            jobs_failed: failed,
            average_job_duration: average_duration,
        }
    }
}

/// Worker pool that runs a fixed number of workers against one queue.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    queuing: Arc<WorkQueuing>,
    handler: Arc<dyn WorkHandler>,
    cancel: CancellationToken,
    worker_handles: Vec<JoinHandle<()>>,
    stats: Arc<SharedPoolStats>,
    is_running: AtomicBool,
}

impl WorkerPool {
    /// Creates a new worker pool.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is unusable.
    pub fn new(
        config: WorkerPoolConfig,
        queuing: Arc<WorkQueuing>,
        handler: Arc<dyn WorkHandler>,
    ) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            config,
            queuing,
            handler,
            cancel: CancellationToken::new(),
            worker_handles: Vec::new(),
            stats: Arc::new(SharedPoolStats::new()),
            is_running: AtomicBool::new(false),
        })
    }

    /// Starts all workers in the pool.
    ///
    /// Uses the queue's registered handle, registering one if needed.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::AlreadyRunning` if the pool is already running.
    pub async fn start(&mut self) -> Result<(), PoolError> {
        if self.is_running.load(Ordering::SeqCst) {
            return Err(PoolError::AlreadyRunning);
        }

        let queue_id = self.config.queue_id.as_str();
        let queue = match self.queuing.get_scheduled_queue(queue_id).await {
            Ok(queue) => queue,
            Err(QueuingError::NotConfigured(_)) => {
                self.queuing.init_schedule_queue(queue_id).await?
            }
            Err(e) => return Err(e.into()),
        };

        self.cancel = CancellationToken::new();
        for i in 0..self.config.num_workers {
            let worker = Worker {
                id: format!("worker-{}", i),
                queue: Arc::clone(&queue),
                queuing: Arc::clone(&self.queuing),
                handler: Arc::clone(&self.handler),
                cancel: self.cancel.clone(),
                job_timeout: self.config.job_timeout,
                stats: Arc::clone(&self.stats),
            };

            let handle = tokio::spawn(async move {
                worker.run().await;
            });

            self.worker_handles.push(handle);
        }

        self.is_running.store(true, Ordering::SeqCst);
        info!(
            queue_id = %self.config.queue_id,
            num_workers = self.config.num_workers,
            "Worker pool started"
        );

        Ok(())
    }

    /// Gracefully shuts down all workers.
    ///
    /// With `suspend_on_shutdown`, pending work is first moved to the
    /// suspended list so the next `WorkQueuing::init` reschedules it. Workers
    /// then finish their current item and stop.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::ShutdownTimeout` if workers don't stop within
    /// the configured timeout. Workers still running at that point are
    /// aborted, and the item they were executing stays in the running set.
    pub async fn shutdown(&mut self) -> Result<(), PoolError> {
        if !self.is_running.load(Ordering::SeqCst) {
            return Err(PoolError::NotRunning);
        }

        info!(queue_id = %self.config.queue_id, "Initiating worker pool shutdown");

        if self.config.suspend_on_shutdown {
            if let Err(e) = self.queuing.set_suspending(&self.config.queue_id).await {
                warn!(
                    queue_id = %self.config.queue_id,
                    error = %e,
                    "Failed to suspend pending work"
                );
            }
        }

        self.cancel.cancel();

        let mut handles = std::mem::take(&mut self.worker_handles);
        let shutdown_future = async {
            for handle in handles.iter_mut() {
                if let Err(e) = handle.await {
                    error!(error = %e, "Worker task panicked during shutdown");
                }
            }
        };

        let result = tokio::time::timeout(self.config.shutdown_timeout, shutdown_future).await;
        self.is_running.store(false, Ordering::SeqCst);
        match result {
            Ok(()) => {
                info!(queue_id = %self.config.queue_id, "Worker pool shutdown complete");
                Ok(())
            }
            Err(_) => {
                // Aborting a finished task is a no-op.
                for handle in &handles {
                    handle.abort();
                }
                warn!(
                    queue_id = %self.config.queue_id,
                    timeout = ?self.config.shutdown_timeout,
                    "Worker pool shutdown timed out, remaining workers aborted"
                );
                Err(PoolError::ShutdownTimeout(self.config.shutdown_timeout))
            }
        }
    }

    /// Returns current pool statistics.
    pub fn stats(&self) -> PoolStats {
        self.stats.to_pool_stats(self.config.num_workers)
    }

    /// Returns whether the pool is currently running.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::SeqCst)
    }

    /// Returns the number of workers in the pool.
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    pub fn queue_id(&self) -> &str {
        &self.config.queue_id
    }
}

/// A single worker that executes work from the queue.
struct Worker {
    id: String,
    queue: Arc<ScheduledQueue>,
    queuing: Arc<WorkQueuing>,
    handler: Arc<dyn WorkHandler>,
    cancel: CancellationToken,
    job_timeout: Duration,
    stats: Arc<SharedPoolStats>,
}

impl Worker {
    /// Main worker loop. Runs until the cancellation token fires.
    async fn run(self) {
        debug!(worker_id = %self.id, queue_id = %self.queue.queue_id(), "Worker started");

        while !self.cancel.is_cancelled() {
            match self.queue.take(&self.cancel).await {
                Ok(Some(work)) => self.process(work).await,
                Ok(None) => break,
                Err(e) => {
                    error!(worker_id = %self.id, error = %e, "Failed to dequeue work");
                    self.back_off().await;
                }
            }
        }

        debug!(worker_id = %self.id, "Worker stopped");
    }

    /// Drives one work item from running to completed.
    async fn process(&self, mut work: WorkItem) {
        let queue_id = self.queue.queue_id();

        if let Err(e) = self.queuing.work_running(queue_id, &mut work).await {
            error!(
                worker_id = %self.id,
                work_id = %work.id,
                error = %e,
                "Failed to mark work running, returning it to the queue"
            );
            if let Err(e) = self.queuing.add_scheduled_work(queue_id, &mut work).await {
                error!(
                    worker_id = %self.id,
                    work_id = %work.id,
                    error = %e,
                    "Failed to return work to the queue, work lost"
                );
            }
            self.back_off().await;
            return;
        }

        self.stats.increment_active();
        let start_time = Instant::now();

        match tokio::time::timeout(self.job_timeout, self.handler.execute(&mut work)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => work.set_error(format!("{:#}", e)),
            Err(_) => work.set_error(format!("timed out after {:?}", self.job_timeout)),
        }

        let duration = start_time.elapsed();
        let success = work.error.is_none();
        self.stats.decrement_active();
        self.stats.record(success, duration);
        self.queuing
            .metrics()
            .observe_duration(queue_id, duration.as_secs_f64());

        if success {
            info!(
                worker_id = %self.id,
                work_id = %work.id,
                duration_ms = duration.as_millis() as u64,
                "Work executed"
            );
        } else {
            warn!(
                worker_id = %self.id,
                work_id = %work.id,
                error = ?work.error,
                "Work failed"
            );
        }

        if let Err(e) = self.queuing.work_completed(queue_id, &mut work).await {
            error!(
                worker_id = %self.id,
                work_id = %work.id,
                error = %e,
                "Failed to mark work complete"
            );
        }
    }

    /// Waits `RETRY_DELAY`, or less if the pool is shutting down.
    async fn back_off(&self) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = tokio::time::sleep(RETRY_DELAY) => {}
        }
    }
}
