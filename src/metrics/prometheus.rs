//! Prometheus metrics registration and export.
//!
//! Defines the metrics recorded by the queuing coordinator and the worker
//! pool, registered on a registry owned by the [`QueuingMetrics`] instance.

use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Queue activity metrics, labeled by queue id.
#[derive(Clone)]
pub struct QueuingMetrics {
    registry: Registry,
    /// Work pushed onto a scheduled list.
    scheduled: IntCounterVec,
    /// Work marked running.
    running: IntCounterVec,
    /// Work marked completed, labeled by outcome (success/failure).
    completed: IntCounterVec,
    /// Scheduled work removed by id.
    canceled: IntCounterVec,
    /// Ids drained into the suspended list.
    suspended: IntCounterVec,
    /// Ids drained back from the suspended list.
    resumed: IntCounterVec,
    /// Terminal work removed by purges, labeled by state.
    purged: IntCounterVec,
    /// Last observed membership size, labeled by queue and state.
    queue_depth: GaugeVec,
    /// Handler execution time in seconds.
    work_duration: HistogramVec,
}

impl QueuingMetrics {
    /// Creates all metrics and registers them with a fresh registry.
    ///
    /// # Errors
    ///
    /// Returns a `prometheus::Error` if a metric definition is invalid.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let scheduled = IntCounterVec::new(
            Opts::new("workq_scheduled_total", "Total work items scheduled"),
            &["queue"],
        )?;
        let running = IntCounterVec::new(
            Opts::new("workq_running_total", "Total work items marked running"),
            &["queue"],
        )?;
        let completed = IntCounterVec::new(
            Opts::new("workq_completed_total", "Total work items completed"),
            &["queue", "outcome"],
        )?;
        let canceled = IntCounterVec::new(
            Opts::new("workq_canceled_total", "Total scheduled work items canceled"),
            &["queue"],
        )?;
        let suspended = IntCounterVec::new(
            Opts::new("workq_suspended_total", "Total work items moved to suspended"),
            &["queue"],
        )?;
        let resumed = IntCounterVec::new(
            Opts::new("workq_resumed_total", "Total suspended work items rescheduled"),
            &["queue"],
        )?;
        let purged = IntCounterVec::new(
            Opts::new("workq_purged_total", "Total terminal work items purged"),
            &["queue", "state"],
        )?;
        let queue_depth = GaugeVec::new(
            Opts::new("workq_queue_depth", "Number of work ids per queue and state"),
            &["queue", "state"],
        )?;
        let work_duration = HistogramVec::new(
            HistogramOpts::new(
                "workq_work_duration_seconds",
                "Work handler execution time in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 600.0]),
            &["queue"],
        )?;

        registry.register(Box::new(scheduled.clone()))?;
        registry.register(Box::new(running.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(canceled.clone()))?;
        registry.register(Box::new(suspended.clone()))?;
        registry.register(Box::new(resumed.clone()))?;
        registry.register(Box::new(purged.clone()))?;
        registry.register(Box::new(queue_depth.clone()))?;
        registry.register(Box::new(work_duration.clone()))?;

        Ok(Self {
            registry,
            scheduled,
            running,
            completed,
            canceled,
            suspended,
            resumed,
            purged,
            queue_depth,
            work_duration,
        })
    }

    pub fn record_scheduled(&self, queue_id: &str) {
        self.scheduled.with_label_values(&[queue_id]).inc();
    }

    pub fn record_running(&self, queue_id: &str) {
        self.running.with_label_values(&[queue_id]).inc();
    }

    pub fn record_completed(&self, queue_id: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.completed.with_label_values(&[queue_id, outcome]).inc();
    }

    pub fn record_canceled(&self, queue_id: &str) {
        self.canceled.with_label_values(&[queue_id]).inc();
    }

    pub fn record_suspended(&self, queue_id: &str, count: usize) {
        self.suspended
            .with_label_values(&[queue_id])
            .inc_by(count as u64);
    }

    pub fn record_resumed(&self, queue_id: &str, count: usize) {
        self.resumed.with_label_values(&[queue_id]).inc_by(count as u64);
    }

    pub fn record_purged(&self, queue_id: &str, state: &str, count: usize) {
        self.purged
            .with_label_values(&[queue_id, state])
            .inc_by(count as u64);
    }

    pub fn set_queue_depth(&self, queue_id: &str, state: &str, depth: usize) {
        self.queue_depth
            .with_label_values(&[queue_id, state])
            .set(depth as f64);
    }

    pub fn observe_duration(&self, queue_id: &str, secs: f64) {
        self.work_duration.with_label_values(&[queue_id]).observe(secs);
    }

    /// Exports all registered metrics in Prometheus text format.
    ///
    /// Encoding failures are reported inline as a comment line.
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# Error encoding metrics: {}\n", e);
        }

        String::from_utf8(buffer)
            .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
    }
}
