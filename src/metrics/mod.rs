//! Prometheus metrics for queue activity.
//!
//! Each `WorkQueuing` instance owns a [`QueuingMetrics`] with its own
//! registry, so several coordinators in one process never collide.
//!
//! # Example
//!
//! ```ignore
//! use workq::metrics::QueuingMetrics;
//!
//! let metrics = QueuingMetrics::new()?;
//! metrics.record_scheduled("default");
//! let text = metrics.export();
//! ```

pub mod prometheus;

pub use self::prometheus::QueuingMetrics;
