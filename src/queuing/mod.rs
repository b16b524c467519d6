//! Crash-recoverable work queuing over a keyed store.
//!
//! - [`keys`]: store key layout and per-queue membership collections
//! - [`state_store`]: reads and composite writes of queue state records
//! - [`scheduled`]: in-process handle on one queue's scheduled list
//! - [`coordinator`]: the `WorkQueuing` public contract
//!
//! # Example
//!
//! ```ignore
//! use workq::queuing::WorkQueuing;
//! use workq::{QueuingConfig, WorkItem};
//!
//! let queuing = WorkQueuing::connect(QueuingConfig::from_env()?).await?;
//! queuing.init().await?;
//!
//! let queue = queuing.init_schedule_queue("default").await?;
//! let mut work = WorkItem::new("default", "convert");
//! queue.offer(&mut work).await?;
//! ```

pub mod coordinator;
pub mod keys;
pub mod scheduled;
pub mod state_store;

pub use coordinator::{QueueStats, WorkQueuing};
pub use keys::{KeyLayout, Membership};
pub use scheduled::ScheduledQueue;
pub use state_store::QueueStateStore;
