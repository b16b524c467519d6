//! Worker pools that execute scheduled work.
//!
//! A [`WorkerPool`] runs N workers against one queue of a shared
//! [`WorkQueuing`](crate::queuing::WorkQueuing) coordinator. Pools in several
//! processes can serve the same queue; the store's atomic pop delivers each
//! item to exactly one worker.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │   Producer   │
//!                      │ (API/CLI)    │
//!                      └──────┬───────┘
//!                             │ add_scheduled_work
//!                      ┌──────▼───────┐
//!                      │    Redis     │
//!                      │ queue:<id>   │
//!                      └──────┬───────┘
//!                             │ BRPOP
//!         ┌───────────────────┼───────────────────┐
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!    ┌─────────┐         ┌─────────┐         ┌─────────┐
//!    │ Worker 1│         │ Worker 2│         │ Worker N│
//!    └─────────┘         └─────────┘         └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workq::scheduler::{WorkerPool, WorkerPoolConfig};
//!
//! let queuing = Arc::new(WorkQueuing::connect(QueuingConfig::from_env()?).await?);
//! queuing.init().await?;
//!
//! let config = WorkerPoolConfig::new(4).with_queue_id("images");
//! let mut pool = WorkerPool::new(config, queuing, Arc::new(ThumbnailHandler))?;
//! pool.start().await?;
//!
//! // Suspends pending work, then waits for in-flight items
//! pool.shutdown().await?;
//! ```

pub mod worker_pool;

pub use worker_pool::{PoolError, PoolStats, WorkHandler, WorkerPool, WorkerPoolConfig};
