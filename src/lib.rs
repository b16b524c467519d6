//! workq: crash-recoverable work queues on a shared keyed store.
//!
//! Work items are scheduled onto named queues kept in Redis, popped by
//! workers in any process, and tracked through their lifecycle:
//! scheduled, running, completed or canceled. Pending work can be suspended
//! before shutdown and is rescheduled on the next start.
//!
//! - [`store`]: keyed store client (`RedisStore`, `MemoryStore`)
//! - [`work`]: work items, state tags and the payload codec
//! - [`queuing`]: queue state records and the `WorkQueuing` coordinator
//! - [`scheduler`]: worker pools executing scheduled work

pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod queuing;
pub mod scheduler;
pub mod store;
pub mod work;

pub use config::{ConfigError, QueuingConfig};
pub use error::{CodecError, QueuingError, StoreError};
pub use queuing::{QueueStats, ScheduledQueue, WorkQueuing};
pub use work::{StateRecord, WorkItem, WorkState};
