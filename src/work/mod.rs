//! Work items and their persisted representations.
//!
//! - `WorkItem`: the unit of deferred execution stored in the keyed store
//! - `WorkState` / `StateRecord`: lifecycle phase and its single-byte tag encoding
//! - `WorkCodec`: versioned payload codec used for the `data` hash

pub mod codec;
pub mod item;
pub mod state;

pub use codec::{WorkCodec, PAYLOAD_VERSION};
pub use item::WorkItem;
pub use state::{StateRecord, UnknownStateTag, WorkState};
