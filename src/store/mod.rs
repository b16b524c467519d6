//! Keyed store client.
//!
//! The queuing core talks to its shared store only through the [`Store`]
//! trait. Each method is a single round trip named after the primitive it
//! issues. Multi-step writes are collected into a [`WriteBatch`] and sent
//! with [`Store::apply`], which executes them in one round trip:
//!
//! - `RedisStore` sends the batch as a MULTI/EXEC pipeline
//! - `MemoryStore` applies the batch under its single lock
//!
//! Reads interleaved between batches are not transactional.

pub mod memory;
pub mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

pub use crate::error::StoreError;
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// A single write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    HashSet {
        key: String,
        field: String,
        value: Vec<u8>,
    },
    HashDelete {
        key: String,
        field: String,
    },
    PushFront {
        key: String,
        value: String,
    },
    SetAdd {
        key: String,
        member: String,
    },
    SetRemove {
        key: String,
        member: String,
    },
}

/// An ordered group of writes executed in one round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<StoreOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hash_set(mut self, key: &str, field: &str, value: impl Into<Vec<u8>>) -> Self {
        self.ops.push(StoreOp::HashSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn hash_delete(mut self, key: &str, field: &str) -> Self {
        self.ops.push(StoreOp::HashDelete {
            key: key.to_string(),
            field: field.to_string(),
        });
        self
    }

    pub fn push_front(mut self, key: &str, value: &str) -> Self {
        self.ops.push(StoreOp::PushFront {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn set_add(mut self, key: &str, member: &str) -> Self {
        self.ops.push(StoreOp::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn set_remove(mut self, key: &str, member: &str) -> Self {
        self.ops.push(StoreOp::SetRemove {
            key: key.to_string(),
            member: member.to_string(),
        });
        self
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<StoreOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Atomic list, set and hash primitives over a shared keyspace.
///
/// List values, set members and hash fields are work ids (UTF-8 strings);
/// hash values are opaque bytes.
#[async_trait]
pub trait Store: Send + Sync {
    /// LPUSH a value onto the head of a list.
    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// RPOP the tail of a list.
    async fn pop_back(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// BRPOP the tail of a list, waiting up to `timeout` for a value.
    async fn blocking_pop_back(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError>;

    /// RPOPLPUSH: atomically move the tail of `src` to the head of `dst`.
    async fn pop_back_push_front(&self, src: &str, dst: &str)
        -> Result<Option<String>, StoreError>;

    /// All values of a list, head first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Removes every occurrence of `value`, returning how many were removed.
    async fn list_remove(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    async fn list_len(&self, key: &str) -> Result<usize, StoreError>;

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError>;

    /// SPOP an arbitrary member.
    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), StoreError>;

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError>;

    /// Names of all keys starting with `prefix`.
    async fn keys_matching_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Executes a batch of writes in one round trip.
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
