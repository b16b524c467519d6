//! In-process keyed store with Redis semantics.
//!
//! Lists, sets and hashes live behind one mutex, so every primitive and every
//! [`WriteBatch`] is atomic. As in Redis, a list or set that becomes empty
//! stops existing as a key, which matters for prefix scans.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{Store, StoreError, StoreOp, WriteBatch};

#[derive(Debug, Default)]
struct Keyspace {
    lists: HashMap<String, VecDeque<String>>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, Vec<u8>>>,
}

impl Keyspace {
    fn push_front(&mut self, key: &str, value: &str) {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
    }

    fn pop_back(&mut self, key: &str) -> Option<String> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    fn set_add(&mut self, key: &str, member: &str) {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    fn set_remove(&mut self, key: &str, member: &str) {
        if let Some(set) = self.sets.get_mut(key) {
            set.remove(member);
            if set.is_empty() {
                self.sets.remove(key);
            }
        }
    }

    fn hash_set(&mut self, key: &str, field: &str, value: Vec<u8>) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn hash_delete(&mut self, key: &str, field: &str) {
        if let Some(hash) = self.hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                self.hashes.remove(key);
            }
        }
    }
}

/// Keyed store held in process memory.
///
/// Shares nothing across processes; intended for tests and single-process
/// deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    /// Woken whenever a list receives a value.
    pushed: Notify,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Keyspace>, StoreError> {
        self.keyspace
            .lock()
            .map_err(|_| StoreError::InvalidData("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn push_front(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock()?.push_front(key, value);
        self.pushed.notify_waiters();
        Ok(())
    }

    async fn pop_back(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.pop_back(key))
    }

    async fn blocking_pop_back(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<String>, StoreError> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking, so a push landing between the
            // check and the wait is not missed.
            let notified = self.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = self.lock()?.pop_back(key) {
                return Ok(Some(value));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn pop_back_push_front(
        &self,
        src: &str,
        dst: &str,
    ) -> Result<Option<String>, StoreError> {
        let moved = {
            let mut keyspace = self.lock()?;
            let value = keyspace.pop_back(src);
            if let Some(ref v) = value {
                keyspace.push_front(dst, v);
            }
            value
        };
        if moved.is_some() {
            self.pushed.notify_waiters();
        }
        Ok(moved)
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .lists
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut keyspace = self.lock()?;
        let Some(list) = keyspace.lists.get_mut(key) else {
            return Ok(0);
        };
        let before = list.len();
        list.retain(|v| v != value);
        let removed = before - list.len();
        if list.is_empty() {
            keyspace.lists.remove(key);
        }
        Ok(removed)
    }

    async fn list_len(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.lock()?.lists.get(key).map_or(0, VecDeque::len))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.lock()?.set_add(key, member);
        Ok(())
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.lock()?.set_remove(key, member);
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()?
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_cardinality(&self, key: &str) -> Result<usize, StoreError> {
        Ok(self.lock()?.sets.get(key).map_or(0, HashSet::len))
    }

    async fn set_pop(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut keyspace = self.lock()?;
        let member = keyspace
            .sets
            .get(key)
            .and_then(|set| set.iter().next().cloned());
        if let Some(ref m) = member {
            keyspace.set_remove(key, m);
        }
        Ok(member)
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .lock()?
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock()?.hash_set(key, field, value.to_vec());
        Ok(())
    }

    async fn hash_delete(&self, key: &str, field: &str) -> Result<(), StoreError> {
        self.lock()?.hash_delete(key, field);
        Ok(())
    }

    async fn keys_matching_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let keyspace = self.lock()?;
        let keys = keyspace
            .lists
            .keys()
            .chain(keyspace.sets.keys())
            .chain(keyspace.hashes.keys())
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        Ok(keys)
    }

    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut pushed = false;
        {
            let mut keyspace = self.lock()?;
            for op in batch.into_ops() {
                match op {
                    StoreOp::HashSet { key, field, value } => keyspace.hash_set(&key, &field, value),
                    StoreOp::HashDelete { key, field } => keyspace.hash_delete(&key, &field),
                    StoreOp::PushFront { key, value } => {
                        keyspace.push_front(&key, &value);
                        pushed = true;
                    }
                    StoreOp::SetAdd { key, member } => keyspace.set_add(&key, &member),
                    StoreOp::SetRemove { key, member } => keyspace.set_remove(&key, &member),
                }
            }
        }
        if pushed {
            self.pushed.notify_waiters();
        }
        Ok(())
    }
}
