//! Queue state records over the keyed store.
//!
//! `QueueStateStore` knows the key layout and the record encodings. It reads
//! queue membership and work state, and issues the composite record writes
//! the coordinator builds its lifecycle on. Each composite write is one
//! [`WriteBatch`], so it reaches the store in a single round trip.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::error::QueuingError;
use crate::store::{Store, WriteBatch};
use crate::work::{StateRecord, WorkCodec, WorkItem, WorkState};

use super::keys::{KeyLayout, Membership};

/// Reads and writes per-queue membership and the shared `data`/`state` hashes.
#[derive(Clone)]
pub struct QueueStateStore {
    store: Arc<dyn Store>,
    keys: KeyLayout,
    codec: WorkCodec,
}

impl QueueStateStore {
    pub fn new(store: Arc<dyn Store>, keys: KeyLayout) -> Self {
        Self {
            store,
            keys,
            codec: WorkCodec::new(),
        }
    }

    pub fn keys(&self) -> &KeyLayout {
        &self.keys
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Number of ids in a queue's membership collection.
    pub async fn size(&self, queue_id: &str, membership: Membership) -> Result<usize, QueuingError> {
        let key = self.keys.queue_key(membership, queue_id);
        let size = if membership.is_list() {
            self.store.list_len(&key).await?
        } else {
            self.store.set_cardinality(&key).await?
        };
        Ok(size)
    }

    /// Ids in a queue's membership collection. Lists come back head first.
    pub async fn list_ids(
        &self,
        queue_id: &str,
        membership: Membership,
    ) -> Result<Vec<String>, QueuingError> {
        let key = self.keys.queue_key(membership, queue_id);
        let ids = if membership.is_list() {
            self.store.list_range(&key).await?
        } else {
            self.store.set_members(&key).await?
        };
        Ok(ids)
    }

    /// Work items in a queue's membership collection.
    ///
    /// Payloads are fetched one by one. Ids whose payload has already been
    /// purged are skipped.
    pub async fn list_items(
        &self,
        queue_id: &str,
        membership: Membership,
    ) -> Result<Vec<WorkItem>, QueuingError> {
        let ids = self.list_ids(queue_id, membership).await?;
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            match self.fetch(&id).await? {
                Some(item) => items.push(item),
                None => debug!(queue_id = %queue_id, work_id = %id, "No payload for listed work"),
            }
        }
        Ok(items)
    }

    /// Queues that currently have at least one id in the given membership.
    ///
    /// Found by scanning key names, so the cost follows the number of keys
    /// under the prefix, not the number of items.
    pub async fn queue_ids(&self, membership: Membership) -> Result<BTreeSet<String>, QueuingError> {
        let prefix = self.keys.membership_prefix(membership);
        let keys = self.store.keys_matching_prefix(&prefix).await?;
        Ok(keys
            .iter()
            .filter_map(|key| self.keys.queue_id_from_key(membership, key))
            .map(str::to_string)
            .collect())
    }

    /// Reads and decodes the state record of a work id.
    ///
    /// Unknown tags are logged and reported as absent; the record is left as is.
    pub async fn read_state(&self, work_id: &str) -> Result<Option<StateRecord>, QueuingError> {
        let raw = self.store.hash_get(&self.keys.state_key(), work_id).await?;
        let Some(raw) = raw.filter(|bytes| !bytes.is_empty()) else {
            return Ok(None);
        };
        match StateRecord::decode(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                error!(work_id = %work_id, state = %e.raw, "Unknown work state");
                Ok(None)
            }
        }
    }

    /// Fetches and decodes the payload of a work id.
    pub async fn fetch(&self, work_id: &str) -> Result<Option<WorkItem>, QueuingError> {
        let bytes = self.store.hash_get(&self.keys.data_key(), work_id).await?;
        Ok(self.codec.decode(bytes.as_deref())?)
    }

    /// Stores the payload, marks it scheduled and pushes it onto the queue.
    pub async fn schedule(&self, queue_id: &str, work: &WorkItem) -> Result<(), QueuingError> {
        let data = self.codec.encode(work)?;
        let batch = WriteBatch::new()
            .hash_set(&self.keys.data_key(), &work.id, data)
            .hash_set(&self.keys.state_key(), &work.id, StateRecord::scheduled().encode())
            .push_front(&self.keys.scheduled_key(queue_id), &work.id);
        self.store.apply(batch).await?;
        Ok(())
    }

    /// Pops the oldest scheduled work without waiting.
    pub async fn pop_scheduled(&self, queue_id: &str) -> Result<Option<WorkItem>, QueuingError> {
        let key = self.keys.scheduled_key(queue_id);
        while let Some(id) = self.store.pop_back(&key).await? {
            if let Some(work) = self.fetch(&id).await? {
                return Ok(Some(work));
            }
            warn!(queue_id = %queue_id, work_id = %id, "Dropping scheduled id without payload");
        }
        Ok(None)
    }

    /// Pops the oldest scheduled work, waiting up to `timeout` for one.
    pub async fn pop_scheduled_within(
        &self,
        queue_id: &str,
        timeout: Duration,
    ) -> Result<Option<WorkItem>, QueuingError> {
        let key = self.keys.scheduled_key(queue_id);
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let Some(id) = self.store.blocking_pop_back(&key, remaining).await? else {
                return Ok(None);
            };
            if let Some(work) = self.fetch(&id).await? {
                return Ok(Some(work));
            }
            warn!(queue_id = %queue_id, work_id = %id, "Dropping scheduled id without payload");
        }
    }

    /// Removes a scheduled id from its queue and records it as canceled.
    ///
    /// The canceled state is recorded before the payload is decoded, so a
    /// corrupt payload still leaves the id in the canceled set.
    /// Returns `None` when the id was not in the scheduled list.
    pub async fn cancel_scheduled(
        &self,
        queue_id: &str,
        work_id: &str,
        at_millis: i64,
    ) -> Result<Option<WorkItem>, QueuingError> {
        let removed = self
            .store
            .list_remove(&self.keys.scheduled_key(queue_id), work_id)
            .await?;
        if removed == 0 {
            return Ok(None);
        }

        let batch = WriteBatch::new()
            .hash_set(
                &self.keys.state_key(),
                work_id,
                StateRecord::canceled(at_millis).encode(),
            )
            .set_add(&self.keys.canceled_key(queue_id), work_id);
        self.store.apply(batch).await?;

        let Some(mut work) = self.fetch(work_id).await? else {
            return Ok(None);
        };
        work.state = WorkState::Canceled;
        self.store
            .hash_set(&self.keys.data_key(), work_id, &self.codec.encode(&work)?)
            .await?;
        Ok(Some(work))
    }

    /// Adds the work to the running set and marks it running.
    pub async fn mark_running(&self, queue_id: &str, work: &WorkItem) -> Result<(), QueuingError> {
        let batch = WriteBatch::new()
            .set_add(&self.keys.running_key(queue_id), &work.id)
            .hash_set(&self.keys.state_key(), &work.id, StateRecord::running().encode());
        self.store.apply(batch).await?;
        Ok(())
    }

    /// Persists the finished payload and moves the id from running to completed.
    pub async fn mark_completed(
        &self,
        queue_id: &str,
        work: &WorkItem,
        at_millis: i64,
    ) -> Result<(), QueuingError> {
        let data = self.codec.encode(work)?;
        let batch = WriteBatch::new()
            .hash_set(&self.keys.data_key(), &work.id, data)
            .set_remove(&self.keys.running_key(queue_id), &work.id)
            .set_add(&self.keys.completed_key(queue_id), &work.id)
            .hash_set(
                &self.keys.state_key(),
                &work.id,
                StateRecord::completed(at_millis).encode(),
            );
        self.store.apply(batch).await?;
        Ok(())
    }

    /// Moves every id from one list to another, tail to head, one round trip
    /// per id. Returns the number moved.
    pub async fn drain(
        &self,
        queue_id: &str,
        from: Membership,
        to: Membership,
    ) -> Result<usize, QueuingError> {
        debug_assert!(from.is_list() && to.is_list());
        let src = self.keys.queue_key(from, queue_id);
        let dst = self.keys.queue_key(to, queue_id);
        let mut moved = 0;
        while self.store.pop_back_push_front(&src, &dst).await?.is_some() {
            moved += 1;
        }
        Ok(moved)
    }

    /// Deletes terminal work of a queue along with its data and state.
    ///
    /// With `threshold_millis <= 0` every id in the collection goes. Otherwise
    /// only ids whose recorded state still carries the expected tag and a
    /// timestamp strictly before the threshold are removed; anything else is
    /// left untouched. Returns the number of ids removed.
    pub async fn purge(
        &self,
        queue_id: &str,
        state: WorkState,
        threshold_millis: i64,
    ) -> Result<usize, QueuingError> {
        if !state.is_terminal() {
            return Err(QueuingError::UnsupportedState(state));
        }

        let set_key = self.keys.queue_key(Membership::from(state), queue_id);
        let state_key = self.keys.state_key();
        let data_key = self.keys.data_key();
        let mut removed = 0;

        if threshold_millis <= 0 {
            while let Some(id) = self.store.set_pop(&set_key).await? {
                let batch = WriteBatch::new()
                    .hash_delete(&state_key, &id)
                    .hash_delete(&data_key, &id);
                self.store.apply(batch).await?;
                removed += 1;
            }
            return Ok(removed);
        }

        for id in self.store.set_members(&set_key).await? {
            let Some(record) = self.read_state(&id).await? else {
                continue;
            };
            if record.state != state {
                continue;
            }
            let Some(at) = record.timestamp else {
                continue;
            };
            if at < threshold_millis {
                let batch = WriteBatch::new()
                    .set_remove(&set_key, &id)
                    .hash_delete(&state_key, &id)
                    .hash_delete(&data_key, &id);
                self.store.apply(batch).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
