//! Work queuing coordinator.
//!
//! `WorkQueuing` is the public contract of the queuing core: schedule, run,
//! complete, cancel, suspend, resume, list and purge work across named queues.
//! It holds no authoritative state beyond the registry of in-process queue
//! handles; the keyed store is the single source of truth.
//!
//! # Lifecycle
//!
//! ```text
//! add_scheduled_work ──► Scheduled ──pop──► work_running ──► Running ──► work_completed ──► Completed
//!                          │    ▲
//!          remove_scheduled│    │schedule_suspended_work
//!                          ▼    │
//!                      Canceled  Suspended ◄── set_suspending
//! ```
//!
//! # Restart protocol
//!
//! Before an orderly shutdown, stop producers and call
//! [`WorkQueuing::set_suspending`] for each queue. On the next start,
//! [`WorkQueuing::init`] moves every suspended id back onto its scheduled
//! list. Items scheduled while a drain is running may or may not be moved.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::QueuingConfig;
use crate::error::QueuingError;
use crate::metrics::QueuingMetrics;
use crate::store::{RedisStore, Store};
use crate::work::{StateRecord, WorkItem, WorkState};

use super::keys::{KeyLayout, Membership};
use super::scheduled::{schedule_work, ScheduledQueue};
use super::state_store::QueueStateStore;

/// Membership sizes of one queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub queue_id: String,
    pub scheduled: usize,
    pub running: usize,
    pub completed: usize,
    pub suspended: usize,
    pub canceled: usize,
}

impl QueueStats {
    /// Ids that still need a worker: scheduled, running or suspended.
    pub fn pending(&self) -> usize {
        self.scheduled + self.running + self.suspended
    }

    pub fn total(&self) -> usize {
        self.pending() + self.completed + self.canceled
    }
}

/// Coordinates work lifecycle over a shared keyed store.
pub struct WorkQueuing {
    config: QueuingConfig,
    states: Arc<QueueStateStore>,
    metrics: Arc<QueuingMetrics>,
    /// Registered queue handles, by queue id.
    scheduled: Mutex<HashMap<String, Arc<ScheduledQueue>>>,
}

impl WorkQueuing {
    /// Creates a coordinator over an existing store.
    ///
    /// # Errors
    ///
    /// Returns `QueuingError::Config` if the configuration is invalid.
    pub fn new(store: Arc<dyn Store>, config: QueuingConfig) -> Result<Self, QueuingError> {
        config.validate()?;
        let keys = KeyLayout::new(config.prefix.clone());
        Ok(Self {
            states: Arc::new(QueueStateStore::new(store, keys)),
            metrics: Arc::new(QueuingMetrics::new()?),
            scheduled: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Connects to the Redis server named in the configuration.
    pub async fn connect(config: QueuingConfig) -> Result<Self, QueuingError> {
        config.validate()?;
        let store = RedisStore::connect(&config.redis_url).await?;
        Self::new(Arc::new(store), config)
    }

    pub fn config(&self) -> &QueuingConfig {
        &self.config
    }

    pub fn metrics(&self) -> &QueuingMetrics {
        &self.metrics
    }

    pub fn state_store(&self) -> &QueueStateStore {
        &self.states
    }

    /// Resumes every queue left suspended by a previous process.
    ///
    /// Returns the total number of ids moved back to scheduled.
    pub async fn init(&self) -> Result<usize, QueuingError> {
        let mut total = 0;
        for queue_id in self.get_suspended_queue_ids().await? {
            total += self.schedule_suspended_work(&queue_id).await?;
        }
        info!(resumed = total, "Work queuing initialized");
        Ok(total)
    }

    /// Registers the in-process handle of a queue.
    ///
    /// # Errors
    ///
    /// Returns `QueuingError::AlreadyConfigured` if the queue has a handle.
    pub async fn init_schedule_queue(
        &self,
        queue_id: &str,
    ) -> Result<Arc<ScheduledQueue>, QueuingError> {
        let mut scheduled = self.scheduled.lock().await;
        if scheduled.contains_key(queue_id) {
            return Err(QueuingError::AlreadyConfigured(queue_id.to_string()));
        }
        let queue = Arc::new(self.new_handle(queue_id));
        scheduled.insert(queue_id.to_string(), Arc::clone(&queue));
        debug!(queue_id = %queue_id, "Scheduled queue registered");
        Ok(queue)
    }

    /// Returns the registered handle of a queue.
    ///
    /// # Errors
    ///
    /// Returns `QueuingError::NotConfigured` if `init_schedule_queue` was not
    /// called for this queue.
    pub async fn get_scheduled_queue(
        &self,
        queue_id: &str,
    ) -> Result<Arc<ScheduledQueue>, QueuingError> {
        self.scheduled
            .lock()
            .await
            .get(queue_id)
            .cloned()
            .ok_or_else(|| QueuingError::NotConfigured(queue_id.to_string()))
    }

    /// Unregisters a queue handle. Stored work is left untouched.
    pub async fn shutdown_schedule_queue(&self, queue_id: &str) -> bool {
        let removed = self.scheduled.lock().await.remove(queue_id).is_some();
        if removed {
            debug!(queue_id = %queue_id, "Scheduled queue unregistered");
        }
        removed
    }

    /// Persists the work and pushes it onto the queue's scheduled list.
    ///
    /// No duplicate detection: scheduling an id twice overwrites its payload
    /// and pushes a second list entry.
    pub async fn add_scheduled_work(
        &self,
        queue_id: &str,
        work: &mut WorkItem,
    ) -> Result<(), QueuingError> {
        schedule_work(&self.states, &self.metrics, queue_id, work).await
    }

    /// Pops the oldest scheduled work, or `None` if the queue is empty.
    pub async fn pop_scheduled(&self, queue_id: &str) -> Result<Option<WorkItem>, QueuingError> {
        self.states.pop_scheduled(queue_id).await
    }

    /// Pops the oldest scheduled work, waiting up to `timeout` for one.
    pub async fn pop_scheduled_within(
        &self,
        queue_id: &str,
        timeout: Duration,
    ) -> Result<Option<WorkItem>, QueuingError> {
        self.states.pop_scheduled_within(queue_id, timeout).await
    }

    /// Blocks until work is available on the queue or `cancel` fires.
    pub async fn pop_scheduled_blocking(
        &self,
        queue_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<WorkItem>, QueuingError> {
        let handle = match self.scheduled.lock().await.get(queue_id) {
            Some(handle) => Arc::clone(handle),
            None => Arc::new(self.new_handle(queue_id)),
        };
        handle.take(cancel).await
    }

    /// Cancels a scheduled work item by id.
    ///
    /// Returns the canceled item, or `None` if the id was not scheduled on
    /// this queue.
    pub async fn remove_scheduled(
        &self,
        queue_id: &str,
        work_id: &str,
    ) -> Result<Option<WorkItem>, QueuingError> {
        let canceled = self
            .states
            .cancel_scheduled(queue_id, work_id, now_millis())
            .await?;
        if canceled.is_some() {
            self.metrics.record_canceled(queue_id);
            debug!(queue_id = %queue_id, work_id = %work_id, "Scheduled work canceled");
        }
        Ok(canceled)
    }

    /// Records that a worker started executing the work.
    pub async fn work_running(
        &self,
        queue_id: &str,
        work: &mut WorkItem,
    ) -> Result<(), QueuingError> {
        work.state = WorkState::Running;
        work.started_at = Some(Utc::now());
        work.attempts += 1;
        self.states.mark_running(queue_id, work).await?;
        self.metrics.record_running(queue_id);
        debug!(queue_id = %queue_id, work_id = %work.id, "Work running");
        Ok(())
    }

    /// Records completion, persisting any result or error set on the work.
    pub async fn work_completed(
        &self,
        queue_id: &str,
        work: &mut WorkItem,
    ) -> Result<(), QueuingError> {
        let at = now_millis();
        work.state = WorkState::Completed;
        work.completion_time = Some(at);
        self.states.mark_completed(queue_id, work, at).await?;
        self.metrics.record_completed(queue_id, work.is_success());
        debug!(
            queue_id = %queue_id,
            work_id = %work.id,
            success = work.is_success(),
            "Work completed"
        );
        Ok(())
    }

    /// Current state of a work id, or `None` if unknown or unreadable.
    pub async fn get_work_state(&self, work_id: &str) -> Result<Option<WorkState>, QueuingError> {
        Ok(self
            .states
            .read_state(work_id)
            .await?
            .map(|record| record.state))
    }

    /// Current state record of a work id, including its timestamp.
    pub async fn get_work_state_record(
        &self,
        work_id: &str,
    ) -> Result<Option<StateRecord>, QueuingError> {
        self.states.read_state(work_id).await
    }

    /// Returns whether the work is in `state`. `None` matches scheduled or running.
    pub async fn is_work_in_state(
        &self,
        work_id: &str,
        state: Option<WorkState>,
    ) -> Result<bool, QueuingError> {
        let current = self.get_work_state(work_id).await?;
        Ok(match (current, state) {
            (Some(current), Some(wanted)) => current == wanted,
            (Some(current), None) => {
                matches!(current, WorkState::Scheduled | WorkState::Running)
            }
            (None, _) => false,
        })
    }

    /// Fetches the work if it is in `state` (`None`: scheduled or running).
    ///
    /// The state check and the fetch are separate reads.
    pub async fn find(
        &self,
        work_id: &str,
        state: Option<WorkState>,
    ) -> Result<Option<WorkItem>, QueuingError> {
        if !self.is_work_in_state(work_id, state).await? {
            return Ok(None);
        }
        self.states.fetch(work_id).await
    }

    /// Work items of a queue in the given state.
    pub async fn list_work(
        &self,
        queue_id: &str,
        state: WorkState,
    ) -> Result<Vec<WorkItem>, QueuingError> {
        self.states.list_items(queue_id, state.into()).await
    }

    /// Work ids of a queue in the given state. `None` lists scheduled then
    /// running ids.
    pub async fn list_work_ids(
        &self,
        queue_id: &str,
        state: Option<WorkState>,
    ) -> Result<Vec<String>, QueuingError> {
        match state {
            Some(state) => self.states.list_ids(queue_id, state.into()).await,
            None => {
                let mut ids = self.states.list_ids(queue_id, Membership::Scheduled).await?;
                ids.extend(self.states.list_ids(queue_id, Membership::Running).await?);
                Ok(ids)
            }
        }
    }

    pub async fn get_queue_size(
        &self,
        queue_id: &str,
        state: WorkState,
    ) -> Result<usize, QueuingError> {
        self.states.size(queue_id, state.into()).await
    }

    pub async fn list_suspended_ids(&self, queue_id: &str) -> Result<Vec<String>, QueuingError> {
        self.states.list_ids(queue_id, Membership::Suspended).await
    }

    pub async fn get_suspended_size(&self, queue_id: &str) -> Result<usize, QueuingError> {
        self.states.size(queue_id, Membership::Suspended).await
    }

    /// Moves every scheduled id of the queue to its suspended list.
    ///
    /// Stop producers first; ids pushed during the drain may be missed.
    /// Returns the number of ids moved.
    pub async fn set_suspending(&self, queue_id: &str) -> Result<usize, QueuingError> {
        let moved = self
            .states
            .drain(queue_id, Membership::Scheduled, Membership::Suspended)
            .await?;
        self.metrics.record_suspended(queue_id, moved);
        info!(queue_id = %queue_id, count = moved, "Queue suspended");
        Ok(moved)
    }

    /// Moves every suspended id of the queue back to its scheduled list.
    ///
    /// Returns the number of ids moved.
    pub async fn schedule_suspended_work(&self, queue_id: &str) -> Result<usize, QueuingError> {
        let moved = self
            .states
            .drain(queue_id, Membership::Suspended, Membership::Scheduled)
            .await?;
        self.metrics.record_resumed(queue_id, moved);
        info!(queue_id = %queue_id, count = moved, "Suspended work rescheduled");
        Ok(moved)
    }

    /// Deletes completed work finished strictly before `threshold_millis`.
    ///
    /// A threshold of zero or less deletes all completed work of the queue.
    pub async fn clear_completed_work(
        &self,
        queue_id: &str,
        threshold_millis: i64,
    ) -> Result<usize, QueuingError> {
        self.clear_terminal(queue_id, WorkState::Completed, threshold_millis)
            .await
    }

    /// Deletes canceled work canceled strictly before `threshold_millis`.
    ///
    /// A threshold of zero or less deletes all canceled work of the queue.
    pub async fn clear_canceled_work(
        &self,
        queue_id: &str,
        threshold_millis: i64,
    ) -> Result<usize, QueuingError> {
        self.clear_terminal(queue_id, WorkState::Canceled, threshold_millis)
            .await
    }

    pub async fn get_scheduled_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        self.states.queue_ids(Membership::Scheduled).await
    }

    pub async fn get_running_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        self.states.queue_ids(Membership::Running).await
    }

    pub async fn get_completed_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        self.states.queue_ids(Membership::Completed).await
    }

    pub async fn get_suspended_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        self.states.queue_ids(Membership::Suspended).await
    }

    pub async fn get_canceled_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        self.states.queue_ids(Membership::Canceled).await
    }

    /// Every queue with at least one id in any membership.
    pub async fn known_queue_ids(&self) -> Result<BTreeSet<String>, QueuingError> {
        let mut ids = BTreeSet::new();
        for membership in Membership::ALL {
            ids.extend(self.states.queue_ids(membership).await?);
        }
        Ok(ids)
    }

    /// Membership sizes of a queue. Also refreshes the depth gauges.
    pub async fn queue_stats(&self, queue_id: &str) -> Result<QueueStats, QueuingError> {
        let mut stats = QueueStats {
            queue_id: queue_id.to_string(),
            ..QueueStats::default()
        };
        for membership in Membership::ALL {
            let size = self.states.size(queue_id, membership).await?;
            self.metrics
                .set_queue_depth(queue_id, &membership.to_string(), size);
            match membership {
                Membership::Scheduled => stats.scheduled = size,
                Membership::Running => stats.running = size,
                Membership::Completed => stats.completed = size,
                Membership::Suspended => stats.suspended = size,
                Membership::Canceled => stats.canceled = size,
            }
        }
        Ok(stats)
    }

    async fn clear_terminal(
        &self,
        queue_id: &str,
        state: WorkState,
        threshold_millis: i64,
    ) -> Result<usize, QueuingError> {
        let removed = self.states.purge(queue_id, state, threshold_millis).await?;
        self.metrics
            .record_purged(queue_id, &state.to_string(), removed);
        info!(
            queue_id = %queue_id,
            state = %state,
            threshold_millis,
            count = removed,
            "Terminal work purged"
        );
        Ok(removed)
    }

    fn new_handle(&self, queue_id: &str) -> ScheduledQueue {
        ScheduledQueue::new(
            queue_id,
            Arc::clone(&self.states),
            Arc::clone(&self.metrics),
            self.config.poll_interval,
        )
    }
}

impl std::fmt::Debug for WorkQueuing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueuing")
            .field("prefix", &self.config.prefix)
            .field("poll_interval", &self.config.poll_interval)
            .finish()
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn coordinator() -> WorkQueuing {
        let config = QueuingConfig::new()
            .with_prefix("test:")
            .with_poll_interval(Duration::from_millis(20));
        WorkQueuing::new(Arc::new(MemoryStore::new()), config).unwrap()
    }

    #[tokio::test]
    async fn test_init_schedule_queue_twice_fails() {
        let queuing = coordinator();
        queuing.init_schedule_queue("q").await.unwrap();

        let err = queuing.init_schedule_queue("q").await.unwrap_err();
        assert!(matches!(err, QueuingError::AlreadyConfigured(ref q) if q == "q"));
    }

    #[tokio::test]
    async fn test_get_scheduled_queue_before_init_fails() {
        let queuing = coordinator();
        let err = queuing.get_scheduled_queue("q").await.unwrap_err();
        assert!(err.is_illegal_usage());

        let handle = queuing.init_schedule_queue("q").await.unwrap();
        let fetched = queuing.get_scheduled_queue("q").await.unwrap();
        assert!(Arc::ptr_eq(&handle, &fetched));

        assert!(queuing.shutdown_schedule_queue("q").await);
        assert!(queuing.get_scheduled_queue("q").await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let config = QueuingConfig::new().with_poll_interval(Duration::ZERO);
        let err = WorkQueuing::new(Arc::new(MemoryStore::new()), config).unwrap_err();
        assert!(matches!(err, QueuingError::Config(_)));
    }

    #[tokio::test]
    async fn test_work_running_updates_item() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "convert");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();
        let mut work = queuing.pop_scheduled("q").await.unwrap().unwrap();

        queuing.work_running("q", &mut work).await.unwrap();
        assert_eq!(work.state, WorkState::Running);
        assert_eq!(work.attempts, 1);
        assert!(work.started_at.is_some());
        assert_eq!(
            queuing.get_work_state(&work.id).await.unwrap(),
            Some(WorkState::Running)
        );
    }

    #[tokio::test]
    async fn test_work_completed_persists_result() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "convert").with_id("w1");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();
        let mut work = queuing.pop_scheduled("q").await.unwrap().unwrap();
        queuing.work_running("q", &mut work).await.unwrap();

        work.set_result(serde_json::json!({"pages": 3}));
        queuing.work_completed("q", &mut work).await.unwrap();

        let stored = queuing
            .find("w1", Some(WorkState::Completed))
            .await
            .unwrap()
            .expect("completed work should be found");
        assert_eq!(stored.result, Some(serde_json::json!({"pages": 3})));
        assert_eq!(stored.completion_time, work.completion_time);
        let record = queuing.get_work_state_record("w1").await.unwrap().unwrap();
        assert_eq!(record.timestamp, work.completion_time);
    }

    #[tokio::test]
    async fn test_find_without_state_matches_pending_only() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "c").with_id("w1");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();

        assert!(queuing.find("w1", None).await.unwrap().is_some());
        assert!(queuing
            .find("w1", Some(WorkState::Running))
            .await
            .unwrap()
            .is_none());
        assert!(queuing.find("missing", None).await.unwrap().is_none());

        queuing.remove_scheduled("q", "w1").await.unwrap();
        assert!(queuing.find("w1", None).await.unwrap().is_none());
        assert!(queuing
            .find("w1", Some(WorkState::Canceled))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_remove_scheduled_records_cancellation() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "c").with_id("w1");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();

        let canceled = queuing.remove_scheduled("q", "w1").await.unwrap().unwrap();
        assert_eq!(canceled.state, WorkState::Canceled);
        assert_eq!(
            queuing.list_work_ids("q", Some(WorkState::Canceled)).await.unwrap(),
            vec!["w1"]
        );
        let record = queuing.get_work_state_record("w1").await.unwrap().unwrap();
        assert_eq!(record.state, WorkState::Canceled);
        assert!(record.timestamp.is_some());

        assert!(queuing.remove_scheduled("q", "w1").await.unwrap().is_none());
        assert_eq!(
            queuing.get_canceled_queue_ids().await.unwrap(),
            BTreeSet::from(["q".to_string()])
        );
    }

    #[tokio::test]
    async fn test_list_work_ids_without_state_is_scheduled_then_running() {
        let queuing = coordinator();
        for id in ["a", "b"] {
            let mut work = WorkItem::new("q", "c").with_id(id);
            queuing.add_scheduled_work("q", &mut work).await.unwrap();
        }
        let mut running = queuing.pop_scheduled("q").await.unwrap().unwrap();
        queuing.work_running("q", &mut running).await.unwrap();

        assert_eq!(queuing.list_work_ids("q", None).await.unwrap(), vec!["b", "a"]);
        let scheduled = queuing.list_work("q", WorkState::Scheduled).await.unwrap();
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].id, "b");
    }

    #[tokio::test]
    async fn test_init_resumes_every_suspended_queue() {
        let queuing = coordinator();
        for (queue, id) in [("alpha", "a1"), ("alpha", "a2"), ("beta", "b1")] {
            let mut work = WorkItem::new(queue, "c").with_id(id);
            queuing.add_scheduled_work(queue, &mut work).await.unwrap();
        }
        assert_eq!(queuing.set_suspending("alpha").await.unwrap(), 2);
        assert_eq!(queuing.set_suspending("beta").await.unwrap(), 1);
        assert_eq!(
            queuing.get_suspended_queue_ids().await.unwrap().len(),
            2
        );
        assert!(queuing.get_scheduled_queue_ids().await.unwrap().is_empty());

        assert_eq!(queuing.init().await.unwrap(), 3);
        assert!(queuing.get_suspended_queue_ids().await.unwrap().is_empty());
        assert_eq!(
            queuing.get_queue_size("alpha", WorkState::Scheduled).await.unwrap(),
            2
        );
        assert_eq!(queuing.get_suspended_size("beta").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_suspend_preserves_dequeue_order() {
        let queuing = coordinator();
        for id in ["a", "b", "c"] {
            let mut work = WorkItem::new("q", "c").with_id(id);
            queuing.add_scheduled_work("q", &mut work).await.unwrap();
        }
        queuing.set_suspending("q").await.unwrap();
        assert_eq!(
            queuing.list_suspended_ids("q").await.unwrap(),
            vec!["c", "b", "a"]
        );
        queuing.schedule_suspended_work("q").await.unwrap();

        let mut order = Vec::new();
        while let Some(work) = queuing.pop_scheduled("q").await.unwrap() {
            order.push(work.id);
        }
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_pop_scheduled_blocking_uses_unregistered_queue() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "c").with_id("w1");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();

        let cancel = CancellationToken::new();
        let popped = queuing.pop_scheduled_blocking("q", &cancel).await.unwrap();
        assert_eq!(popped.map(|w| w.id).as_deref(), Some("w1"));

        cancel.cancel();
        assert!(queuing
            .pop_scheduled_blocking("q", &cancel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_queue_stats_and_known_queues() {
        let queuing = coordinator();
        for (queue, id) in [("alpha", "a1"), ("alpha", "a2"), ("beta", "b1")] {
            let mut work = WorkItem::new(queue, "c").with_id(id);
            queuing.add_scheduled_work(queue, &mut work).await.unwrap();
        }
        let mut work = queuing.pop_scheduled("alpha").await.unwrap().unwrap();
        queuing.work_running("alpha", &mut work).await.unwrap();
        queuing.work_completed("alpha", &mut work).await.unwrap();
        queuing.remove_scheduled("beta", "b1").await.unwrap();

        let stats = queuing.queue_stats("alpha").await.unwrap();
        assert_eq!(stats.scheduled, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending(), 1);
        assert_eq!(stats.total(), 2);

        let known: Vec<String> = queuing.known_queue_ids().await.unwrap().into_iter().collect();
        assert_eq!(known, vec!["alpha", "beta"]);
        assert!(queuing
            .metrics()
            .export()
            .contains("workq_queue_depth{queue=\"alpha\",state=\"completed\"} 1"));
    }

    #[tokio::test]
    async fn test_clear_canceled_work() {
        let queuing = coordinator();
        let mut work = WorkItem::new("q", "c").with_id("w1");
        queuing.add_scheduled_work("q", &mut work).await.unwrap();
        queuing.remove_scheduled("q", "w1").await.unwrap();

        assert_eq!(queuing.clear_canceled_work("q", 1).await.unwrap(), 0);
        assert_eq!(queuing.clear_canceled_work("q", 0).await.unwrap(), 1);
        assert!(queuing.get_work_state("w1").await.unwrap().is_none());
        assert!(queuing.state_store().fetch("w1").await.unwrap().is_none());
    }
}
