//! In-process handle on a queue's scheduled list.
//!
//! A `ScheduledQueue` is registered once per queue id on a
//! [`WorkQueuing`](super::WorkQueuing) coordinator. Producers `offer` work
//! onto it, workers `take` from it. The handle holds no items itself; every
//! call goes to the shared store, so handles in different processes feed
//! from the same list and each id is delivered to exactly one caller.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::QueuingError;
use crate::metrics::QueuingMetrics;
use crate::work::{WorkItem, WorkState};

use super::keys::Membership;
use super::state_store::QueueStateStore;

/// Handle bound to one queue's scheduled list.
pub struct ScheduledQueue {
    queue_id: String,
    states: Arc<QueueStateStore>,
    metrics: Arc<QueuingMetrics>,
    poll_interval: Duration,
}

impl ScheduledQueue {
    pub(crate) fn new(
        queue_id: impl Into<String>,
        states: Arc<QueueStateStore>,
        metrics: Arc<QueuingMetrics>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue_id: queue_id.into(),
            states,
            metrics,
            poll_interval,
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Schedules work on this queue.
    pub async fn offer(&self, work: &mut WorkItem) -> Result<(), QueuingError> {
        schedule_work(&self.states, &self.metrics, &self.queue_id, work).await
    }

    /// Pops the oldest scheduled work, or `None` if the queue is empty.
    pub async fn poll(&self) -> Result<Option<WorkItem>, QueuingError> {
        self.states.pop_scheduled(&self.queue_id).await
    }

    /// Pops the oldest scheduled work, waiting up to `timeout` for one.
    pub async fn poll_timeout(&self, timeout: Duration) -> Result<Option<WorkItem>, QueuingError> {
        self.states
            .pop_scheduled_within(&self.queue_id, timeout)
            .await
    }

    /// Blocks until work is available or `cancel` fires.
    ///
    /// Waits in slices of the configured poll interval and checks the token
    /// between them. A pop is never abandoned mid-flight, so cancellation
    /// cannot lose an item. Returns `None` once cancelled.
    pub async fn take(&self, cancel: &CancellationToken) -> Result<Option<WorkItem>, QueuingError> {
        while !cancel.is_cancelled() {
            if let Some(work) = self.poll_timeout(self.poll_interval).await? {
                return Ok(Some(work));
            }
        }
        debug!(queue_id = %self.queue_id, "Blocking dequeue cancelled");
        Ok(None)
    }

    /// Number of ids waiting in the scheduled list.
    pub async fn len(&self) -> Result<usize, QueuingError> {
        self.states.size(&self.queue_id, Membership::Scheduled).await
    }

    pub async fn is_empty(&self) -> Result<bool, QueuingError> {
        Ok(self.len().await? == 0)
    }
}

impl std::fmt::Debug for ScheduledQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledQueue")
            .field("queue_id", &self.queue_id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Binds the work to the queue, marks it scheduled and persists it.
pub(crate) async fn schedule_work(
    states: &QueueStateStore,
    metrics: &QueuingMetrics,
    queue_id: &str,
    work: &mut WorkItem,
) -> Result<(), QueuingError> {
    work.queue_id = queue_id.to_string();
    work.state = WorkState::Scheduled;
    states.schedule(queue_id, work).await?;
    metrics.record_scheduled(queue_id);
    debug!(queue_id = %queue_id, work_id = %work.id, category = %work.category, "Work scheduled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queuing::keys::KeyLayout;
    use crate::store::{MemoryStore, Store};

    fn handle(queue_id: &str) -> ScheduledQueue {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let states = Arc::new(QueueStateStore::new(store, KeyLayout::new("t:")));
        let metrics = Arc::new(QueuingMetrics::new().unwrap());
        ScheduledQueue::new(queue_id, states, metrics, Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_offer_then_poll_is_fifo() {
        let queue = handle("q");
        let mut first = WorkItem::new("other", "c").with_id("first");
        let mut second = WorkItem::new("q", "c").with_id("second");
        queue.offer(&mut first).await.unwrap();
        queue.offer(&mut second).await.unwrap();

        assert_eq!(first.queue_id, "q");
        assert_eq!(queue.len().await.unwrap(), 2);
        assert_eq!(queue.poll().await.unwrap().unwrap().id, "first");
        assert_eq!(queue.poll().await.unwrap().unwrap().id, "second");
        assert!(queue.poll().await.unwrap().is_none());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_take_returns_none_when_cancelled() {
        let queue = handle("q");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let taken = tokio::time::timeout(Duration::from_secs(2), queue.take(&cancel))
            .await
            .expect("take should return after cancellation")
            .unwrap();
        assert!(taken.is_none());
    }

    #[tokio::test]
    async fn test_take_waits_for_offer() {
        let queue = Arc::new(handle("q"));
        let cancel = CancellationToken::new();
        let consumer = {
            let queue = Arc::clone(&queue);
            let cancel = cancel.clone();
            tokio::spawn(async move { queue.take(&cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(30)).await;
        let mut work = WorkItem::new("q", "c").with_id("late");
        queue.offer(&mut work).await.unwrap();

        let taken = consumer.await.unwrap().unwrap();
        assert_eq!(taken.map(|w| w.id).as_deref(), Some("late"));
    }
}
