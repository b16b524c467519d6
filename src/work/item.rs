//! Work item definition.
//!
//! A `WorkItem` is the unit of deferred execution tracked by the queuing
//! core. It is encoded into the shared `data` hash when scheduled, decoded on
//! every read, and re-encoded on completion so results set by the worker are
//! persisted alongside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::WorkState;

/// A unit of work routed through a named queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Unique identifier, global across all queues.
    pub id: String,
    /// Queue this work is scheduled on.
    pub queue_id: String,
    /// Kind of work, used by handlers to dispatch.
    pub category: String,
    /// Optional human readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// Work arguments.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Last lifecycle state applied by the coordinator.
    pub state: WorkState,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// When a worker picked the item up.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time in epoch millis.
    #[serde(default)]
    pub completion_time: Option<i64>,
    /// Number of times a worker started this item.
    #[serde(default)]
    pub attempts: u32,
    /// Result recorded by the worker.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error recorded by the worker.
    #[serde(default)]
    pub error: Option<String>,
}

impl WorkItem {
    /// Creates a new scheduled work item with a fresh UUID.
    pub fn new(queue_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            queue_id: queue_id.into(),
            category: category.into(),
            title: None,
            payload: serde_json::Value::Null,
            state: WorkState::Scheduled,
            created_at: Utc::now(),
            started_at: None,
            completion_time: None,
            attempts: 0,
            result: None,
            error: None,
        }
    }

    /// Sets an explicit id. Callers are responsible for keeping it unique.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Records a successful result.
    pub fn set_result(&mut self, result: serde_json::Value) {
        self.result = Some(result);
        self.error = None;
    }

    /// Records a failure.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// Returns whether the item finished without a recorded error.
    pub fn is_success(&self) -> bool {
        self.state == WorkState::Completed && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_new() {
        let item = WorkItem::new("default", "fulltext");

        assert!(Uuid::parse_str(&item.id).is_ok());
        assert_eq!(item.queue_id, "default");
        assert_eq!(item.category, "fulltext");
        assert_eq!(item.state, WorkState::Scheduled);
        assert_eq!(item.attempts, 0);
        assert!(item.title.is_none());
        assert!(item.started_at.is_none());
        assert!(item.completion_time.is_none());
        assert!(item.result.is_none());
    }

    #[test]
    fn test_work_item_builder() {
        let item = WorkItem::new("images", "thumbnail")
            .with_id("w-1")
            .with_title("Render thumbnails")
            .with_payload(serde_json::json!({"doc": "abc"}));

        assert_eq!(item.id, "w-1");
        assert_eq!(item.title.as_deref(), Some("Render thumbnails"));
        assert_eq!(item.payload["doc"], "abc");
    }

    #[test]
    fn test_result_and_error() {
        let mut item = WorkItem::new("q", "c");
        item.set_error("boom");
        assert_eq!(item.error.as_deref(), Some("boom"));

        item.set_result(serde_json::json!(3));
        assert!(item.error.is_none());
        assert!(!item.is_success());

        item.state = WorkState::Completed;
        assert!(item.is_success());
    }

    #[test]
    fn test_unique_ids() {
        let a = WorkItem::new("q", "c");
        let b = WorkItem::new("q", "c");
        assert_ne!(a.id, b.id);
    }
}
