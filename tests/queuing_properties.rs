//! Lifecycle properties of the work queuing coordinator.
//!
//! Runs against the in-process `MemoryStore`, which follows Redis semantics
//! for every primitive the coordinator uses.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use workq::queuing::Membership;
use workq::store::{MemoryStore, Store};
use workq::work::WorkCodec;
use workq::{QueuingConfig, StateRecord, WorkItem, WorkQueuing, WorkState};

const QUEUE: &str = "default";

fn config() -> QueuingConfig {
    QueuingConfig::new()
        .with_prefix("props:")
        .with_poll_interval(Duration::from_millis(20))
}

fn coordinator_on(store: Arc<MemoryStore>) -> WorkQueuing {
    WorkQueuing::new(store, config()).expect("coordinator should build")
}

fn coordinator() -> WorkQueuing {
    coordinator_on(Arc::new(MemoryStore::new()))
}

async fn schedule(queuing: &WorkQueuing, id: &str) -> WorkItem {
    let mut work = WorkItem::new(QUEUE, "test")
        .with_id(id)
        .with_payload(serde_json::json!({ "id": id }));
    queuing
        .add_scheduled_work(QUEUE, &mut work)
        .await
        .expect("schedule should work");
    work
}

/// Asserts each id appears in at most one membership collection.
async fn assert_exclusive(queuing: &WorkQueuing, ids: &[&str]) {
    for id in ids {
        let mut found_in = Vec::new();
        for membership in Membership::ALL {
            let members = queuing
                .state_store()
                .list_ids(QUEUE, membership)
                .await
                .unwrap();
            let count = members.iter().filter(|m| m == id).count();
            if count > 0 {
                found_in.push((membership, count));
            }
        }
        assert!(
            found_in.len() <= 1 && found_in.iter().all(|(_, c)| *c == 1),
            "{} found in {:?}",
            id,
            found_in
        );
    }
}

#[tokio::test]
async fn test_ids_belong_to_one_collection_through_lifecycle() {
    let queuing = coordinator();
    let ids = ["a", "b", "c", "d"];
    for id in ids {
        schedule(&queuing, id).await;
    }
    assert_exclusive(&queuing, &ids).await;

    let mut a = queuing.pop_scheduled(QUEUE).await.unwrap().unwrap();
    assert_exclusive(&queuing, &ids).await;
    queuing.work_running(QUEUE, &mut a).await.unwrap();
    assert_exclusive(&queuing, &ids).await;
    queuing.work_completed(QUEUE, &mut a).await.unwrap();
    assert_exclusive(&queuing, &ids).await;

    queuing.remove_scheduled(QUEUE, "c").await.unwrap();
    assert_exclusive(&queuing, &ids).await;

    queuing.set_suspending(QUEUE).await.unwrap();
    assert_exclusive(&queuing, &ids).await;
    queuing.schedule_suspended_work(QUEUE).await.unwrap();
    assert_exclusive(&queuing, &ids).await;

    assert_eq!(
        queuing.list_work_ids(QUEUE, Some(WorkState::Scheduled)).await.unwrap(),
        vec!["d", "b"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dequeue_delivers_each_id_once() {
    let queuing = Arc::new(coordinator());
    let total = 200;
    for i in 0..total {
        schedule(&queuing, &format!("w{}", i)).await;
    }

    let workers = (0..8).map(|_| {
        let queuing = Arc::clone(&queuing);
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(work) = queuing
                .pop_scheduled_within(QUEUE, Duration::from_millis(50))
                .await
                .unwrap()
            {
                seen.push(work.id);
            }
            seen
        })
    });

    let mut delivered = Vec::new();
    for seen in futures::future::join_all(workers).await {
        delivered.extend(seen.expect("worker should not panic"));
    }

    let unique: HashSet<&String> = delivered.iter().collect();
    assert_eq!(delivered.len(), total);
    assert_eq!(unique.len(), total);
    assert_eq!(
        queuing.get_queue_size(QUEUE, WorkState::Scheduled).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_suspend_then_resume_restores_scheduled_ids() {
    let queuing = coordinator();
    for id in ["a", "b", "c"] {
        schedule(&queuing, id).await;
    }

    assert_eq!(queuing.set_suspending(QUEUE).await.unwrap(), 3);
    assert_eq!(
        queuing.get_queue_size(QUEUE, WorkState::Scheduled).await.unwrap(),
        0
    );
    assert_eq!(queuing.get_suspended_size(QUEUE).await.unwrap(), 3);

    assert_eq!(queuing.schedule_suspended_work(QUEUE).await.unwrap(), 3);
    let ids: HashSet<String> = queuing
        .list_work_ids(QUEUE, Some(WorkState::Scheduled))
        .await
        .unwrap()
        .into_iter()
        .collect();
    let expected: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    assert_eq!(ids, expected);
    assert_eq!(queuing.get_suspended_size(QUEUE).await.unwrap(), 0);
}

#[tokio::test]
async fn test_suspended_work_survives_restart() {
    let store = Arc::new(MemoryStore::new());

    {
        let before_restart = coordinator_on(Arc::clone(&store));
        for id in ["a", "b"] {
            schedule(&before_restart, id).await;
        }
        before_restart.set_suspending(QUEUE).await.unwrap();
    }

    let after_restart = coordinator_on(store);
    assert_eq!(after_restart.init().await.unwrap(), 2);

    let first = after_restart.pop_scheduled(QUEUE).await.unwrap().unwrap();
    assert_eq!(first.id, "a");
    assert_eq!(first.payload, serde_json::json!({ "id": "a" }));
}

#[tokio::test]
async fn test_state_transitions_scheduled_running_completed() {
    let queuing = coordinator();
    schedule(&queuing, "w").await;
    assert_eq!(
        queuing.get_work_state("w").await.unwrap(),
        Some(WorkState::Scheduled)
    );

    let mut work = queuing.pop_scheduled(QUEUE).await.unwrap().unwrap();
    queuing.work_running(QUEUE, &mut work).await.unwrap();
    assert_eq!(
        queuing.get_work_state("w").await.unwrap(),
        Some(WorkState::Running)
    );
    assert!(queuing
        .list_work_ids(QUEUE, Some(WorkState::Running))
        .await
        .unwrap()
        .contains(&"w".to_string()));

    let invoked_at = Utc::now().timestamp_millis();
    queuing.work_completed(QUEUE, &mut work).await.unwrap();

    let record = queuing.get_work_state_record("w").await.unwrap().unwrap();
    assert_eq!(record.state, WorkState::Completed);
    assert!(record.timestamp.unwrap() >= invoked_at);
    assert!(queuing
        .list_work_ids(QUEUE, Some(WorkState::Completed))
        .await
        .unwrap()
        .contains(&"w".to_string()));
    assert!(queuing
        .list_work_ids(QUEUE, Some(WorkState::Running))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_targeted_removal_leaves_other_work() {
    let queuing = coordinator();
    let a = schedule(&queuing, "a").await;
    schedule(&queuing, "b").await;

    let removed = queuing.remove_scheduled(QUEUE, "a").await.unwrap().unwrap();
    assert_eq!(removed.id, "a");
    assert_eq!(removed.payload, a.payload);
    assert_eq!(
        queuing.list_work_ids(QUEUE, Some(WorkState::Scheduled)).await.unwrap(),
        vec!["b"]
    );
    assert_eq!(
        queuing.get_work_state("a").await.unwrap(),
        Some(WorkState::Canceled)
    );
}

async fn complete(queuing: &WorkQueuing, id: &str) -> i64 {
    schedule(queuing, id).await;
    let mut work = queuing.pop_scheduled(QUEUE).await.unwrap().unwrap();
    queuing.work_running(QUEUE, &mut work).await.unwrap();
    queuing.work_completed(QUEUE, &mut work).await.unwrap();
    work.completion_time.expect("completion time should be set")
}

#[tokio::test]
async fn test_purge_threshold_is_strict() {
    let queuing = coordinator();
    let t1 = complete(&queuing, "early").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let t2 = complete(&queuing, "late").await;
    assert!(t1 < t2);

    assert_eq!(queuing.clear_completed_work(QUEUE, t2).await.unwrap(), 1);
    assert!(queuing.get_work_state("early").await.unwrap().is_none());
    assert!(queuing.find("early", Some(WorkState::Completed)).await.unwrap().is_none());
    assert_eq!(
        queuing.list_work_ids(QUEUE, Some(WorkState::Completed)).await.unwrap(),
        vec!["late"]
    );
}

#[tokio::test]
async fn test_purge_without_threshold_removes_everything() {
    let queuing = coordinator();
    complete(&queuing, "one").await;
    complete(&queuing, "two").await;

    assert_eq!(queuing.clear_completed_work(QUEUE, 0).await.unwrap(), 2);
    assert_eq!(
        queuing.get_queue_size(QUEUE, WorkState::Completed).await.unwrap(),
        0
    );
    assert!(queuing.get_completed_queue_ids().await.unwrap().is_empty());
}

#[test]
fn test_codec_preserves_observable_fields() {
    let codec = WorkCodec::new();

    let fresh = WorkItem::new(QUEUE, "thumbnail");

    let mut finished = WorkItem::new("images", "thumbnail")
        .with_title("Resize upload")
        .with_payload(serde_json::json!({ "blob": "b1", "sizes": [64, 256] }));
    finished.state = WorkState::Completed;
    finished.started_at = Some(Utc::now());
    finished.completion_time = Some(1_700_000_000_000);
    finished.attempts = 3;
    finished.set_error("decoder crashed");

    for item in [fresh, finished] {
        let bytes = codec.encode(&item).unwrap();
        let decoded = codec.decode(Some(&bytes)).unwrap().unwrap();
        assert_eq!(decoded, item);
    }
}

#[tokio::test]
async fn test_legacy_and_unknown_state_values() {
    let store = Arc::new(MemoryStore::new());
    let queuing = coordinator_on(Arc::clone(&store));

    store
        .hash_set("props:state", "legacy", b"1600000000000")
        .await
        .unwrap();
    store
        .hash_set("props:state", "odd", b"?bad")
        .await
        .unwrap();

    assert_eq!(
        queuing.get_work_state_record("legacy").await.unwrap(),
        Some(StateRecord::canceled(1_600_000_000_000))
    );
    assert!(queuing.get_work_state("odd").await.unwrap().is_none());
    assert!(!queuing.is_work_in_state("odd", None).await.unwrap());
    assert_eq!(
        store.hash_get("props:state", "odd").await.unwrap(),
        Some(b"?bad".to_vec())
    );
}

#[tokio::test]
async fn test_corrupt_payload_surfaces_as_error() {
    let store = Arc::new(MemoryStore::new());
    let queuing = coordinator_on(Arc::clone(&store));
    schedule(&queuing, "w").await;
    store
        .hash_set("props:data", "w", b"{\"v\":1,\"work\":42}")
        .await
        .unwrap();

    let err = queuing.pop_scheduled(QUEUE).await.unwrap_err();
    assert!(!err.is_illegal_usage());
    assert!(err.to_string().contains("Payload"));
}
