use std::sync::Arc;

use super::*;
use crate::domain::NewTrackedItem;
use crate::notify::mock::RecordingNotifier;
use crate::qbit::mock::{ClientCall, MockDownloadClient};
use crate::store::MemoryStore;
use crate::tracker::mock::MockTracker;

const URL: &str = "https://kinozal.tv/details.php?id=1";

fn identity(c: char) -> RemoteIdentity {
    RemoteIdentity::parse(&c.to_string().repeat(40)).unwrap()
}

struct Harness {
    tracker: Arc<MockTracker>,
    client: Arc<MockDownloadClient>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    reconciler: Reconciler,
}

impl Harness {
    fn new() -> Self {
        Self::with_notifier(RecordingNotifier::new())
    }

    fn with_notifier(notifier: RecordingNotifier) -> Self {
        let tracker = Arc::new(MockTracker::new(&["kinozal.tv"]));
        let client = Arc::new(MockDownloadClient::new());
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(notifier);
        let trackers = TrackerRegistry::new().with(tracker.clone());
        let reconciler = Reconciler::new(
            Arc::new(trackers),
            client.clone(),
            store.clone(),
            notifier.clone(),
            Arc::new(StatusFeed::default()),
            "/downloads",
        );
        Self {
            tracker,
            client,
            store,
            notifier,
            reconciler,
        }
    }

    async fn track(&self, identity: &RemoteIdentity, save_path: &str) -> TrackedItem {
        self.store
            .upsert_item(NewTrackedItem {
                source_url: URL.to_string(),
                display_title: "Some show".to_string(),
                display_name: "old name".to_string(),
                remote_identity: identity.clone(),
                save_path: save_path.to_string(),
                watch_interval_minutes: 5,
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_missing_torrent_is_added() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "").await;
    h.tracker.set_identity(URL, &identity('a'));

    let outcome = h.reconciler.reconcile(item.id).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Added { .. }));
    assert_eq!(
        h.client.calls(),
        vec![ClientCall::AddPayload {
            identity: "a".repeat(40),
            save_path: "/downloads".to_string(),
        }]
    );
    assert_eq!(h.notifier.sent(), vec![(NotifyKind::Added, "a".repeat(40))]);
    let stored = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.display_title, format!("Title of {URL}"));
    assert_eq!(stored.save_path, "/downloads");
    assert_eq!(stored.watch_interval_minutes, 5);
}

#[tokio::test]
async fn test_drift_replaces_torrent_and_keeps_files() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "/data/x").await;
    h.client.insert(&identity('a'), "/data/x");
    h.tracker.set_identity(URL, &identity('b'));

    let outcome = h.reconciler.reconcile(item.id).await.unwrap();

    match outcome {
        ReconcileOutcome::Replaced { item, previous } => {
            assert_eq!(previous, identity('a'));
            assert_eq!(item.remote_identity, identity('b'));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(
        h.client.calls(),
        vec![
            ClientCall::Remove {
                identity: "a".repeat(40),
                delete_files: false,
            },
            ClientCall::AddPayload {
                identity: "b".repeat(40),
                save_path: "/data/x".to_string(),
            },
        ]
    );
    assert_eq!(h.notifier.sent(), vec![(NotifyKind::Updated, "b".repeat(40))]);
    let stored = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.remote_identity, identity('b'));
    assert_eq!(stored.save_path, "/data/x");
}

#[tokio::test]
async fn test_replace_uses_client_save_path_over_stored_one() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "/old").await;
    h.client.insert(&identity('a'), "/data/x");
    h.tracker.set_identity(URL, &identity('b'));

    h.reconciler.reconcile(item.id).await.unwrap();

    assert!(h.client.calls().contains(&ClientCall::AddPayload {
        identity: "b".repeat(40),
        save_path: "/data/x".to_string(),
    }));
    assert_eq!(h.store.get_item(item.id).await.unwrap().unwrap().save_path, "/data/x");
}

#[tokio::test]
async fn test_replace_falls_back_to_stored_save_path() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "/data/y").await;
    h.client.insert(&identity('a'), "/elsewhere");
    h.client.fail_save_path_lookup(true);
    h.tracker.set_identity(URL, &identity('b'));

    h.reconciler.reconcile(item.id).await.unwrap();

    assert!(h.client.calls().contains(&ClientCall::AddPayload {
        identity: "b".repeat(40),
        save_path: "/data/y".to_string(),
    }));
}

#[tokio::test]
async fn test_second_tick_is_a_no_op() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "").await;
    h.tracker.set_identity(URL, &identity('a'));

    h.reconciler.reconcile(item.id).await.unwrap();
    let second = h.reconciler.reconcile(item.id).await.unwrap();

    assert_eq!(second, ReconcileOutcome::Unchanged);
    assert_eq!(h.client.calls().len(), 1);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_auth_failure_recovers_and_skips() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "").await;
    h.tracker.set_identity(URL, &identity('a'));
    h.client.refuse_lists(1);

    let outcome = h.reconciler.reconcile(item.id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Skipped);
    assert_eq!(h.client.recoveries(), 1);
    assert!(h.client.calls().is_empty());
    assert_eq!(h.tracker.identity_calls(), 0);
    let status = h.reconciler.feed().snapshot(&[item]);
    assert!(!status[0].last_check_success);
}

#[tokio::test]
async fn test_notification_failure_keeps_store_write() {
    let h = Harness::with_notifier(RecordingNotifier::failing());
    let item = h.track(&identity('a'), "").await;
    h.tracker.set_identity(URL, &identity('b'));

    let outcome = h.reconciler.reconcile(item.id).await.unwrap();

    assert!(matches!(outcome, ReconcileOutcome::Added { .. }));
    assert_eq!(h.notifier.sent().len(), 1);
    let stored = h.store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.remote_identity, identity('b'));
}

#[tokio::test]
async fn test_magnet_fallback_when_payload_unavailable() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "").await;
    h.tracker.set_identity(URL, &identity('a'));
    h.tracker.fail_payloads(true);

    h.reconciler.reconcile(item.id).await.unwrap();

    assert_eq!(
        h.client.calls(),
        vec![ClientCall::AddMagnet {
            identity: "a".repeat(40),
            save_path: "/downloads".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_identity_failure_leaves_store_untouched() {
    let h = Harness::new();
    let item = h.track(&identity('a'), "").await;
    h.client.insert(&identity('a'), "/data/x");

    let err = h.reconciler.reconcile(item.id).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Tick);
    assert_eq!(h.store.get_item(item.id).await.unwrap().unwrap(), item);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_missing_item_is_gone() {
    let h = Harness::new();
    assert_eq!(h.reconciler.reconcile(42).await.unwrap(), ReconcileOutcome::Gone);
}

#[tokio::test]
async fn test_ingest_unknown_host_changes_nothing() {
    let h = Harness::new();

    let err = h.reconciler.ingest("https://example.com/t/1", None).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Tracker(TrackerError::UnknownTracker(_))));
    assert!(h.store.list_items().await.unwrap().is_empty());
    assert!(h.client.calls().is_empty());
    assert_eq!(h.tracker.identity_calls(), 0);
}

#[tokio::test]
async fn test_ingest_adds_and_publishes() {
    let h = Harness::new();
    h.tracker.set_identity(URL, &identity('a'));
    let mut events = h.reconciler.feed().subscribe();

    let report = h.reconciler.ingest(URL, Some("/data/x")).await.unwrap();

    assert_eq!(report.status, IngestStatus::Added);
    assert_eq!(report.item.save_path, "/data/x");
    assert_eq!(report.item.watch_interval_minutes, 0);
    assert_eq!(h.store.list_items().await.unwrap(), vec![report.item.clone()]);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(events.recv().await.unwrap(), WatchEvent::ItemAdded { item: report.item });
}

#[tokio::test]
async fn test_ingest_duplicate_adopts_once() {
    let h = Harness::new();
    h.tracker.set_identity(URL, &identity('a'));
    h.client.insert(&identity('a'), "/data/x");

    let first = h.reconciler.ingest(URL, None).await.unwrap();
    let second = h.reconciler.ingest(URL, None).await.unwrap();

    assert_eq!(first.status, IngestStatus::Duplicate);
    assert_eq!(second.status, IngestStatus::Duplicate);
    assert_eq!(first.item.id, second.item.id);
    assert_eq!(h.store.list_items().await.unwrap().len(), 1);
    assert!(h.client.calls().is_empty());
}

#[tokio::test]
async fn test_spawn_ingest_answers_over_channel() {
    let h = Harness::new();
    h.tracker.set_identity(URL, &identity('c'));
    let reconciler = Arc::new(h.reconciler);

    let report = spawn_ingest(reconciler, URL.to_string(), None).await.unwrap().unwrap();

    assert_eq!(report.item.remote_identity, identity('c'));
    assert_eq!(report.item.save_path, "/downloads");
}
