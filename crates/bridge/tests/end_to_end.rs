//! Two bridges against a real server instance on a loopback port.

use std::sync::Arc;
use std::time::Duration;

use porchlight_bridge::{
    ClientError, ClientIdentity, EventBridge, PendingEntry, PendingQueue, RecordingSleeper,
    Reconcile, RetryPolicy, SessionManager, SyncClient,
};
use porchlight_server::{create_app, AppState};

const KEY: &str = "e2e-key";

async fn start_server(data_dir: &std::path::Path) -> String {
    let app = create_app(AppState::new(data_dir, KEY));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(url: &str, id: &str) -> Arc<SyncClient> {
    Arc::new(
        SyncClient::new(
            url,
            KEY,
            ClientIdentity::new(id),
            RetryPolicy::default(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_sleeper(Arc::new(RecordingSleeper::new())),
    )
}

#[tokio::test]
async fn second_bridge_cannot_release_first_bridges_session() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(dir.path()).await;

    let bridge1 = SessionManager::new(client(&url, "bridge-1"));
    let client2 = client(&url, "bridge-2");
    let bridge2 = SessionManager::new(client2.clone());

    assert!(bridge1.acquire(1).await);
    assert!(!bridge2.acquire(1).await);

    let err = client2.set_live(false).await.unwrap_err();
    assert!(matches!(err, ClientError::OwnershipConflict { .. }));
    assert!(client2.live_status().await.unwrap().live);

    // bridge-2 never owned it, so its shutdown leaves the session alone.
    bridge2.release().await;
    assert!(client2.live_status().await.unwrap().live);

    bridge1.release().await;
    assert!(!client2.live_status().await.unwrap().live);

    assert_eq!(bridge2.reconcile().await, Reconcile::Reacquired);
    let status = client2.live_status().await.unwrap();
    assert_eq!(status.owner.as_deref(), Some("bridge-2"));
    assert_eq!(status.elapsed_seconds, 0);
}

#[tokio::test]
async fn queued_presses_reach_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let url = start_server(&dir.path().join("server")).await;
    let queue = PendingQueue::new(dir.path().join("bridge").join("backup.json"));

    let now = chrono::Utc::now();
    queue.append(PendingEntry::press(now, true)).unwrap();
    queue
        .append(PendingEntry::press(now + chrono::Duration::seconds(1), true))
        .unwrap();

    let bridge = EventBridge::new(client(&url, "bridge-1"), queue.clone(), true);
    assert_eq!(bridge.sync_pending().await.unwrap(), 2);
    assert!(queue.pending().unwrap().is_empty());

    let entries: Vec<serde_json::Value> = serde_json::from_slice(
        &std::fs::read(dir.path().join("server").join("trickortreat_data.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(entries.len(), 2);
}
