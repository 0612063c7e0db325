//! Live-session acquisition, reconciliation and release.

use std::sync::Arc;
use std::time::Duration;

use porchlight_bridge::{
    ClientIdentity, RecordingSleeper, Reconcile, RetryPolicy, SessionManager, SyncClient,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::sync::watch;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IDENTITY: &str = "porch:4242:1761948000";

fn manager(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> SessionManager {
    let client = SyncClient::new(
        server.uri(),
        "test-key",
        ClientIdentity::new(IDENTITY),
        RetryPolicy::default(),
        Duration::from_secs(2),
    )
    .unwrap()
    .with_sleeper(sleeper);
    SessionManager::new(Arc::new(client))
}

fn live(owner: Option<&str>) -> Value {
    match owner {
        Some(owner) => json!({"live": true, "elapsed_seconds": 3, "owner": owner}),
        None => json!({"live": false, "elapsed_seconds": 0}),
    }
}

async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "healthy", "live_mode": false})),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn acquire_claims_session() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .and(body_json(json!({"live": true, "owner": IDENTITY})))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some(IDENTITY))))
        .expect(1)
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert!(session.acquire(5).await);
    assert!(session.is_owner());
}

#[tokio::test]
async fn acquire_stops_when_another_bridge_holds_session() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some("bridge-1"))))
        .expect(1)
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert!(!session.acquire(5).await);
    assert!(!session.is_owner());
}

#[tokio::test]
async fn acquire_gives_up_after_bounded_rounds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .expect(6)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some(IDENTITY))))
        .expect(0)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let session = manager(&server, sleeper.clone());
    assert!(!session.acquire(2).await);

    let ms = Duration::from_millis;
    // Two rounds of per-call retries with one round backoff between them.
    assert_eq!(
        sleeper.delays(),
        vec![ms(500), ms(1000), ms(500), ms(500), ms(1000)]
    );
}

#[tokio::test]
async fn stop_lets_in_flight_acquire_round_finish() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(live(Some(IDENTITY)))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = Arc::new(manager(&server, Arc::new(RecordingSleeper::new())));
    let (stop_tx, stop) = watch::channel(false);
    let task = tokio::spawn({
        let session = session.clone();
        async move { session.acquire_until(5, stop).await }
    });

    // Stop arrives while the enable is still waiting for its reply.
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop_tx.send(true).unwrap();

    assert!(task.await.unwrap());
    assert!(session.is_owner());
}

#[tokio::test]
async fn stop_before_acquire_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    let (_stop_tx, stop) = watch::channel(true);
    assert!(!session.acquire_until(5, stop).await);
}

#[tokio::test]
async fn reconcile_reacquires_after_server_reset() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some(IDENTITY))))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/live_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(None)))
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert!(session.acquire(1).await);
    assert_eq!(session.reconcile().await, Reconcile::Reacquired);
    assert!(session.is_owner());
}

#[tokio::test]
async fn reconcile_defers_to_other_owner() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some("bridge-1"))))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some("bridge-1"))))
        .expect(0)
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert_eq!(
        session.reconcile().await,
        Reconcile::Deferred {
            owner: Some("bridge-1".to_string())
        }
    );
    assert!(!session.is_owner());
}

#[tokio::test]
async fn reconcile_confirms_held_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some(IDENTITY))))
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert_eq!(session.reconcile().await, Reconcile::Held);
    assert!(session.is_owner());
}

#[tokio::test]
async fn reconcile_reports_unreachable_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/live_status"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert_eq!(session.reconcile().await, Reconcile::Unreachable);
}

#[tokio::test]
async fn release_is_skipped_when_not_owner() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(None)))
        .expect(0)
        .mount(&server)
        .await;

    manager(&server, Arc::new(RecordingSleeper::new())).release().await;
}

#[tokio::test]
async fn release_disables_owned_session() {
    let server = MockServer::start().await;
    mount_health(&server).await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .and(body_json(json!({"live": true, "owner": IDENTITY})))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(Some(IDENTITY))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/set_live"))
        .and(body_json(json!({"live": false, "owner": IDENTITY})))
        .respond_with(ResponseTemplate::new(200).set_body_json(live(None)))
        .expect(1)
        .mount(&server)
        .await;

    let session = manager(&server, Arc::new(RecordingSleeper::new()));
    assert!(session.acquire(1).await);
    session.release().await;
    assert!(!session.is_owner());
}
