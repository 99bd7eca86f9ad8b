// Integration tests for the per-connection session loop
// Inbound frames are fed through a channel standing in for the socket reader

use futures_util::stream::{self, Stream};
use serde_json::Value;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use warp::ws::Message;

use chat_hub::config::HubConfig;
use chat_hub::core::{Connection, Hub, HubHandle, Session};
use chat_hub::storage::{MemoryUserStore, SharedIdentityStore, UserStatus};

type Inbound = Pin<Box<dyn Stream<Item = Result<Message, io::Error>> + Send>>;
type InboundTx = mpsc::UnboundedSender<Result<Message, io::Error>>;

const MAX_LEN: usize = 64;

fn inbound() -> (InboundTx, Inbound) {
    let (tx, rx) = mpsc::unbounded_channel();
    let stream: Inbound = Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }));
    (tx, stream)
}

async fn next_json(rx: &mut mpsc::Receiver<Message>) -> Value {
    let frame = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("outbound queue closed");
    serde_json::from_str(frame.to_str().expect("text frame")).expect("valid JSON frame")
}

struct Fixture {
    hub: HubHandle,
    // bob is connected straight to the hub and observes alice's session
    bob_rx: mpsc::Receiver<Message>,
    alice: Connection,
    alice_rx: mpsc::Receiver<Message>,
    alice_in: InboundTx,
    session: JoinHandle<()>,
}

async fn start() -> Fixture {
    let store = Arc::new(MemoryUserStore::new());
    let alice_id = store.create_user("alice", "alice@example.com", "hash").await.unwrap().id;
    let bob_id = store.create_user("bob", "bob@example.com", "hash").await.unwrap().id;
    let identity: SharedIdentityStore = store;
    let (hub, _task) = Hub::spawn(identity.clone(), &HubConfig::default());

    let (bob, mut bob_rx) = Connection::channel(64);
    hub.register(bob, bob_id).await.unwrap();
    assert_eq!(next_json(&mut bob_rx).await["type"], "online_users");

    let (alice, mut alice_rx) = Connection::channel(64);
    let (alice_in, stream) = inbound();
    let session = Session::new(hub.clone(), identity, alice.clone(), alice_id, MAX_LEN);
    let session = tokio::spawn(session.run(stream));

    assert_eq!(next_json(&mut alice_rx).await["type"], "online_users");
    assert_eq!(next_json(&mut bob_rx).await["type"], "user_joined");

    Fixture {
        hub,
        bob_rx,
        alice,
        alice_rx,
        alice_in,
        session,
    }
}

async fn expect_left(bob_rx: &mut mpsc::Receiver<Message>) {
    let frame = next_json(bob_rx).await;
    assert_eq!(frame["type"], "user_left");
    assert_eq!(frame["username"], "alice");
}

async fn expect_session_end(session: JoinHandle<()>) {
    timeout(Duration::from_secs(2), session)
        .await
        .expect("session should end")
        .unwrap();
}

#[tokio::test]
async fn test_text_frame_becomes_broadcast() {
    let mut f = start().await;

    f.alice_in
        .send(Ok(Message::text(r#"{"content":"hello"}"#)))
        .unwrap();

    for rx in [&mut f.bob_rx, &mut f.alice_rx] {
        let frame = next_json(rx).await;
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["username"], "alice");
        assert_eq!(frame["content"], "hello");
    }
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let mut f = start().await;

    f.alice_in.send(Ok(Message::text("not json"))).unwrap();
    f.alice_in.send(Ok(Message::text(r#"{"text":"wrong field"}"#))).unwrap();
    f.alice_in.send(Ok(Message::binary(vec![1u8, 2, 3]))).unwrap();
    f.alice_in.send(Ok(Message::ping(Vec::new()))).unwrap();
    let oversized = format!(r#"{{"content":"{}"}}"#, "x".repeat(MAX_LEN));
    f.alice_in.send(Ok(Message::text(oversized))).unwrap();
    f.alice_in
        .send(Ok(Message::text(r#"{"content":"still here"}"#)))
        .unwrap();

    let frame = next_json(&mut f.bob_rx).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["content"], "still here");
    assert!(f.hub.snapshot().contains(f.alice.id()));
}

#[tokio::test]
async fn test_read_error_unregisters() {
    let mut f = start().await;

    f.alice_in
        .send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        .unwrap();

    expect_left(&mut f.bob_rx).await;
    expect_session_end(f.session).await;
    assert!(!f.hub.snapshot().contains(f.alice.id()));
}

#[tokio::test]
async fn test_stream_end_unregisters() {
    let mut f = start().await;

    drop(f.alice_in);

    expect_left(&mut f.bob_rx).await;
    expect_session_end(f.session).await;
}

#[tokio::test]
async fn test_close_frame_unregisters() {
    let mut f = start().await;

    f.alice_in.send(Ok(Message::close())).unwrap();

    expect_left(&mut f.bob_rx).await;
    expect_session_end(f.session).await;
}

#[tokio::test]
async fn test_hub_eviction_ends_session() {
    let mut f = start().await;

    // The reader stays open; only the hub side goes away
    f.hub.unregister(f.alice.id()).await.unwrap();

    expect_left(&mut f.bob_rx).await;
    expect_session_end(f.session).await;
    assert!(f.alice.is_closed());
    drop(f.alice_in);
}

#[tokio::test]
async fn test_aborted_session_still_unregisters() {
    let mut f = start().await;

    f.session.abort();
    let _ = f.session.await;

    expect_left(&mut f.bob_rx).await;
    assert!(!f.hub.snapshot().contains(f.alice.id()));
}

#[tokio::test]
async fn test_sessions_ending_at_once_leave_no_registration() {
    let store = Arc::new(MemoryUserStore::new());
    let alice_id = store.create_user("alice", "alice@example.com", "hash").await.unwrap().id;
    let bob_id = store.create_user("bob", "bob@example.com", "hash").await.unwrap().id;
    let identity: SharedIdentityStore = store.clone();
    let (hub, _task) = Hub::spawn(identity.clone(), &HubConfig::default());

    // The register and unregister of each session are queued back to back
    let mut outbound = Vec::new();
    for _ in 0..100 {
        let (conn, rx) = Connection::channel(64);
        outbound.push(rx);
        Session::new(hub.clone(), identity.clone(), conn, alice_id, MAX_LEN)
            .run(stream::empty::<Result<Message, io::Error>>())
            .await;
    }

    // Handled after every earlier request, so it sees the final registry
    let (observer, mut observer_rx) = Connection::channel(64);
    hub.register(observer, bob_id).await.unwrap();
    let online = next_json(&mut observer_rx).await;

    assert_eq!(online["online_users"].as_array().unwrap().len(), 1);
    assert_eq!(online["online_users"][0]["username"], "bob");
    assert_eq!(hub.snapshot().len(), 1);
    assert_eq!(store.status_of(alice_id).await, Some(UserStatus::Offline));
}
