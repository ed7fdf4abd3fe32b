use super::*;
use crate::config::{ConfigError, TransportKind};
use crate::events::EventReceiver;
use serde_json::json;

fn subscribe(events: &EventDispatcher, kind: EventKind) -> EventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    events.subscribe(kind, tx);
    rx
}

// =============================================================================
// dispatch_frame
// =============================================================================

#[test]
fn receive_message_invocation_is_emitted() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let mut rx = subscribe(&events, EventKind::Message);

    let frame = Frame::invocation(None, "ReceiveMessage", vec![json!("bob"), json!("hi")]);
    assert!(dispatch_frame(frame, &events, &shared).is_none());

    assert_eq!(
        rx.try_recv().unwrap(),
        HubEvent::Message { sender: "bob".into(), content: "hi".into(), timestamp: None }
    );
}

#[test]
fn unknown_invocation_is_dropped() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let mut rx = subscribe(&events, EventKind::Message);

    let frame = Frame::invocation(None, "Typing", vec![json!("bob")]);
    assert!(dispatch_frame(frame, &events, &shared).is_none());
    assert!(rx.try_recv().is_err());
}

#[test]
fn close_without_reconnect_ends_link() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let end = dispatch_frame(Frame::close(Some("kicked".into()), false), &events, &shared);
    assert!(matches!(end, Some(LinkEnd::Closed(Some(ref e))) if e == "kicked"));
}

#[test]
fn reconnectable_close_marks_link_lost() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let end = dispatch_frame(Frame::close(None, true), &events, &shared);
    assert!(matches!(end, Some(LinkEnd::Lost(_))));
}

#[test]
fn ping_keeps_link_open() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    assert!(dispatch_frame(Frame::ping(), &events, &shared).is_none());
}

// =============================================================================
// Shared completions
// =============================================================================

#[tokio::test]
async fn completion_resolves_pending_invocation() {
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let rx = shared.register("inv-1".into());

    dispatch_frame(Frame::completion("inv-1", None), &events, &shared);

    assert!(rx.await.unwrap().is_ok());
}

#[tokio::test]
async fn error_completion_fails_invocation() {
    let shared = Shared::default();
    let rx = shared.register("inv-2".into());

    shared.complete("inv-2", Some("user banned".into()));

    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Hub(ref m) if m == "user banned"));
}

#[tokio::test]
async fn fail_pending_closes_every_waiter() {
    let shared = Shared::default();
    let a = shared.register("a".into());
    let b = shared.register("b".into());

    shared.fail_pending();

    assert!(matches!(a.await.unwrap(), Err(TransportError::Closed)));
    assert!(matches!(b.await.unwrap(), Err(TransportError::Closed)));
}

// =============================================================================
// HubConnection
// =============================================================================

#[tokio::test]
async fn invoke_before_start_is_not_active() {
    let conn = HubConnection::new(HubConfig::new("http://127.0.0.1:9")).unwrap();
    let err = conn.invoke("SendMessage", vec![json!("a"), json!("b")]).await.unwrap_err();
    assert!(matches!(err, TransportError::NotActive));
}

#[tokio::test]
async fn stop_before_start_is_noop() {
    let conn = HubConnection::new(HubConfig::new("http://127.0.0.1:9")).unwrap();
    let (tx, mut closed) = mpsc::unbounded_channel();
    conn.subscribe(EventKind::Closed, tx);
    conn.stop().await.unwrap();
    assert!(closed.try_recv().is_err());
}

#[test]
fn new_rejects_non_http_base_url() {
    let err = HubConnection::new(HubConfig::new("ftp://hub")).err().unwrap();
    assert!(matches!(err, TransportError::Config(_)));
}

#[test]
fn new_rejects_zero_keepalive() {
    let mut config = HubConfig::new("http://127.0.0.1:9");
    config.keepalive_interval = std::time::Duration::ZERO;
    let err = HubConnection::new(config).err().unwrap();
    assert!(matches!(err, TransportError::Config(ConfigError::Parse { var: "HUBCHAT_KEEPALIVE_SECS", .. })));
}

#[tokio::test]
async fn start_against_closed_port_reports_every_transport() {
    let mut config = HubConfig::new("http://127.0.0.1:9");
    config.handshake_timeout = std::time::Duration::from_secs(2);
    let conn = HubConnection::new(config).unwrap();

    let err = conn.start().await.unwrap_err();
    let TransportError::NoTransport(detail) = err else {
        panic!("expected NoTransport, got {err:?}");
    };
    assert!(detail.contains("websockets"));
    assert!(detail.contains("sse"));
}

// =============================================================================
// Keepalive and server timeout
// =============================================================================

/// A link whose far end is the test: frames sent by the client arrive on the
/// returned receiver, frames pushed into the returned sender are read by it.
fn memory_link() -> (Link, mpsc::Receiver<Frame>, mpsc::Sender<link::Inbound>) {
    let (out_tx, out_rx) = mpsc::channel(link::LINK_QUEUE_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel(link::LINK_QUEUE_CAPACITY);
    (Link::new(TransportKind::WebSockets, out_tx, in_rx, Vec::new()), out_rx, in_tx)
}

fn timing_config() -> HubConfig {
    let mut config = HubConfig::new("http://127.0.0.1:9");
    config.keepalive_interval = std::time::Duration::from_secs(15);
    config.server_timeout = std::time::Duration::from_secs(30);
    config.reconnect_delays = Vec::new();
    config
}

#[tokio::test(start_paused = true)]
async fn keepalive_ping_goes_out_each_interval() {
    let mut config = timing_config();
    config.server_timeout = std::time::Duration::from_secs(100);
    let interval = config.keepalive_interval;
    let (mut link, mut sent, _inbound) = memory_link();
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let started = Instant::now();

    let task = tokio::spawn(async move { run_link(&mut link, &config, &events, &shared).await });

    let first = sent.recv().await.unwrap();
    assert_eq!(first.kind, FrameKind::Ping);
    assert!(started.elapsed() >= interval);
    assert!(started.elapsed() < interval * 2);

    let second = sent.recv().await.unwrap();
    assert_eq!(second.kind, FrameKind::Ping);
    assert!(started.elapsed() >= interval * 2);

    task.abort();
}

#[tokio::test(start_paused = true)]
async fn silent_link_is_lost_after_server_timeout() {
    let config = timing_config();
    let timeout = config.server_timeout;
    let (mut link, _sent, _inbound) = memory_link();
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let started = Instant::now();

    let end = run_link(&mut link, &config, &events, &shared).await;

    assert!(matches!(end, LinkEnd::Lost(ref reason) if reason.contains("server timeout")));
    assert!(started.elapsed() >= timeout);
}

#[tokio::test(start_paused = true)]
async fn inbound_traffic_extends_server_timeout() {
    let config = timing_config();
    let timeout = config.server_timeout;
    let (mut link, _sent, inbound) = memory_link();
    let events = EventDispatcher::new();
    let shared = Shared::default();
    let started = Instant::now();

    let task = tokio::spawn(async move { run_link(&mut link, &config, &events, &shared).await });
    tokio::time::sleep(std::time::Duration::from_secs(20)).await;
    inbound.send(Ok(Frame::ping())).await.unwrap();

    let end = task.await.unwrap();
    assert!(matches!(end, LinkEnd::Lost(_)));
    assert!(started.elapsed() >= std::time::Duration::from_secs(20) + timeout);
}

#[tokio::test(start_paused = true)]
async fn silent_link_reconnects_then_closes_when_schedule_is_exhausted() {
    let config = timing_config();
    let (link, _sent, _inbound) = memory_link();
    let events = EventDispatcher::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    for kind in EventKind::ALL {
        events.subscribe(kind, tx.clone());
    }
    let shared = Arc::new(Shared::default());
    let pending = shared.register("inv-9".into());
    let started = Instant::now();

    supervise(link, config.clone(), reqwest::Client::new(), events, Arc::clone(&shared)).await;

    assert!(started.elapsed() >= config.server_timeout);
    let HubEvent::Reconnecting { error: Some(reason) } = rx.try_recv().unwrap() else {
        panic!("expected reconnecting first");
    };
    assert!(reason.contains("server timeout"));
    assert_eq!(rx.try_recv().unwrap(), HubEvent::Closed { error: Some(reason) });
    assert!(matches!(pending.await.unwrap(), Err(TransportError::Closed)));
}
