//! WebSocket entrypoint and per-connection session driver.
//!
//! A connection moves through `Connecting -> Active -> Closing -> Closed`.
//! While active it runs two tasks: a reader that applies inbound updates and
//! re-broadcasts them, and a writer that drains the session's queue to the
//! wire. When either task finishes the other is aborted and the session
//! leaves the registry. Cancelling the driver aborts both tasks; the dropped
//! session is then pruned by the next broadcast.

use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::server::GatewayState;
use crate::session_registry::{Session, SessionId};
use crate::ws_protocol::{EntityUpdate, Inbound};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Close frame or end of stream.
    PeerClosed,
    ReadFailed(String),
    WriteFailed(String),
    /// The registry dropped this session's queue sender.
    QueueClosed,
    /// The world snapshot could not be produced.
    SnapshotFailed(String),
    /// A loop task panicked or was cancelled.
    Aborted,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed => write!(f, "peer closed"),
            SessionEnd::ReadFailed(e) => write!(f, "read failed: {e}"),
            SessionEnd::WriteFailed(e) => write!(f, "write failed: {e}"),
            SessionEnd::QueueClosed => write!(f, "queue closed"),
            SessionEnd::SnapshotFailed(e) => write!(f, "snapshot failed: {e}"),
            SessionEnd::Aborted => write!(f, "aborted"),
        }
    }
}

struct Lifecycle {
    state: SessionState,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            state: SessionState::Connecting,
        }
    }

    fn advance(&mut self, session: Option<SessionId>, next: SessionState) {
        debug!(session = ?session, from = ?self.state, to = ?next, "Session state change");
        self.state = next;
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (sender, receiver) = socket.split();
    drive_session(sender, receiver, state).await;
}

/// Run one session over any message sink/stream pair until it closes.
pub async fn drive_session<W, R, E>(mut sink: W, stream: R, gateway: GatewayState) -> SessionEnd
where
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: fmt::Display + Send,
    R: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let mut lifecycle = Lifecycle::new();

    let session = match gateway.open_session().await {
        Ok(session) => session,
        Err(e) => {
            error!(error = %e, "Could not snapshot world for new session");
            let _ = sink.close().await;
            lifecycle.advance(None, SessionState::Closed);
            return SessionEnd::SnapshotFailed(e.to_string());
        }
    };
    let id = session.id();
    lifecycle.advance(Some(id), SessionState::Active);

    // Dropping the set aborts both loops, so neither outlives this driver.
    let mut loops = JoinSet::new();
    loops.spawn(write_loop(sink, session));
    loops.spawn(read_loop(stream, gateway.clone(), id));

    // If either task exits, abort the other.
    let end = match loops.join_next().await {
        Some(Ok(end)) => end,
        Some(Err(_)) | None => SessionEnd::Aborted,
    };
    loops.shutdown().await;

    lifecycle.advance(Some(id), SessionState::Closing);
    gateway.registry.leave(id).await;
    lifecycle.advance(Some(id), SessionState::Closed);

    info!(session = %id, reason = %end, "WebSocket session closed");
    end
}

async fn write_loop<W>(mut sink: W, mut session: Session) -> SessionEnd
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    while let Some(msg) = session.recv().await {
        if let Err(e) = sink.send(Message::Text(msg.to_string())).await {
            return SessionEnd::WriteFailed(e.to_string());
        }
    }
    SessionEnd::QueueClosed
}

async fn read_loop<R, E>(mut stream: R, gateway: GatewayState, id: SessionId) -> SessionEnd
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(frame) = stream.next().await {
        let msg = match frame {
            Ok(msg) => msg,
            Err(e) => return SessionEnd::ReadFailed(e.to_string()),
        };
        match Inbound::from(msg) {
            Inbound::Update(text) => apply_update(&gateway, id, text).await,
            Inbound::Undecodable => warn!(session = %id, "Dropping non-UTF-8 binary frame"),
            Inbound::Ignored => {}
            Inbound::Close => return SessionEnd::PeerClosed,
        }
    }
    SessionEnd::PeerClosed
}

/// Apply one inbound update and re-broadcast the original text.
async fn apply_update(gateway: &GatewayState, id: SessionId, text: String) {
    let update = match EntityUpdate::parse(&text) {
        Ok(update) => update,
        Err(e) => {
            warn!(session = %id, error = %e, "Dropping malformed update");
            return;
        }
    };
    gateway.store.set(&update.entity, update.document).await;
    let delivered = gateway.registry.broadcast(Arc::from(text)).await;
    debug!(session = %id, entity = %update.entity, delivered, "Update applied and broadcast");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;
    use serde_json::{Value, json};
    use std::io;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;

    /// Client side of an in-memory connection.
    struct TestClient {
        to_server: mpsc::UnboundedSender<Result<Message, io::Error>>,
        from_server: mpsc::UnboundedReceiver<Message>,
        driver: JoinHandle<SessionEnd>,
    }

    impl TestClient {
        fn connect(gateway: &GatewayState) -> Self {
            let (to_server, server_in) = mpsc::unbounded();
            let (server_out, from_server) = mpsc::unbounded();
            let driver = tokio::spawn(drive_session(server_out, server_in, gateway.clone()));
            Self {
                to_server,
                from_server,
                driver,
            }
        }

        fn send_text(&self, text: &str) {
            self.to_server
                .unbounded_send(Ok(Message::Text(text.to_string())))
                .unwrap();
        }

        async fn next_text(&mut self) -> String {
            let msg = timeout(Duration::from_secs(2), self.from_server.next())
                .await
                .expect("timed out waiting for server message")
                .expect("server closed the stream");
            match msg {
                Message::Text(text) => text,
                other => panic!("unexpected frame: {other:?}"),
            }
        }

        async fn close(self) -> SessionEnd {
            self.to_server
                .unbounded_send(Ok(Message::Close(None)))
                .unwrap();
            timeout(Duration::from_secs(2), self.driver)
                .await
                .unwrap()
                .unwrap()
        }
    }

    async fn wait_for_sessions(gateway: &GatewayState, n: usize) {
        timeout(Duration::from_secs(2), async {
            while gateway.registry.len().await != n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("registry never reached expected size");
    }

    #[tokio::test]
    async fn test_snapshot_then_echo_of_own_update() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);

        assert_eq!(a.next_text().await, "{}");

        let raw = r#"{"paddle1": {"x": 5}}"#;
        a.send_text(raw);
        assert_eq!(a.next_text().await, raw);

        assert_eq!(gateway.store.get("paddle1").await, json!({"x": 5}));
        assert_eq!(a.close().await, SessionEnd::PeerClosed);
        assert!(gateway.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_existing_world() {
        let gateway = GatewayState::new();
        gateway
            .store
            .set("ball", json!({"x": 1, "y": 2}))
            .await;

        let mut a = TestClient::connect(&gateway);
        let snapshot: Value = serde_json::from_str(&a.next_text().await).unwrap();
        assert_eq!(snapshot, json!({"ball": {"x": 1, "y": 2}}));
    }

    #[tokio::test]
    async fn test_update_fans_out_raw_bytes_to_other_sessions() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        let mut b = TestClient::connect(&gateway);
        a.next_text().await;
        b.next_text().await;
        wait_for_sessions(&gateway, 2).await;

        // Unusual spacing proves the text is forwarded verbatim.
        let raw = "{ \"ball\" :{\"y\":9 } }";
        a.send_text(raw);

        assert_eq!(b.next_text().await, raw);
        assert_eq!(a.next_text().await, raw);
    }

    #[tokio::test]
    async fn test_malformed_update_is_dropped_and_session_survives() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        a.next_text().await;

        a.send_text("not json");
        a.send_text(r#"{"a": {}, "b": {}}"#);
        let good = r#"{"ball": {"x": 1}}"#;
        a.send_text(good);

        // Only the valid update comes back.
        assert_eq!(a.next_text().await, good);
        assert_eq!(gateway.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_scalar_update_is_stored_and_echoed() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        let mut b = TestClient::connect(&gateway);
        a.next_text().await;
        b.next_text().await;
        wait_for_sessions(&gateway, 2).await;

        for (raw, stored) in [
            (r#"{"ball": 3}"#, json!(3)),
            (r#"{"score": null}"#, json!(null)),
            (r#"{"trail": [1, 2]}"#, json!([1, 2])),
        ] {
            a.send_text(raw);
            assert_eq!(a.next_text().await, raw);
            assert_eq!(b.next_text().await, raw);
            let entity = raw.split('"').nth(1).unwrap();
            assert_eq!(gateway.store.get(entity).await, stored);
        }
        assert_eq!(gateway.store.len().await, 3);
    }

    #[tokio::test]
    async fn test_aborted_driver_stops_both_loops() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        a.next_text().await;
        wait_for_sessions(&gateway, 1).await;

        let TestClient {
            to_server,
            from_server: _wire,
            driver,
        } = a;
        driver.abort();
        assert!(driver.await.unwrap_err().is_cancelled());

        // The reader is gone, so this update never reaches the store.
        let _ = to_server.unbounded_send(Ok(Message::Text(r#"{"ghost":{"x":1}}"#.into())));

        timeout(Duration::from_secs(2), async {
            loop {
                gateway.registry.broadcast(Arc::from("tick")).await;
                if gateway.registry.is_empty().await {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("orphaned session was never pruned");

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(gateway.store.is_empty().await);
        assert_eq!(gateway.registry.broadcast(Arc::from("tick")).await, 0);
    }

    #[tokio::test]
    async fn test_read_error_tears_down_session() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        a.next_text().await;

        a.to_server
            .unbounded_send(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
            .unwrap();
        let end = timeout(Duration::from_secs(2), a.driver).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::ReadFailed(_)));
        assert!(gateway.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_writer_failure_removes_session_and_others_still_receive() {
        let gateway = GatewayState::new();
        let mut a = TestClient::connect(&gateway);
        a.next_text().await;

        let b = TestClient::connect(&gateway);
        wait_for_sessions(&gateway, 2).await;
        // Simulate b's peer vanishing: its outbound wire is gone.
        let TestClient {
            to_server: b_in,
            from_server: b_out,
            driver: b_driver,
        } = b;
        drop(b_out);

        let raw = r#"{"paddle2": {"y": 3}}"#;
        a.send_text(raw);
        assert_eq!(a.next_text().await, raw);

        let end = timeout(Duration::from_secs(2), b_driver).await.unwrap().unwrap();
        assert!(matches!(end, SessionEnd::WriteFailed(_)));
        drop(b_in);

        wait_for_sessions(&gateway, 1).await;
        assert_eq!(gateway.registry.broadcast(Arc::from("ping")).await, 1);
        assert_eq!(a.next_text().await, "ping");
    }

    #[tokio::test]
    async fn test_end_of_stream_closes_session() {
        let gateway = GatewayState::new();
        let a = TestClient::connect(&gateway);
        wait_for_sessions(&gateway, 1).await;

        let TestClient {
            to_server,
            from_server: _wire,
            driver,
        } = a;
        drop(to_server);
        let end = timeout(Duration::from_secs(2), driver).await.unwrap().unwrap();
        assert_eq!(end, SessionEnd::PeerClosed);
        assert!(gateway.registry.is_empty().await);
    }
}
