//! Integration tests for the session over a real WebSocket.
//!
//! A loopback tokio-tungstenite server plays the call backend; the session
//! uses the production `WsConnector`.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::time::Duration;

use carewatch_client::{
    spawn_session, ClientConfig, ConnectionStatus, Connector, Delivery, ReconnectConfig,
    SessionEvent, SessionHandle, StaticToken, TransportError, WsConnector,
};
use carewatch_core::{CallId, ChatMessage, ChatRole};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::error::UrlError;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single expected event
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Window in which no reconnect may happen
const QUIET_PERIOD: Duration = Duration::from_millis(300);

// ============================================================================
// Test Helpers
// ============================================================================

type ServerSocket = WebSocketStream<TcpStream>;

/// Loopback call backend that hands every accepted socket to the test.
struct TestServer {
    url: String,
    accepted: mpsc::UnboundedReceiver<(String, ServerSocket)>,
}

impl TestServer {
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (path_tx, mut path_rx) = oneshot::channel();
                let callback =
                    move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                        let _ = path_tx.send(req.uri().to_string());
                        Ok(resp)
                    };
                let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let path = path_rx.try_recv().unwrap_or_default();
                if tx.send((path, ws)).is_err() {
                    break;
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            accepted: rx,
        }
    }

    async fn accept(&mut self) -> (String, ServerSocket) {
        timeout(STEP_TIMEOUT, self.accepted.recv())
            .await
            .expect("connection within timeout")
            .expect("server running")
    }

    async fn expect_no_connection(&mut self) {
        assert!(
            timeout(QUIET_PERIOD, self.accepted.recv()).await.is_err(),
            "unexpected reconnect"
        );
    }
}

fn config_for(server: &TestServer) -> ClientConfig {
    ClientConfig {
        ws_base_url: server.url.clone(),
        reconnect: ReconnectConfig {
            base_delay_ms: 50,
            max_attempts: 3,
        },
        ..ClientConfig::default()
    }
}

async fn wait_connected(session: &SessionHandle) {
    let mut status = session.subscribe_status();
    assert!(timeout(STEP_TIMEOUT, status.wait_for(ConnectionStatus::Connected))
        .await
        .expect("connected within timeout"));
}

async fn send_json(ws: &mut ServerSocket, value: Value) {
    ws.send(Message::text(value.to_string())).await.expect("server send");
}

async fn recv_json(ws: &mut ServerSocket) -> Value {
    loop {
        let msg = timeout(STEP_TIMEOUT, ws.next())
            .await
            .expect("frame within timeout")
            .expect("socket open")
            .expect("valid frame");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("client sends JSON");
        }
    }
}

async fn next_event(events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(STEP_TIMEOUT, events.recv())
        .await
        .expect("event within timeout")
        .expect("event channel open")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_full_conversation_round_trip() {
    let mut server = TestServer::spawn().await;
    let session = spawn_session(&config_for(&server), WsConnector, StaticToken::new("secret"));
    let mut events = session.subscribe();

    session.connect(CallId::from(77)).await.unwrap();
    let (path, mut ws) = server.accept().await;
    assert_eq!(path, "/ws/77?token=secret");
    wait_connected(&session).await;

    // Keep-alive
    send_json(&mut ws, json!({"type": "ping", "timestamp": "2025-01-15T10:00:00Z"})).await;
    assert_eq!(recv_json(&mut ws).await["type"], "pong");

    // Acknowledged message
    let receipt = session.send("Good morning!").await.unwrap();
    let frame = recv_json(&mut ws).await;
    assert_eq!(frame["type"], "message");
    assert_eq!(frame["content"], "Good morning!");
    send_json(&mut ws, json!({"type": "ack", "message_id": frame["message_id"]})).await;
    assert_eq!(
        timeout(STEP_TIMEOUT, receipt).await.unwrap(),
        Delivery::Acknowledged
    );

    // Streamed reply
    for chunk in ["Morning", ", how did you sleep?"] {
        send_json(
            &mut ws,
            json!({"type": "stream_chunk", "response_id": "r1", "role": "assistant", "content": chunk}),
        )
        .await;
    }
    send_json(
        &mut ws,
        json!({"type": "stream_end", "response_id": "r1", "role": "assistant",
               "content": "Morning, how did you sleep?"}),
    )
    .await;

    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Message(ChatMessage::streaming(ChatRole::Assistant, "Morning"))
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Message(ChatMessage::streaming(
            ChatRole::Assistant,
            "Morning, how did you sleep?"
        ))
    );
    assert_eq!(
        next_event(&mut events).await,
        SessionEvent::Message(ChatMessage::complete(
            ChatRole::Assistant,
            "Morning, how did you sleep?"
        ))
    );

    // End of call
    session.send_end_call().await.unwrap();
    assert_eq!(recv_json(&mut ws).await, json!({"type": "end_call"}));
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let mut server = TestServer::spawn().await;
    let session = spawn_session(&config_for(&server), WsConnector, StaticToken::new("t"));

    session.connect(CallId::from(5)).await.unwrap();
    let (_, mut first) = server.accept().await;
    wait_connected(&session).await;

    first.close(None).await.unwrap();

    let (path, _second) = server.accept().await;
    assert_eq!(path, "/ws/5?token=t");
    wait_connected(&session).await;
    assert_eq!(session.snapshot().await.unwrap().reconnect_attempts, 0);
}

#[tokio::test]
async fn test_disconnect_closes_socket_without_reconnect() {
    let mut server = TestServer::spawn().await;
    let session = spawn_session(&config_for(&server), WsConnector, StaticToken::new("t"));

    session.connect(CallId::from(5)).await.unwrap();
    let (_, mut ws) = server.accept().await;
    wait_connected(&session).await;

    session.disconnect().await.unwrap();

    // The server sees a close frame or end of stream
    let next = timeout(STEP_TIMEOUT, ws.next()).await.expect("close within timeout");
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));

    server.expect_no_connection().await;
    assert_eq!(session.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_gives_up_when_server_is_gone() {
    // Nothing listens on this port once the listener is dropped
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ClientConfig {
        ws_base_url: format!("ws://{}", listener.local_addr().unwrap()),
        reconnect: ReconnectConfig {
            base_delay_ms: 50,
            max_attempts: 3,
        },
        ..ClientConfig::default()
    };
    drop(listener);

    let session = spawn_session(&config, WsConnector, StaticToken::new("t"));
    session.connect(CallId::from(1)).await.unwrap();

    // 50 + 100 + 200 ms of backoff, then give up
    let gave_up = timeout(STEP_TIMEOUT, async {
        loop {
            let snapshot = session.snapshot().await.unwrap();
            if snapshot.gave_up {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("gives up within timeout");

    assert_eq!(gave_up.reconnect_attempts, 3);
    assert_eq!(gave_up.status, ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_secure_url_reaches_tls_handshake() {
    // Accepts TCP and hangs up, so the TLS handshake itself fails
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let result = timeout(
        STEP_TIMEOUT,
        WsConnector.connect(&format!("wss://{addr}/ws/1?token=t")),
    )
    .await
    .expect("attempt finishes within timeout");
    let err = result.err().expect("no TLS server listening");

    assert!(
        !matches!(
            err,
            TransportError::WebSocket(tungstenite::Error::Url(UrlError::TlsFeatureNotEnabled))
        ),
        "wss rejected before connecting: {err}"
    );
}
