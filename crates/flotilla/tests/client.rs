//! End-to-end client tests against a local mock server that speaks the
//! real binary protocol over WebSocket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flotilla::protocol::{
    decode_frame, encode_frame, AuthFailed, AuthSuccess, Message,
    MAX_TOKEN_LEN, TYPE_LEN,
};
use flotilla::session::{MemoryTokenStore, StoredSession, TokenStore};
use flotilla::{Client, ClientConfig, ConnectionState};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

// ---------------------------------------------------------------------------
// Mock server
// ---------------------------------------------------------------------------

/// One frame as the server saw it: the decoded message plus the raw token
/// field, which decode_frame deliberately does not surface.
type SeenFrame = (Message, String);

#[derive(Clone, Copy, PartialEq, Eq)]
enum ServerBehavior {
    /// Answer auth and pings like the real server.
    Normal,
    /// Drop the first connection right after the handshake.
    CloseFirstConn,
    /// Accept and record frames but never reply, not even to pings.
    Mute,
}

struct MockServer {
    url: String,
    /// Number of WebSocket connections accepted so far.
    connections: Arc<AtomicUsize>,
    /// Every frame received, across all connections, in arrival order.
    seen: mpsc::UnboundedReceiver<SeenFrame>,
    /// Accept-loop task; aborting it closes the listening port.
    accept_task: tokio::task::JoinHandle<()>,
}

fn frame_token(bytes: &[u8]) -> String {
    let field = &bytes[TYPE_LEN..TYPE_LEN + MAX_TOKEN_LEN];
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Starts a server that answers auth like the real one: password "secret"
/// succeeds with token "jwt-test", anything else is rejected. Pings get
/// pongs — unless the chosen behavior says otherwise.
async fn start_server(behavior: ServerBehavior) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    let connections = Arc::new(AtomicUsize::new(0));
    let (seen_tx, seen_rx) = mpsc::unbounded_channel();

    let conn_counter = Arc::clone(&connections);
    let accept_task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let n = conn_counter.fetch_add(1, Ordering::SeqCst) + 1;
            let seen_tx = seen_tx.clone();
            let drop_now = behavior == ServerBehavior::CloseFirstConn && n == 1;
            tokio::spawn(async move {
                let Ok(mut ws) =
                    tokio_tungstenite::accept_async(stream).await
                else {
                    return;
                };
                if drop_now {
                    let _ = ws.close(None).await;
                    return;
                }
                while let Some(Ok(msg)) = ws.next().await {
                    let WsMessage::Binary(bytes) = msg else {
                        continue;
                    };
                    let token = frame_token(&bytes);
                    let Ok(decoded) = decode_frame(&bytes) else {
                        continue;
                    };
                    let reply = match &decoded {
                        _ if behavior == ServerBehavior::Mute => None,
                        Message::Login(c) | Message::Register(c) => {
                            if c.password == "secret" {
                                Some(Message::AuthSuccess(AuthSuccess {
                                    token: "jwt-test".into(),
                                    username: c.username.clone(),
                                }))
                            } else {
                                Some(Message::AuthFailed(AuthFailed {
                                    reason: "invalid credentials".into(),
                                }))
                            }
                        }
                        Message::Ping => Some(Message::Pong),
                        _ => None,
                    };
                    let _ = seen_tx.send((decoded, token));
                    if let Some(reply) = reply {
                        let frame = encode_frame(&reply, "");
                        if ws.send(WsMessage::Binary(frame.into())).await.is_err()
                        {
                            return;
                        }
                    }
                }
            });
        }
    });

    MockServer {
        url,
        connections,
        seen: seen_rx,
        accept_task,
    }
}

fn fast_config(url: &str) -> ClientConfig {
    ClientConfig::new(url)
        .with_reconnect_delay(Duration::from_millis(20))
        .with_request_timeout(Duration::from_secs(2))
}

async fn wait_for_state(client: &Client, wanted: ConnectionState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while client.state() != wanted {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!("timed out waiting for state {wanted}, at {}", client.state())
    });
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_reaches_connected_state() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    assert_eq!(client.state(), ConnectionState::Initializing);
    client.connect().await.unwrap();
    assert!(client.is_connected());

    // Connecting again while connected is a no-op.
    client.connect().await.unwrap();
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_connects_share_one_dial() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    let a = client.clone();
    let b = client.clone();
    let (ra, rb) = tokio::join!(a.connect(), b.connect());
    ra.unwrap();
    rb.unwrap();

    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_manual_disconnect_does_not_reconnect() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    client.disconnect();
    assert_eq!(client.state(), ConnectionState::Disconnected);

    // Well past several reconnect delays: still exactly one connection.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_close_triggers_reconnect() {
    let server = start_server(ServerBehavior::CloseFirstConn).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    // The server drops the first connection; the client must come back on
    // its own and settle in Connected.
    wait_for_state(&client, ConnectionState::Connected).await;
    tokio::time::timeout(Duration::from_secs(2), async {
        while server.connections.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("client never reconnected");
}

#[tokio::test]
async fn test_reconnect_exhaustion_reaches_failed() {
    // The server drops the first connection and then stops listening, so
    // every retry dials a dead port.
    let server = start_server(ServerBehavior::CloseFirstConn).await;
    let config = fast_config(&server.url).with_max_reconnect_attempts(2);
    let client = Client::new(config, Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    server.accept_task.abort();

    wait_for_state(&client, ConnectionState::Failed).await;
}

#[tokio::test]
async fn test_state_listener_sees_transitions_in_order() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    let states = Arc::new(Mutex::new(Vec::new()));
    let states2 = Arc::clone(&states);
    let id = client.on_state_change(move |state| {
        states2.lock().unwrap().push(state);
    });

    client.connect().await.unwrap();
    client.disconnect();

    let seen = states.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnected,
        ]
    );

    assert!(client.off_state_change(id));
    assert!(!client.off_state_change(id));
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_login_success_persists_token() {
    let server = start_server(ServerBehavior::Normal).await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = Client::new(fast_config(&server.url), store.clone());

    client.connect().await.unwrap();
    let auth = client.login("alice", "secret").await.unwrap();
    assert_eq!(auth.username, "alice");
    assert_eq!(auth.token, "jwt-test");

    let session = store.load().unwrap().expect("session should be saved");
    assert_eq!(session.token, "jwt-test");
    assert_eq!(session.username, "alice");
}

#[tokio::test]
async fn test_login_rejection_carries_server_reason() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    let err = client.login("alice", "wrong").await.unwrap_err();
    match err {
        flotilla::ClientError::AuthRejected(reason) => {
            assert_eq!(reason, "invalid credentials");
        }
        other => panic!("expected AuthRejected, got {other}"),
    }
}

#[tokio::test]
async fn test_stored_token_is_presented_on_connect() {
    let mut server = start_server(ServerBehavior::Normal).await;
    let store = Arc::new(MemoryTokenStore::new());
    store
        .save(&StoredSession::new("jwt-resume", "alice"))
        .unwrap();

    let client = Client::new(fast_config(&server.url), store);
    client.connect().await.unwrap();

    let (message, token) = tokio::time::timeout(
        Duration::from_secs(2),
        server.seen.recv(),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(message, Message::AuthToken);
    assert_eq!(token, "jwt-resume");
}

#[tokio::test]
async fn test_signed_frames_carry_token_after_login() {
    let mut server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    client.login("alice", "secret").await.unwrap();
    client.join_queue().unwrap();

    // Skip the login frame, then check the queued join carries the token.
    let mut joined = None;
    for _ in 0..3 {
        let (message, token) = tokio::time::timeout(
            Duration::from_secs(2),
            server.seen.recv(),
        )
        .await
        .unwrap()
        .unwrap();
        if message == Message::JoinQueue {
            joined = Some(token);
            break;
        }
    }
    assert_eq!(joined.as_deref(), Some("jwt-test"));
}

// ---------------------------------------------------------------------------
// Logout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_logout_announces_logged_out_and_clears_session() {
    let mut server = start_server(ServerBehavior::Normal).await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = Client::new(
        fast_config(&server.url).with_logout_grace(Duration::from_millis(30)),
        store.clone(),
    );

    client.connect().await.unwrap();
    client.login("alice", "secret").await.unwrap();

    let states = Arc::new(Mutex::new(Vec::new()));
    let states2 = Arc::clone(&states);
    client.on_state_change(move |state| {
        states2.lock().unwrap().push(state);
    });

    client.logout().await.unwrap();
    assert_eq!(client.state(), ConnectionState::LoggedOut);
    assert!(store.load().unwrap().is_none(), "session must be cleared");

    // The logout frame made it to the server before the close.
    let mut saw_logout = false;
    while let Ok(Some((message, _))) =
        tokio::time::timeout(Duration::from_millis(200), server.seen.recv()).await
    {
        if message == Message::Logout {
            saw_logout = true;
            break;
        }
    }
    assert!(saw_logout, "server never received the logout frame");

    // The socket closing afterwards must not demote logged_out.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::LoggedOut);
    let seen = states.lock().unwrap().clone();
    assert_eq!(seen, vec![ConnectionState::LoggedOut]);
}

#[tokio::test]
async fn test_logout_while_disconnected_still_clears_session() {
    let store = Arc::new(MemoryTokenStore::new());
    store.save(&StoredSession::new("jwt-stale", "alice")).unwrap();

    let client = Client::new(
        ClientConfig::new("ws://127.0.0.1:1")
            .with_logout_grace(Duration::from_millis(1)),
        store.clone(),
    );
    client.logout().await.unwrap();
    assert!(store.load().unwrap().is_none());
    assert_eq!(client.state(), ConnectionState::LoggedOut);
}

// ---------------------------------------------------------------------------
// Sending and dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_send_before_connect_is_rejected() {
    let client = Client::new(
        ClientConfig::new("ws://127.0.0.1:1"),
        Arc::new(MemoryTokenStore::new()),
    );
    let err = client.join_queue().unwrap_err();
    assert!(matches!(err, flotilla::ClientError::NotConnected));
}

#[tokio::test]
async fn test_inbound_messages_reach_registered_handler() {
    let server = start_server(ServerBehavior::Normal).await;
    let client = Client::new(fast_config(&server.url), Arc::new(MemoryTokenStore::new()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on(flotilla::protocol::MsgType::AuthFailed, move |message| {
        let _ = tx.send(message.clone());
    });

    client.connect().await.unwrap();
    let _ = client.login("alice", "wrong").await;

    let message = tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .unwrap()
        .unwrap();
    match message {
        Message::AuthFailed(failed) => {
            assert_eq!(failed.reason, "invalid credentials");
        }
        other => panic!("expected AuthFailed, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_pings_flow_at_configured_interval() {
    let mut server = start_server(ServerBehavior::Normal).await;
    let config = fast_config(&server.url)
        .with_ping_interval(Duration::from_millis(50));
    let client = Client::new(config, Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(180)).await;

    let mut pings = 0;
    while let Ok(Some((message, _))) =
        tokio::time::timeout(Duration::from_millis(50), server.seen.recv()).await
    {
        if message == Message::Ping {
            pings += 1;
        }
    }
    assert!(pings >= 2, "expected at least 2 pings, saw {pings}");
    // The connection stayed healthy through the keepalives.
    assert!(client.is_connected());
}

#[tokio::test]
async fn test_missed_pong_deadline_drops_connection() {
    // The mute server accepts the socket but never answers a ping, so the
    // pong deadline must fire and close the connection.
    let server = start_server(ServerBehavior::Mute).await;
    let config = fast_config(&server.url)
        .with_ping_interval(Duration::from_millis(50))
        .with_pong_timeout(Duration::from_millis(100))
        .with_auto_reconnect(false);
    let client = Client::new(config, Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    assert!(client.is_connected());

    wait_for_state(&client, ConnectionState::Disconnected).await;
    // Reconnect is off, so the drop is the deadline's doing, not a retry
    // cycling the socket.
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unanswered_pings_without_pong_timeout_keep_connection() {
    // Default config never verifies pongs; a mute server must not cost us
    // the connection.
    let server = start_server(ServerBehavior::Mute).await;
    let config = fast_config(&server.url)
        .with_ping_interval(Duration::from_millis(50));
    let client = Client::new(config, Arc::new(MemoryTokenStore::new()));

    client.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(client.is_connected());
}
