//! The connection manager: dial, keepalive, reconnect, logout.
//!
//! One background driver task owns the socket. The [`Client`] handle is a
//! cheap clone that talks to the driver through an unbounded outbound queue
//! and observes it through the dispatch bus and state listeners.
//!
//! Every (re)connect bumps an epoch counter. Drivers, reconnect loops, and
//! logout timers all carry the epoch they were started under and stand down
//! when it goes stale, so a late `onclose` from a connection the client has
//! already abandoned can never clobber the state machine.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use flotilla_protocol::{
    decode_frame, encode_frame, AuthSuccess, ChallengePlayer, ChallengeRef,
    Chat, Credentials, Message, MsgType, PlaceShip, PlayerMove, PlayerReady,
    BOARD_LEN,
};
use flotilla_session::{StoredSession, TokenStore};
use flotilla_transport::{
    Connection, Connector, WebSocketConnection, WebSocketConnector,
};
use tokio::sync::mpsc;

use crate::bus::{DispatchBus, HandlerId};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::state::ConnectionState;

type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// A token this close to its recorded expiry is not worth re-presenting;
/// the server would drop the session mid-game anyway.
const REAUTH_LEEWAY: Duration = Duration::from_secs(60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

struct Inner {
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    bus: DispatchBus,
    state: Mutex<ConnectionState>,
    state_listeners: Mutex<Vec<(HandlerId, StateListener)>>,
    /// Cached token, written on auth success and cleared on logout or
    /// rejection. Every outbound frame carries it.
    token: Mutex<Option<String>>,
    /// Sender half of the active driver's outbound queue. Dropping it
    /// closes the queue, which the driver treats as an order to close the
    /// socket.
    link: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    /// Consecutive failed reconnect attempts; reset on every open socket.
    attempts: AtomicU32,
    /// Set by disconnect/logout so a close is not treated as an outage.
    manual_close: AtomicBool,
    logged_out: AtomicBool,
    /// Runtime-togglable copy of `config.auto_reconnect`.
    auto_reconnect: AtomicBool,
    /// Generation counter; see the module docs.
    epoch: AtomicU64,
    /// Serializes dials so concurrent connect calls share one attempt.
    connect_gate: tokio::sync::Mutex<()>,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        *lock(&self.state)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = {
            let mut state = lock(&self.state);
            if *state == next {
                return;
            }
            std::mem::replace(&mut *state, next)
        };
        tracing::info!(from = %previous, to = %next, "connection state changed");

        let snapshot: Vec<StateListener> = lock(&self.state_listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in snapshot {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
                listener(next);
            }));
            if result.is_err() {
                tracing::error!(state = %next, "state listener panicked");
            }
        }
    }

    fn current_token(&self) -> String {
        lock(&self.token).clone().unwrap_or_default()
    }

    /// Encodes and queues one frame on the active connection.
    fn send_frame(&self, message: &Message) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let guard = lock(&self.link);
        let Some(outbound) = guard.as_ref() else {
            return Err(ClientError::NotConnected);
        };
        let frame = encode_frame(message, &self.current_token());
        outbound.send(frame).map_err(|_| ClientError::NotConnected)
    }

    /// Applies a decoded inbound message to client state, then hands it to
    /// the dispatch bus.
    fn handle_message(&self, message: Message) {
        match &message {
            Message::AuthSuccess(auth) => {
                *lock(&self.token) = Some(auth.token.clone());
                let session =
                    StoredSession::new(auth.token.clone(), auth.username.clone());
                if let Err(e) = self.store.save(&session) {
                    tracing::error!(error = %e, "failed to persist session");
                }
                tracing::info!(username = %auth.username, "authenticated");
            }
            Message::AuthFailed(failed) => {
                // A rejected credential is dead; stop presenting it on
                // reconnects.
                tracing::warn!(reason = %failed.reason, "authentication rejected");
                *lock(&self.token) = None;
                if let Err(e) = self.store.clear() {
                    tracing::error!(error = %e, "failed to clear session");
                }
            }
            Message::Unknown { tag } => {
                tracing::debug!(tag, "ignoring message with unknown tag");
            }
            _ => {}
        }
        self.bus.dispatch(&message);
    }
}

/// Client handle for the battleship server.
///
/// Cloning is cheap; all clones share one connection, one dispatch bus, and
/// one session store. Message sends are synchronous — they queue the frame
/// or fail with [`ClientError::NotConnected`], never block on the socket.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Creates a disconnected client.
    ///
    /// If `store` holds a non-expired session its token is presented on the
    /// first connect; an expired one is discarded here so the server never
    /// sees it.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Self {
        let token = match store.load() {
            Ok(Some(session)) if session.is_expired() => {
                tracing::info!(
                    username = %session.username,
                    "stored session expired, discarding"
                );
                if let Err(e) = store.clear() {
                    tracing::error!(error = %e, "failed to clear expired session");
                }
                None
            }
            Ok(Some(session)) => Some(session.token),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "could not load stored session");
                None
            }
        };

        let config_auto_reconnect = config.auto_reconnect;
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                bus: DispatchBus::new(),
                state: Mutex::new(ConnectionState::Initializing),
                state_listeners: Mutex::new(Vec::new()),
                token: Mutex::new(token),
                link: Mutex::new(None),
                attempts: AtomicU32::new(0),
                manual_close: AtomicBool::new(false),
                logged_out: AtomicBool::new(false),
                auto_reconnect: AtomicBool::new(config_auto_reconnect),
                epoch: AtomicU64::new(0),
                connect_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Connects to the server.
    ///
    /// Idempotent: concurrent calls share one dial, and calling while
    /// already connected is a no-op. On success a stored token is presented
    /// immediately so the server re-binds this socket to the account.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        let _gate = inner.connect_gate.lock().await;
        if inner.state() == ConnectionState::Connected {
            return Ok(());
        }

        inner.manual_close.store(false, Ordering::SeqCst);
        inner.logged_out.store(false, Ordering::SeqCst);
        inner.attempts.store(0, Ordering::SeqCst);
        inner.set_state(ConnectionState::Connecting);

        match open(inner).await {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, url = %inner.config.url, "connect failed");
                inner.set_state(ConnectionState::Error);
                if inner.auto_reconnect.load(Ordering::SeqCst) {
                    schedule_reconnect(inner, inner.epoch.load(Ordering::SeqCst));
                } else {
                    inner.set_state(ConnectionState::Disconnected);
                }
                Err(e)
            }
        }
    }

    /// Closes the connection without touching the stored session.
    /// No reconnect follows a manual disconnect.
    pub fn disconnect(&self) {
        let inner = &self.inner;
        inner.manual_close.store(true, Ordering::SeqCst);
        // Invalidate the driver and any reconnect loop in flight.
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        *lock(&inner.link) = None;
        inner.set_state(ConnectionState::Disconnected);
    }

    /// Logs out: tells the server, announces `logged_out`, clears the
    /// session, and closes the socket after a short grace so the frame
    /// actually reaches the wire.
    ///
    /// Works while disconnected too — the local session is still cleared.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let inner = &self.inner;
        if let Err(ClientError::NotConnected) = inner.send_frame(&Message::Logout)
        {
            tracing::debug!("logout without connection, clearing local session");
        }
        inner.logged_out.store(true, Ordering::SeqCst);
        inner.manual_close.store(true, Ordering::SeqCst);

        // Listeners hear the final state while the socket is still up.
        inner.set_state(ConnectionState::LoggedOut);
        *lock(&inner.token) = None;
        inner.store.clear()?;

        let epoch_at_logout = inner.epoch.load(Ordering::SeqCst);
        tokio::time::sleep(inner.config.logout_grace).await;
        // Skip the close if the caller reconnected during the grace.
        if inner.epoch.load(Ordering::SeqCst) == epoch_at_logout {
            inner.epoch.fetch_add(1, Ordering::SeqCst);
            *lock(&inner.link) = None;
        }
        Ok(())
    }

    /// Enables or disables automatic reconnection at runtime. Turning it
    /// off does not cancel a retry loop already sleeping; the loop checks
    /// the flag again before dialing.
    pub fn set_auto_reconnect(&self, enabled: bool) {
        self.inner.auto_reconnect.store(enabled, Ordering::SeqCst);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// The persisted session, if one exists.
    pub fn session(&self) -> Option<StoredSession> {
        self.inner.store.load().ok().flatten()
    }

    // -- Handlers ----------------------------------------------------------

    /// Registers a handler for inbound messages of `msg_type`.
    pub fn on(
        &self,
        msg_type: MsgType,
        handler: impl Fn(&Message) + Send + Sync + 'static,
    ) -> HandlerId {
        self.inner.bus.on(msg_type, handler)
    }

    /// Removes a message handler.
    pub fn off(&self, id: HandlerId) -> bool {
        self.inner.bus.off(id)
    }

    /// Registers a listener for connection state changes.
    pub fn on_state_change(
        &self,
        listener: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> HandlerId {
        let id = HandlerId::next();
        lock(&self.inner.state_listeners).push((id, Arc::new(listener)));
        id
    }

    /// Removes a state listener.
    pub fn off_state_change(&self, id: HandlerId) -> bool {
        let mut listeners = lock(&self.inner.state_listeners);
        match listeners.iter().position(|(l, _)| *l == id) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    // -- Auth --------------------------------------------------------------

    /// Logs in and waits for the server's verdict.
    ///
    /// On success the issued token is already persisted by the time this
    /// returns; on rejection the server's reason is in the error.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthSuccess, ClientError> {
        let request = Message::Login(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self.auth_request(request).await
    }

    /// Registers a new account; otherwise identical to [`login`](Self::login).
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthSuccess, ClientError> {
        let request = Message::Register(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self.auth_request(request).await
    }

    async fn auth_request(
        &self,
        request: Message,
    ) -> Result<AuthSuccess, ClientError> {
        let reply = self
            .request_reply(&request, MsgType::AuthSuccess, MsgType::AuthFailed)
            .await?;
        match reply {
            Message::AuthSuccess(auth) => Ok(auth),
            Message::AuthFailed(failed) => {
                Err(ClientError::AuthRejected(failed.reason))
            }
            _ => Err(ClientError::Timeout),
        }
    }

    /// Sends `request` and waits for the first `ok` or `err` reply, with
    /// the configured timeout. Handlers are removed on every exit path.
    async fn request_reply(
        &self,
        request: &Message,
        ok: MsgType,
        err: MsgType,
    ) -> Result<Message, ClientError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let tx_ok = tx.clone();
        let ok_id = self.inner.bus.on(ok, move |message| {
            let _ = tx_ok.send(message.clone());
        });
        let err_id = self.inner.bus.on(err, move |message| {
            let _ = tx.send(message.clone());
        });

        let outcome = async {
            self.inner.send_frame(request)?;
            match tokio::time::timeout(
                self.inner.config.request_timeout,
                rx.recv(),
            )
            .await
            {
                Ok(Some(reply)) => Ok(reply),
                Ok(None) | Err(_) => Err(ClientError::Timeout),
            }
        }
        .await;

        self.inner.bus.off(ok_id);
        self.inner.bus.off(err_id);
        outcome
    }

    // -- Outbound operations -----------------------------------------------

    /// Sends a raw message. The frame carries the current token; the call
    /// queues and returns without waiting for the socket.
    pub fn send(&self, message: &Message) -> Result<(), ClientError> {
        self.inner.send_frame(message)
    }

    pub fn join_queue(&self) -> Result<(), ClientError> {
        self.send(&Message::JoinQueue)
    }

    pub fn leave_queue(&self) -> Result<(), ClientError> {
        self.send(&Message::LeaveQueue)
    }

    /// Fires at a cell on the opponent's board. The outcome arrives later
    /// as a [`Message::MoveResult`].
    pub fn send_move(
        &self,
        game_id: &str,
        row: i32,
        col: i32,
    ) -> Result<(), ClientError> {
        self.send(&Message::PlayerMove(PlayerMove {
            game_id: game_id.into(),
            row,
            col,
        }))
    }

    pub fn place_ship(
        &self,
        ship_type: i32,
        row: i32,
        col: i32,
        is_horizontal: bool,
    ) -> Result<(), ClientError> {
        self.send(&Message::PlaceShip(PlaceShip {
            ship_type,
            row,
            col,
            is_horizontal,
        }))
    }

    /// Declares the board final. `board` is the raw 10x10 cell grid,
    /// row-major.
    pub fn player_ready(
        &self,
        game_id: &str,
        board: [u8; BOARD_LEN],
    ) -> Result<(), ClientError> {
        self.send(&Message::PlayerReady(PlayerReady {
            game_id: game_id.into(),
            board,
        }))
    }

    pub fn send_chat(&self, message: &str) -> Result<(), ClientError> {
        self.send(&Message::Chat(Chat {
            message: message.into(),
        }))
    }

    /// Asks for the lobby roster; the reply arrives as a
    /// [`Message::OnlinePlayersList`].
    pub fn get_online_players(&self) -> Result<(), ClientError> {
        self.send(&Message::GetOnlinePlayers)
    }

    /// Challenges another player. Challenger and challenge ids stay empty;
    /// the server fills them in.
    pub fn challenge_player(
        &self,
        target: &str,
        game_mode: &str,
        time_control: i32,
    ) -> Result<(), ClientError> {
        self.send(&Message::ChallengePlayer(ChallengePlayer {
            challenger_id: String::new(),
            target_id: target.into(),
            challenge_id: String::new(),
            game_mode: game_mode.into(),
            time_control,
        }))
    }

    pub fn accept_challenge(&self, challenge_id: &str) -> Result<(), ClientError> {
        self.send(&Message::ChallengeAccept(ChallengeRef {
            challenge_id: challenge_id.into(),
        }))
    }

    pub fn decline_challenge(
        &self,
        challenge_id: &str,
    ) -> Result<(), ClientError> {
        self.send(&Message::ChallengeDecline(ChallengeRef {
            challenge_id: challenge_id.into(),
        }))
    }

    pub fn cancel_challenge(&self, challenge_id: &str) -> Result<(), ClientError> {
        self.send(&Message::ChallengeCancel(ChallengeRef {
            challenge_id: challenge_id.into(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Connection driver
// ---------------------------------------------------------------------------

/// Dials the server and installs the new connection as the active link.
async fn open(inner: &Arc<Inner>) -> Result<(), ClientError> {
    let conn = WebSocketConnector.connect(&inner.config.url).await?;

    let epoch = inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    *lock(&inner.link) = Some(outbound_tx);
    inner.attempts.store(0, Ordering::SeqCst);
    inner.set_state(ConnectionState::Connected);

    // Present the stored credential right away so the server binds this
    // socket to the logged-in account before any game traffic. A token
    // about to expire is withheld; the caller has to log in fresh.
    if !inner.current_token().is_empty() {
        let near_expiry = inner
            .store
            .load()
            .ok()
            .flatten()
            .is_some_and(|session| session.is_near_expiry(REAUTH_LEEWAY));
        if near_expiry {
            tracing::warn!("stored token near expiry, skipping re-auth");
        } else if let Err(e) = inner.send_frame(&Message::AuthToken) {
            tracing::warn!(error = %e, "failed to queue re-auth frame");
        }
    }

    let driver = Arc::clone(inner);
    tokio::spawn(async move {
        drive(driver, conn, epoch, outbound_rx).await;
    });
    Ok(())
}

/// Owns the socket for one connection epoch: pumps the outbound queue,
/// sends keepalive pings, and feeds inbound frames to the bus.
async fn drive(
    inner: Arc<Inner>,
    conn: WebSocketConnection,
    epoch: u64,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    let ping_every = inner.config.ping_interval;
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_every,
        ping_every,
    );
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(frame) => {
                    if let Err(e) = conn.send(&frame).await {
                        tracing::warn!(error = %e, id = %conn.id(), "send failed");
                        break;
                    }
                }
                // The handle dropped the link: manual close or logout.
                None => {
                    let _ = conn.close().await;
                    break;
                }
            },
            _ = ping.tick() => {
                let frame = encode_frame(&Message::Ping, &inner.current_token());
                if let Err(e) = conn.send(&frame).await {
                    tracing::warn!(error = %e, id = %conn.id(), "ping send failed");
                    break;
                }
                if let Some(timeout) = inner.config.pong_timeout {
                    if pong_deadline.is_none() {
                        pong_deadline =
                            Some(tokio::time::Instant::now() + timeout);
                    }
                }
            },
            () = async {
                match pong_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                tracing::warn!(id = %conn.id(), "pong deadline missed, closing");
                let _ = conn.close().await;
                break;
            },
            received = conn.recv() => match received {
                Ok(Some(bytes)) => match decode_frame(&bytes) {
                    Ok(message) => {
                        if matches!(message, Message::Pong) {
                            pong_deadline = None;
                        }
                        inner.handle_message(message);
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            id = %conn.id(),
                            "dropping malformed frame"
                        );
                    }
                },
                Ok(None) => {
                    tracing::info!(id = %conn.id(), "connection closed by server");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, id = %conn.id(), "receive failed");
                    break;
                }
            },
        }
    }

    link_down(&inner, epoch);
}

/// Reacts to the driver exiting. Stale epochs are ignored — a newer
/// connection already owns the state machine.
fn link_down(inner: &Arc<Inner>, epoch: u64) {
    if inner.epoch.load(Ordering::SeqCst) != epoch {
        return;
    }
    *lock(&inner.link) = None;

    if inner.logged_out.load(Ordering::SeqCst) {
        // State is already LoggedOut; leave it announced that way.
        return;
    }
    if inner.manual_close.load(Ordering::SeqCst) {
        inner.set_state(ConnectionState::Disconnected);
        return;
    }

    inner.set_state(ConnectionState::Disconnected);
    if inner.auto_reconnect.load(Ordering::SeqCst) {
        schedule_reconnect(inner, epoch);
    }
}

fn schedule_reconnect(inner: &Arc<Inner>, from_epoch: u64) {
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        reconnect_loop(inner, from_epoch).await;
    });
}

/// Bounded fixed-delay retry. Stands down as soon as its epoch goes stale,
/// which covers both "another connect succeeded" and "the caller closed".
async fn reconnect_loop(inner: Arc<Inner>, from_epoch: u64) {
    loop {
        if inner.manual_close.load(Ordering::SeqCst)
            || inner.logged_out.load(Ordering::SeqCst)
            || !inner.auto_reconnect.load(Ordering::SeqCst)
            || inner.epoch.load(Ordering::SeqCst) != from_epoch
        {
            return;
        }

        let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > inner.config.max_reconnect_attempts {
            tracing::error!(
                attempts = inner.config.max_reconnect_attempts,
                "reconnect attempts exhausted"
            );
            inner.set_state(ConnectionState::Failed);
            return;
        }

        inner.set_state(ConnectionState::Reconnecting);
        tracing::info!(
            attempt,
            max = inner.config.max_reconnect_attempts,
            "reconnecting"
        );
        tokio::time::sleep(inner.config.reconnect_delay).await;

        let _gate = inner.connect_gate.lock().await;
        if inner.manual_close.load(Ordering::SeqCst)
            || inner.epoch.load(Ordering::SeqCst) != from_epoch
        {
            return;
        }
        match open(&inner).await {
            // open bumped the epoch; the new driver takes over from here.
            Ok(()) => return,
            Err(e) => {
                tracing::warn!(error = %e, attempt, "reconnect attempt failed");
            }
        }
    }
}
