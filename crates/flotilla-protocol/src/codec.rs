//! The fixed-frame codec: one registry tying type tags to payload layouts.
//!
//! Every payload variant implements [`WirePayload`]: a declared size plus a
//! `put`/`get` pair that walk the same field sequence through a shared
//! cursor. The match arms in [`encode_frame`] / [`decode_frame`] are the
//! registry — one arm per tag, nothing else to keep in sync.
//!
//! Encode cannot fail: over-long strings truncate, and the output buffer is
//! always exactly [`FRAME_LEN`] bytes. Decode fails closed: a buffer of any
//! other length is rejected outright, with no attempt to resynchronize.

use crate::error::ProtocolError;
use crate::fields::{FieldReader, FieldWriter};
use crate::types::{
    AuthFailed, AuthSuccess, ChallengePlayer, ChallengeReceived, ChallengeRef,
    Chat, Credentials, Message, MoveResult, MsgType, OnlinePlayer,
    OnlinePlayersList, PlaceShip, PlayerMove, PlayerReady, StartGame,
    BOARD_LEN, CHALLENGE_ID_LEN, CHAT_LEN, GAME_ID_LEN, GAME_MODE_LEN,
    MAX_ONLINE_PLAYERS, MAX_TOKEN_LEN, OPPONENT_LEN, PASSWORD_LEN,
    PLAYER_NAME_LEN, RANK_LEN, REASON_LEN, USERNAME_LEN,
};

// ---------------------------------------------------------------------------
// Frame geometry
// ---------------------------------------------------------------------------

/// The type tag field at offset 0.
pub const TYPE_LEN: usize = 4;

/// Payload region size: the largest variant ([`OnlinePlayersList`]).
pub const MAX_PAYLOAD_LEN: usize = OnlinePlayersList::SIZE;

/// Offset of the payload region within a frame.
pub const PAYLOAD_OFFSET: usize = TYPE_LEN + MAX_TOKEN_LEN;

/// Total frame size — every frame, every message type. 5520 bytes.
pub const FRAME_LEN: usize = PAYLOAD_OFFSET + MAX_PAYLOAD_LEN;

// ---------------------------------------------------------------------------
// WirePayload — one layout definition per variant
// ---------------------------------------------------------------------------

/// A payload variant's wire layout.
///
/// `put` and `get` must visit the same fields in the same order; the cursor
/// turns that field order into offsets, which is what keeps the two
/// directions byte-compatible by construction.
pub(crate) trait WirePayload: Sized {
    /// Declared size of this variant's prefix of the payload region.
    const SIZE: usize;

    fn put(&self, w: &mut FieldWriter<'_>);
    fn get(r: &mut FieldReader<'_>) -> Self;
}

impl WirePayload for Credentials {
    const SIZE: usize = USERNAME_LEN + PASSWORD_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.username, USERNAME_LEN);
        w.put_cstr(&self.password, PASSWORD_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            username: r.get_cstr(USERNAME_LEN),
            password: r.get_cstr(PASSWORD_LEN),
        }
    }
}

impl WirePayload for AuthSuccess {
    const SIZE: usize = MAX_TOKEN_LEN + USERNAME_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.token, MAX_TOKEN_LEN);
        w.put_cstr(&self.username, USERNAME_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            token: r.get_cstr(MAX_TOKEN_LEN),
            username: r.get_cstr(USERNAME_LEN),
        }
    }
}

impl WirePayload for AuthFailed {
    const SIZE: usize = REASON_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.reason, REASON_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            reason: r.get_cstr(REASON_LEN),
        }
    }
}

impl WirePayload for StartGame {
    // opponent[32] + game_id[64] + current_turn[32]
    const SIZE: usize = OPPONENT_LEN + (GAME_ID_LEN - 1) + OPPONENT_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.opponent, OPPONENT_LEN);
        w.put_cstr(&self.game_id, GAME_ID_LEN - 1);
        w.put_cstr(&self.current_turn, OPPONENT_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            opponent: r.get_cstr(OPPONENT_LEN),
            game_id: r.get_cstr(GAME_ID_LEN - 1),
            current_turn: r.get_cstr(OPPONENT_LEN),
        }
    }
}

impl WirePayload for PlayerMove {
    const SIZE: usize = GAME_ID_LEN + 4 + 4;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.game_id, GAME_ID_LEN);
        w.put_i32(self.row);
        w.put_i32(self.col);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            game_id: r.get_cstr(GAME_ID_LEN),
            row: r.get_i32(),
            col: r.get_i32(),
        }
    }
}

impl WirePayload for MoveResult {
    const SIZE: usize = 4 + 4 + 1 + 1 + 4 + 1 + 1;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_i32(self.row);
        w.put_i32(self.col);
        w.put_flag(self.is_hit);
        w.put_flag(self.is_sunk);
        w.put_i32(self.sunk_ship_type);
        w.put_flag(self.game_over);
        w.put_flag(self.is_your_shot);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            row: r.get_i32(),
            col: r.get_i32(),
            is_hit: r.get_flag(),
            is_sunk: r.get_flag(),
            sunk_ship_type: r.get_i32(),
            game_over: r.get_flag(),
            is_your_shot: r.get_flag(),
        }
    }
}

impl WirePayload for Chat {
    const SIZE: usize = CHAT_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.message, CHAT_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            message: r.get_cstr(CHAT_LEN),
        }
    }
}

impl WirePayload for PlaceShip {
    const SIZE: usize = 4 + 4 + 4 + 1 + 3;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_i32(self.ship_type);
        w.put_i32(self.row);
        w.put_i32(self.col);
        w.put_flag(self.is_horizontal);
        w.pad(3);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        let out = Self {
            ship_type: r.get_i32(),
            row: r.get_i32(),
            col: r.get_i32(),
            is_horizontal: r.get_flag(),
        };
        r.skip(3);
        out
    }
}

impl WirePayload for PlayerReady {
    const SIZE: usize = GAME_ID_LEN + BOARD_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.game_id, GAME_ID_LEN);
        w.put_bytes(&self.board, BOARD_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            game_id: r.get_cstr(GAME_ID_LEN),
            board: r.get_bytes::<BOARD_LEN>(),
        }
    }
}

impl WirePayload for OnlinePlayersList {
    const SIZE: usize = 4
        + MAX_ONLINE_PLAYERS * PLAYER_NAME_LEN
        + MAX_ONLINE_PLAYERS * 4
        + MAX_ONLINE_PLAYERS * RANK_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        let count = self.players.len().min(MAX_ONLINE_PLAYERS);
        w.put_i32(count as i32);
        // Columnar layout: the peer's struct holds three parallel arrays
        // (all names, then all ratings, then all ranks), never interleaved
        // records. Unused slots stay zero.
        for i in 0..MAX_ONLINE_PLAYERS {
            let name = self
                .players
                .get(i)
                .map(|p| p.username.as_str())
                .unwrap_or("");
            w.put_cstr(name, PLAYER_NAME_LEN);
        }
        for i in 0..MAX_ONLINE_PLAYERS {
            w.put_i32(self.players.get(i).map(|p| p.elo).unwrap_or(0));
        }
        for i in 0..MAX_ONLINE_PLAYERS {
            let rank =
                self.players.get(i).map(|p| p.rank.as_str()).unwrap_or("");
            w.put_cstr(rank, RANK_LEN);
        }
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        let count =
            (r.get_i32().max(0) as usize).min(MAX_ONLINE_PLAYERS);
        let mut usernames = Vec::with_capacity(MAX_ONLINE_PLAYERS);
        for _ in 0..MAX_ONLINE_PLAYERS {
            usernames.push(r.get_cstr(PLAYER_NAME_LEN));
        }
        let mut elos = Vec::with_capacity(MAX_ONLINE_PLAYERS);
        for _ in 0..MAX_ONLINE_PLAYERS {
            elos.push(r.get_i32());
        }
        let mut ranks = Vec::with_capacity(MAX_ONLINE_PLAYERS);
        for _ in 0..MAX_ONLINE_PLAYERS {
            ranks.push(r.get_cstr(RANK_LEN));
        }

        // Only the first `count` slots carry real players.
        let players = usernames
            .into_iter()
            .zip(elos)
            .zip(ranks)
            .take(count)
            .map(|((username, elo), rank)| OnlinePlayer {
                username,
                elo,
                rank,
            })
            .collect();

        Self { players }
    }
}

impl WirePayload for ChallengePlayer {
    const SIZE: usize =
        PLAYER_NAME_LEN + PLAYER_NAME_LEN + CHALLENGE_ID_LEN + GAME_MODE_LEN + 4;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.challenger_id, PLAYER_NAME_LEN);
        w.put_cstr(&self.target_id, PLAYER_NAME_LEN);
        w.put_cstr(&self.challenge_id, CHALLENGE_ID_LEN);
        w.put_cstr(&self.game_mode, GAME_MODE_LEN);
        w.put_i32(self.time_control);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            challenger_id: r.get_cstr(PLAYER_NAME_LEN),
            target_id: r.get_cstr(PLAYER_NAME_LEN),
            challenge_id: r.get_cstr(CHALLENGE_ID_LEN),
            game_mode: r.get_cstr(GAME_MODE_LEN),
            time_control: r.get_i32(),
        }
    }
}

impl WirePayload for ChallengeReceived {
    const SIZE: usize = PLAYER_NAME_LEN
        + PLAYER_NAME_LEN
        + CHALLENGE_ID_LEN
        + GAME_MODE_LEN
        + 4
        + 8;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.challenger_username, PLAYER_NAME_LEN);
        w.put_cstr(&self.challenger_id, PLAYER_NAME_LEN);
        w.put_cstr(&self.challenge_id, CHALLENGE_ID_LEN);
        w.put_cstr(&self.game_mode, GAME_MODE_LEN);
        w.put_i32(self.time_control);
        w.put_i64(self.expires_at);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            challenger_username: r.get_cstr(PLAYER_NAME_LEN),
            challenger_id: r.get_cstr(PLAYER_NAME_LEN),
            challenge_id: r.get_cstr(CHALLENGE_ID_LEN),
            game_mode: r.get_cstr(GAME_MODE_LEN),
            time_control: r.get_i32(),
            expires_at: r.get_i64(),
        }
    }
}

impl WirePayload for ChallengeRef {
    const SIZE: usize = CHALLENGE_ID_LEN;

    fn put(&self, w: &mut FieldWriter<'_>) {
        w.put_cstr(&self.challenge_id, CHALLENGE_ID_LEN);
    }

    fn get(r: &mut FieldReader<'_>) -> Self {
        Self {
            challenge_id: r.get_cstr(CHALLENGE_ID_LEN),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry lookups
// ---------------------------------------------------------------------------

/// Declared payload size for a message type. Types with no payload struct
/// use none of the payload region.
pub fn payload_size(msg_type: MsgType) -> usize {
    match msg_type {
        MsgType::Register | MsgType::Login => Credentials::SIZE,
        MsgType::AuthSuccess => AuthSuccess::SIZE,
        MsgType::AuthFailed => AuthFailed::SIZE,
        MsgType::StartGame => StartGame::SIZE,
        MsgType::PlayerMove => PlayerMove::SIZE,
        MsgType::MoveResult => MoveResult::SIZE,
        MsgType::Chat => Chat::SIZE,
        MsgType::PlaceShip => PlaceShip::SIZE,
        MsgType::PlayerReady => PlayerReady::SIZE,
        MsgType::OnlinePlayersList => OnlinePlayersList::SIZE,
        MsgType::ChallengePlayer => ChallengePlayer::SIZE,
        MsgType::ChallengeReceived => ChallengeReceived::SIZE,
        MsgType::ChallengeAccept
        | MsgType::ChallengeDecline
        | MsgType::ChallengeDeclined
        | MsgType::ChallengeExpired
        | MsgType::ChallengeCancel
        | MsgType::ChallengeCancelled => ChallengeRef::SIZE,
        MsgType::JoinQueue
        | MsgType::LeaveQueue
        | MsgType::GameOver
        | MsgType::Logout
        | MsgType::Ping
        | MsgType::Pong
        | MsgType::GetOnlinePlayers
        | MsgType::AuthToken => 0,
    }
}

// ---------------------------------------------------------------------------
// encode / decode
// ---------------------------------------------------------------------------

/// Serializes a message into one complete wire frame.
///
/// Always returns exactly [`FRAME_LEN`] bytes. The token field is written on
/// every frame; pass `""` for unauthenticated messages (register/login).
/// Each variant writes only its declared prefix of the payload region — the
/// rest stays zero.
pub fn encode_frame(message: &Message, token: &str) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    let mut w = FieldWriter::new(&mut frame);
    w.put_u32(message.tag());
    w.put_cstr(token, MAX_TOKEN_LEN);

    match message {
        Message::Register(p) | Message::Login(p) => p.put(&mut w),
        Message::AuthSuccess(p) => p.put(&mut w),
        Message::AuthFailed(p) => p.put(&mut w),
        Message::StartGame(p) => p.put(&mut w),
        Message::PlayerMove(p) => p.put(&mut w),
        Message::MoveResult(p) => p.put(&mut w),
        Message::Chat(p) => p.put(&mut w),
        Message::PlaceShip(p) => p.put(&mut w),
        Message::PlayerReady(p) => p.put(&mut w),
        Message::OnlinePlayersList(p) => p.put(&mut w),
        Message::ChallengePlayer(p) => p.put(&mut w),
        Message::ChallengeReceived(p) => p.put(&mut w),
        Message::ChallengeAccept(p)
        | Message::ChallengeDecline(p)
        | Message::ChallengeDeclined(p)
        | Message::ChallengeExpired(p)
        | Message::ChallengeCancel(p)
        | Message::ChallengeCancelled(p) => p.put(&mut w),
        // Empty payloads: the token and tag are the whole message.
        Message::JoinQueue
        | Message::LeaveQueue
        | Message::GameOver
        | Message::Logout
        | Message::Ping
        | Message::Pong
        | Message::GetOnlinePlayers
        | Message::AuthToken
        | Message::Unknown { .. } => {}
    }

    debug_assert!(w.written() <= FRAME_LEN);
    frame
}

/// Deserializes one wire frame.
///
/// Fails closed: a buffer whose length is not exactly [`FRAME_LEN`] returns
/// [`ProtocolError::FrameLength`] — the caller drops the frame, no partial
/// parse is attempted. Tags outside the registry decode to
/// [`Message::Unknown`] so the reader loop survives newer peers.
///
/// The inbound token field is skipped: the client authenticates itself to
/// the server, never the reverse (an issued token arrives inside the
/// [`AuthSuccess`] payload instead).
pub fn decode_frame(bytes: &[u8]) -> Result<Message, ProtocolError> {
    if bytes.len() != FRAME_LEN {
        return Err(ProtocolError::FrameLength {
            got: bytes.len(),
            expected: FRAME_LEN,
        });
    }

    let mut r = FieldReader::new(bytes);
    let tag = r.get_u32();
    r.skip(MAX_TOKEN_LEN);

    let Some(msg_type) = MsgType::from_tag(tag) else {
        return Ok(Message::Unknown { tag });
    };

    Ok(match msg_type {
        MsgType::Register => Message::Register(Credentials::get(&mut r)),
        MsgType::Login => Message::Login(Credentials::get(&mut r)),
        MsgType::AuthSuccess => Message::AuthSuccess(AuthSuccess::get(&mut r)),
        MsgType::AuthFailed => Message::AuthFailed(AuthFailed::get(&mut r)),
        MsgType::JoinQueue => Message::JoinQueue,
        MsgType::LeaveQueue => Message::LeaveQueue,
        MsgType::StartGame => Message::StartGame(StartGame::get(&mut r)),
        MsgType::PlayerMove => Message::PlayerMove(PlayerMove::get(&mut r)),
        MsgType::MoveResult => Message::MoveResult(MoveResult::get(&mut r)),
        MsgType::GameOver => Message::GameOver,
        MsgType::Chat => Message::Chat(Chat::get(&mut r)),
        MsgType::Logout => Message::Logout,
        MsgType::Ping => Message::Ping,
        MsgType::Pong => Message::Pong,
        MsgType::PlaceShip => Message::PlaceShip(PlaceShip::get(&mut r)),
        MsgType::PlayerReady => Message::PlayerReady(PlayerReady::get(&mut r)),
        MsgType::GetOnlinePlayers => Message::GetOnlinePlayers,
        MsgType::OnlinePlayersList => {
            Message::OnlinePlayersList(OnlinePlayersList::get(&mut r))
        }
        MsgType::ChallengePlayer => {
            Message::ChallengePlayer(ChallengePlayer::get(&mut r))
        }
        MsgType::ChallengeReceived => {
            Message::ChallengeReceived(ChallengeReceived::get(&mut r))
        }
        MsgType::ChallengeAccept => {
            Message::ChallengeAccept(ChallengeRef::get(&mut r))
        }
        MsgType::ChallengeDecline => {
            Message::ChallengeDecline(ChallengeRef::get(&mut r))
        }
        MsgType::ChallengeDeclined => {
            Message::ChallengeDeclined(ChallengeRef::get(&mut r))
        }
        MsgType::ChallengeExpired => {
            Message::ChallengeExpired(ChallengeRef::get(&mut r))
        }
        MsgType::ChallengeCancel => {
            Message::ChallengeCancel(ChallengeRef::get(&mut r))
        }
        MsgType::ChallengeCancelled => {
            Message::ChallengeCancelled(ChallengeRef::get(&mut r))
        }
        MsgType::AuthToken => Message::AuthToken,
    })
}

// =========================================================================
// Tests
// =========================================================================
