//! Wire protocol for Flotilla.
//!
//! The battleship server speaks a fixed-size binary protocol: every frame is
//! exactly [`FRAME_LEN`] bytes regardless of message type. A frame is the
//! wire image of a packed C struct:
//!
//! ```text
//! offset 0    type     u32, little-endian
//! offset 4    token    byte[512], NUL-padded C string (bearer credential)
//! offset 516  payload  byte[5004], variant-specific prefix, zero tail
//! ```
//!
//! The payload region is sized for the largest variant (the online-players
//! list); every other variant writes a prefix of it and leaves the rest
//! zeroed. No length prefix or delimiter exists — framing is by total size
//! alone, so a buffer of the wrong length is not a recoverable condition
//! and decode fails closed.
//!
//! This crate knows nothing about sockets. It defines:
//!
//! - **Types** ([`Message`], [`MsgType`], the payload structs) — the message
//!   structures that travel on the wire.
//! - **Codec** ([`encode_frame`], [`decode_frame`]) — the fixed-layout
//!   serializer/deserializer.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during decoding.

mod codec;
mod error;
mod fields;
mod types;

pub use codec::{
    decode_frame, encode_frame, payload_size, FRAME_LEN, MAX_PAYLOAD_LEN,
    PAYLOAD_OFFSET, TYPE_LEN,
};
pub use error::ProtocolError;
pub use types::{
    AuthFailed, AuthSuccess, ChallengePlayer, ChallengeReceived, ChallengeRef,
    Chat, Credentials, Message, MoveResult, MsgType, OnlinePlayer,
    OnlinePlayersList, PlaceShip, PlayerMove, PlayerReady, StartGame,
    BOARD_LEN, CHALLENGE_ID_LEN, CHAT_LEN, GAME_ID_LEN, GAME_MODE_LEN,
    MAX_ONLINE_PLAYERS, MAX_TOKEN_LEN, OPPONENT_LEN, PASSWORD_LEN,
    PLAYER_NAME_LEN, RANK_LEN, REASON_LEN, USERNAME_LEN,
};
