//! Message types and payload structs for the battleship wire protocol.
//!
//! Every struct here mirrors a packed C struct on the server, field for
//! field. The capacities below are wire constants — changing any of them is
//! a breaking protocol change, not a tuning knob.

// ---------------------------------------------------------------------------
// Wire field capacities
// ---------------------------------------------------------------------------

/// Token field on every frame (JWT, NUL-padded).
pub const MAX_TOKEN_LEN: usize = 512;
/// Username in credentials and auth responses.
pub const USERNAME_LEN: usize = 32;
/// Password in credentials.
pub const PASSWORD_LEN: usize = 32;
/// Failure reason in `AuthFailed`.
pub const REASON_LEN: usize = 64;
/// Chat message body.
pub const CHAT_LEN: usize = 128;
/// Game id in move/ready/challenge payloads (64 chars + NUL slot).
pub const GAME_ID_LEN: usize = 65;
/// Opponent and current-turn names in `StartGame`.
pub const OPPONENT_LEN: usize = 32;
/// Player name in the online list and challenge payloads.
pub const PLAYER_NAME_LEN: usize = 64;
/// Rank string in the online list.
pub const RANK_LEN: usize = 32;
/// Game mode in challenge payloads.
pub const GAME_MODE_LEN: usize = 32;
/// Challenge id (64 chars + NUL slot).
pub const CHALLENGE_ID_LEN: usize = 65;
/// Raw board snapshot in `PlayerReady` (10x10 cells, one byte each).
pub const BOARD_LEN: usize = 100;
/// Slots in the columnar online-players list.
pub const MAX_ONLINE_PLAYERS: usize = 50;

// ---------------------------------------------------------------------------
// MsgType — the type tag registry
// ---------------------------------------------------------------------------

/// The integer discriminator at offset 0 of every frame.
///
/// Tags must match the server's `msg_type` enum exactly. Adding a message
/// type means adding a variant here, a payload struct (if any), and one
/// registry arm in the codec — the frame size only changes if the new
/// payload becomes the largest variant, which is a breaking change for
/// every type at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MsgType {
    Register = 1,
    Login = 2,
    AuthSuccess = 3,
    AuthFailed = 4,
    JoinQueue = 5,
    LeaveQueue = 6,
    StartGame = 7,
    PlayerMove = 8,
    MoveResult = 9,
    GameOver = 10,
    Chat = 11,
    Logout = 12,
    Ping = 13,
    Pong = 14,
    PlaceShip = 15,
    PlayerReady = 16,
    GetOnlinePlayers = 17,
    OnlinePlayersList = 18,
    ChallengePlayer = 19,
    ChallengeReceived = 20,
    ChallengeAccept = 21,
    ChallengeDecline = 22,
    ChallengeDeclined = 23,
    ChallengeExpired = 24,
    ChallengeCancel = 25,
    ChallengeCancelled = 26,
    AuthToken = 27,
}

impl MsgType {
    /// The raw wire tag.
    pub fn tag(self) -> u32 {
        self as u32
    }

    /// Looks up a tag in the registry. `None` for tags this build does not
    /// know — the codec surfaces those as [`Message::Unknown`] rather than
    /// failing, so newer servers don't kill the reader loop.
    pub fn from_tag(tag: u32) -> Option<Self> {
        Some(match tag {
            1 => Self::Register,
            2 => Self::Login,
            3 => Self::AuthSuccess,
            4 => Self::AuthFailed,
            5 => Self::JoinQueue,
            6 => Self::LeaveQueue,
            7 => Self::StartGame,
            8 => Self::PlayerMove,
            9 => Self::MoveResult,
            10 => Self::GameOver,
            11 => Self::Chat,
            12 => Self::Logout,
            13 => Self::Ping,
            14 => Self::Pong,
            15 => Self::PlaceShip,
            16 => Self::PlayerReady,
            17 => Self::GetOnlinePlayers,
            18 => Self::OnlinePlayersList,
            19 => Self::ChallengePlayer,
            20 => Self::ChallengeReceived,
            21 => Self::ChallengeAccept,
            22 => Self::ChallengeDecline,
            23 => Self::ChallengeDeclined,
            24 => Self::ChallengeExpired,
            25 => Self::ChallengeCancel,
            26 => Self::ChallengeCancelled,
            27 => Self::AuthToken,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload structs
// ---------------------------------------------------------------------------

/// Register/Login payload: `username[32] + password[32]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// AuthSuccess payload: `token[512] + username[32]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSuccess {
    pub token: String,
    pub username: String,
}

/// AuthFailed payload: `reason[64]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailed {
    pub reason: String,
}

/// StartGame payload: `opponent[32] + game_id[64] + current_turn[32]`.
///
/// Note the 64-byte game id — one byte shorter than everywhere else. That
/// asymmetry is the server's struct, preserved here bit for bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartGame {
    pub opponent: String,
    pub game_id: String,
    pub current_turn: String,
}

/// PlayerMove payload: `game_id[65] + row:i32 + col:i32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerMove {
    pub game_id: String,
    pub row: i32,
    pub col: i32,
}

/// MoveResult payload, 16 bytes packed:
/// `row:i32 + col:i32 + is_hit:u8 + is_sunk:u8 + sunk_ship_type:i32 +
/// game_over:u8 + is_your_shot:u8`.
///
/// `sunk_ship_type` sits at payload offset 10 — unaligned, because the
/// server sends the struct packed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub row: i32,
    pub col: i32,
    pub is_hit: bool,
    pub is_sunk: bool,
    pub sunk_ship_type: i32,
    pub game_over: bool,
    pub is_your_shot: bool,
}

/// Chat payload: `message[128]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
}

/// PlaceShip payload, 16 bytes:
/// `ship_type:i32 + row:i32 + col:i32 + is_horizontal:u8 + pad[3]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceShip {
    /// 5=carrier, 4=battleship, 3=cruiser/submarine, 2=destroyer.
    pub ship_type: i32,
    pub row: i32,
    pub col: i32,
    pub is_horizontal: bool,
}

/// PlayerReady payload: `game_id[65] + board[100]` raw cell bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerReady {
    pub game_id: String,
    pub board: [u8; BOARD_LEN],
}

/// One row of the online-players list, as the application sees it.
///
/// On the wire there is no such record: the list is columnar (all names,
/// then all ratings, then all ranks). The codec converts between the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlinePlayer {
    pub username: String,
    pub elo: i32,
    pub rank: String,
}

/// OnlinePlayersList payload — the largest variant, and the reason the
/// payload region is 5004 bytes:
/// `count:i32 + names 50x[64] + elo 50x i32 + ranks 50x[32]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnlinePlayersList {
    pub players: Vec<OnlinePlayer>,
}

/// ChallengePlayer payload, 229 bytes:
/// `challenger_id[64] + target_id[64] + challenge_id[65] + game_mode[32] +
/// time_control:i32`.
///
/// The client leaves `challenger_id` and `challenge_id` empty; the server
/// fills them from the token and its own id generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengePlayer {
    pub challenger_id: String,
    pub target_id: String,
    pub challenge_id: String,
    pub game_mode: String,
    pub time_control: i32,
}

/// ChallengeReceived payload, 237 bytes:
/// `challenger_username[64] + challenger_id[64] + challenge_id[65] +
/// game_mode[32] + time_control:i32 + expires_at:i64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeReceived {
    pub challenger_username: String,
    pub challenger_id: String,
    pub challenge_id: String,
    pub game_mode: String,
    pub time_control: i32,
    /// Unix millis; the only 64-bit field in the protocol.
    pub expires_at: i64,
}

/// Payload shared by every challenge lifecycle notification and command
/// that carries only an id: `challenge_id[65]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeRef {
    pub challenge_id: String,
}

// ---------------------------------------------------------------------------
// Message — the tagged union
// ---------------------------------------------------------------------------

/// One decoded wire message: the Rust view of the server's tagged union.
///
/// Variants with no payload struct have an empty payload region on the wire
/// (the frame is still [`crate::FRAME_LEN`] bytes). [`Message::Unknown`]
/// carries tags this build does not recognize so listeners can be ignored
/// without crashing the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Register(Credentials),
    Login(Credentials),
    AuthSuccess(AuthSuccess),
    AuthFailed(AuthFailed),
    JoinQueue,
    LeaveQueue,
    StartGame(StartGame),
    PlayerMove(PlayerMove),
    MoveResult(MoveResult),
    /// Outcome details arrive in [`MoveResult`]; this frame is a bare signal.
    GameOver,
    Chat(Chat),
    Logout,
    Ping,
    Pong,
    PlaceShip(PlaceShip),
    PlayerReady(PlayerReady),
    GetOnlinePlayers,
    OnlinePlayersList(OnlinePlayersList),
    ChallengePlayer(ChallengePlayer),
    ChallengeReceived(ChallengeReceived),
    ChallengeAccept(ChallengeRef),
    ChallengeDecline(ChallengeRef),
    ChallengeDeclined(ChallengeRef),
    ChallengeExpired(ChallengeRef),
    ChallengeCancel(ChallengeRef),
    ChallengeCancelled(ChallengeRef),
    /// Re-authentication: the credential rides in the frame's token field,
    /// the payload region is unused.
    AuthToken,
    /// A frame with a tag outside the registry. Payload is not interpreted.
    Unknown { tag: u32 },
}

impl Message {
    /// The registry entry for this message, or `None` for [`Message::Unknown`].
    pub fn msg_type(&self) -> Option<MsgType> {
        Some(match self {
            Self::Register(_) => MsgType::Register,
            Self::Login(_) => MsgType::Login,
            Self::AuthSuccess(_) => MsgType::AuthSuccess,
            Self::AuthFailed(_) => MsgType::AuthFailed,
            Self::JoinQueue => MsgType::JoinQueue,
            Self::LeaveQueue => MsgType::LeaveQueue,
            Self::StartGame(_) => MsgType::StartGame,
            Self::PlayerMove(_) => MsgType::PlayerMove,
            Self::MoveResult(_) => MsgType::MoveResult,
            Self::GameOver => MsgType::GameOver,
            Self::Chat(_) => MsgType::Chat,
            Self::Logout => MsgType::Logout,
            Self::Ping => MsgType::Ping,
            Self::Pong => MsgType::Pong,
            Self::PlaceShip(_) => MsgType::PlaceShip,
            Self::PlayerReady(_) => MsgType::PlayerReady,
            Self::GetOnlinePlayers => MsgType::GetOnlinePlayers,
            Self::OnlinePlayersList(_) => MsgType::OnlinePlayersList,
            Self::ChallengePlayer(_) => MsgType::ChallengePlayer,
            Self::ChallengeReceived(_) => MsgType::ChallengeReceived,
            Self::ChallengeAccept(_) => MsgType::ChallengeAccept,
            Self::ChallengeDecline(_) => MsgType::ChallengeDecline,
            Self::ChallengeDeclined(_) => MsgType::ChallengeDeclined,
            Self::ChallengeExpired(_) => MsgType::ChallengeExpired,
            Self::ChallengeCancel(_) => MsgType::ChallengeCancel,
            Self::ChallengeCancelled(_) => MsgType::ChallengeCancelled,
            Self::AuthToken => MsgType::AuthToken,
            Self::Unknown { .. } => return None,
        })
    }

    /// The raw wire tag, including for [`Message::Unknown`].
    pub fn tag(&self) -> u32 {
        match self {
            Self::Unknown { tag } => *tag,
            // msg_type() is Some for every other variant.
            _ => self.msg_type().map(MsgType::tag).unwrap_or(0),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_tag_round_trips_every_registered_tag() {
        for tag in 1..=27u32 {
            let msg_type = MsgType::from_tag(tag)
                .unwrap_or_else(|| panic!("tag {tag} should be registered"));
            assert_eq!(msg_type.tag(), tag);
        }
    }

    #[test]
    fn test_from_tag_rejects_unregistered_tags() {
        assert_eq!(MsgType::from_tag(0), None);
        assert_eq!(MsgType::from_tag(28), None);
        assert_eq!(MsgType::from_tag(u32::MAX), None);
    }

    #[test]
    fn test_message_tag_matches_registry() {
        assert_eq!(Message::Ping.tag(), 13);
        assert_eq!(Message::Pong.tag(), 14);
        assert_eq!(Message::AuthToken.tag(), 27);
        assert_eq!(Message::Unknown { tag: 999 }.tag(), 999);
    }

    #[test]
    fn test_unknown_message_has_no_msg_type() {
        assert_eq!(Message::Unknown { tag: 42 }.msg_type(), None);
    }
}
