//! Wire protocol between the server and its clients.
//!
//! Every frame carries one [`Envelope`]. Clients send requests and the server
//! answers each one with exactly one packet; the server never pushes
//! unsolicited state except the initial `Welcome` and a `Disconnected` notice
//! right before it closes a connection.

use crate::math::Vector2;
use crate::player::{ControlScheme, KeySet};
use crate::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const PROTOCOL_VERSION: u16 = 1;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: usize, max: usize },
    #[error("protocol version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u16, got: u16 },
    #[error("unexpected packet: {0}")]
    UnexpectedPacket(&'static str),
    #[error("invalid control scheme: {0}")]
    InvalidControlScheme(String),
}

/// Which half of the court a player defends. `Left` is player 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    Server,
    Client(u32),
    /// A client that has not logged in yet.
    Anonymous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u16,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub sender: Sender,
    pub packet: Packet,
}

impl Envelope {
    pub fn new(sender: Sender, packet: Packet) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            timestamp: now_millis(),
            sender,
            packet,
        }
    }

    pub fn check_version(&self) -> Result<(), ProtocolError> {
        if self.version == PROTOCOL_VERSION {
            Ok(())
        } else {
            Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                got: self.version,
            })
        }
    }
}

///Returns the current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One poll worth of client input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputFrame {
    /// Cursor position in court pixels.
    pub mouse: (i32, i32),
    pub keys: KeySet,
    pub controls: ControlScheme,
}

impl InputFrame {
    pub fn mouse_pos(&self) -> Vector2 {
        Vector2::from(self.mouse)
    }
}

/// Snapshot of a running match. Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShareState {
    pub remaining_time: f32,
    pub score_1: u32,
    pub score_2: u32,
    pub name_1: String,
    pub name_2: String,
    pub position_1: Vector2,
    pub position_2: Vector2,
    pub hook_tip_1: Vector2,
    pub hook_tip_2: Vector2,
    pub dash_cooldown_1: f32,
    pub hook_cooldown_1: f32,
    pub dash_cooldown_2: f32,
    pub hook_cooldown_2: f32,
    pub ball_position: Vector2,
    pub hooking_1: bool,
    pub hooking_2: bool,
    pub tiebreak: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Online,
    WaitingForApproval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginOutcome {
    KnownUser,
    RegisteredNewUser,
    IncorrectPassword,
    MissingCredentials,
    AlreadyOnline,
}

impl LoginOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginOutcome::KnownUser => "known user",
            LoginOutcome::RegisteredNewUser => "registering new user",
            LoginOutcome::IncorrectPassword => "Incorrect password for this username",
            LoginOutcome::MissingCredentials => "Make sure to fill both name and password",
            LoginOutcome::AlreadyOnline => "This player is already logged in!",
        }
    }

    /// Whether the client ends up logged in.
    pub fn is_accepted(&self) -> bool {
        matches!(self, LoginOutcome::KnownUser | LoginOutcome::RegisteredNewUser)
    }
}

impl fmt::Display for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengerRow {
    pub name: String,
    pub winrate: f32,
    pub elo: i32,
}

/// A finished 1v1 game as stored and as listed in match history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub names: (String, String),
    /// Ratings at the time the match started.
    pub elos: (i32, i32),
    pub scores: (u32, u32),
    pub winner: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub played_at: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    // Client to server
    LogIn { username: String, password: String },
    GetElo { name: String },
    GetChallengers,
    GetWinrate { name: String },
    GetMatchHistory { name: String },
    QueuedSolo,
    InGame(InputFrame),

    // Server to client
    Welcome {
        message: String,
    },
    ChangeOfStatus {
        status: Status,
        outcome: LoginOutcome,
        client_id: Option<u32>,
    },
    ClientElo {
        elo: Option<i32>,
        /// 100th-best and lowest rating on the server.
        top_elo: Vec<i32>,
    },
    Challengers {
        rows: Vec<ChallengerRow>,
    },
    Winrate {
        percent: Option<f32>,
    },
    MatchHistory {
        solo: Vec<GameRecord>,
        duo: Vec<GameRecord>,
    },
    WaitingForOpponent,
    GameState {
        side: Side,
        state: ShareState,
    },
    EndGameState(StatsSnapshot),
    Disconnected {
        reason: String,
    },
    Error {
        reason: String,
    },
}

impl Packet {
    /// Short tag used in log lines.
    pub fn flag(&self) -> &'static str {
        match self {
            Packet::LogIn { .. } => "log_in_data",
            Packet::GetElo { .. } => "get_elo",
            Packet::GetChallengers => "get_challengers",
            Packet::GetWinrate { .. } => "get_winrate",
            Packet::GetMatchHistory { .. } => "get_match_history",
            Packet::QueuedSolo => "queued_solo",
            Packet::InGame(_) => "ingame",
            Packet::Welcome { .. } => "welcome",
            Packet::ChangeOfStatus { .. } => "change_of_status",
            Packet::ClientElo { .. } => "client_elo",
            Packet::Challengers { .. } => "challengers",
            Packet::Winrate { .. } => "winrate",
            Packet::MatchHistory { .. } => "match_history",
            Packet::WaitingForOpponent => "Waiting_for_opponent",
            Packet::GameState { .. } => "game_state_1",
            Packet::EndGameState(_) => "end_game_state_1",
            Packet::Disconnected { .. } => "disconnected",
            Packet::Error { .. } => "error",
        }
    }

    /// Requests that are only valid once the connection has logged in.
    pub fn requires_login(&self) -> bool {
        matches!(self, Packet::QueuedSolo | Packet::InGame(_))
    }

    pub fn is_request(&self) -> bool {
        matches!(
            self,
            Packet::LogIn { .. }
                | Packet::GetElo { .. }
                | Packet::GetChallengers
                | Packet::GetWinrate { .. }
                | Packet::GetMatchHistory { .. }
                | Packet::QueuedSolo
                | Packet::InGame(_)
        )
    }
}
