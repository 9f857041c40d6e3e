//! Notifications for the transport layer.
//!
//! The coordinator never talks to sockets. It queues `Outbound` messages
//! and the host drains and delivers them.

use serde::Serialize;

use super::resolver::MoveOutcome;
use super::session::{Session, SessionPlayer, SessionSnapshot, SessionStatus};
use super::PlayerId;

/// Messages sent to a single player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Queued, no opponent yet
    Waiting,

    #[serde(rename_all = "camelCase")]
    GameStarted {
        session: SessionSnapshot,
        your_player_id: PlayerId,
    },

    #[serde(rename_all = "camelCase")]
    GameUpdated {
        players: Vec<SessionPlayer>,
        current_player: PlayerId,
        dice_value: u8,
        status: SessionStatus,
        winner: Option<PlayerId>,
        extra_turn: bool,
        displaced_player_ids: Vec<PlayerId>,
        last_move: MoveOutcome,
    },

    #[serde(rename_all = "camelCase")]
    GameReset {
        players: Vec<SessionPlayer>,
        current_player: PlayerId,
        status: SessionStatus,
    },

    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId },

    NotYourTurn,
}

impl ServerMessage {
    pub fn started(session: &Session, recipient: &str) -> Self {
        Self::GameStarted {
            session: session.snapshot(),
            your_player_id: recipient.to_string(),
        }
    }

    pub fn updated(session: &Session, outcome: MoveOutcome) -> Self {
        Self::GameUpdated {
            players: session.players().cloned().collect(),
            current_player: session.current_player().to_string(),
            dice_value: outcome.die_value,
            status: session.status(),
            winner: session.winner().map(str::to_string),
            extra_turn: outcome.extra_turn,
            displaced_player_ids: outcome.displaced_player_ids.clone(),
            last_move: outcome,
        }
    }

    pub fn reset(session: &Session) -> Self {
        Self::GameReset {
            players: session.players().cloned().collect(),
            current_player: session.current_player().to_string(),
            status: session.status(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::GameStarted { .. } => "game-started",
            Self::GameUpdated { .. } => "game-updated",
            Self::GameReset { .. } => "game-reset",
            Self::PlayerLeft { .. } => "player-left",
            Self::NotYourTurn => "not-your-turn",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// A message addressed to one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub recipient: PlayerId,
    pub message: ServerMessage,
}

impl Outbound {
    pub fn new(recipient: impl Into<PlayerId>, message: ServerMessage) -> Self {
        Self {
            recipient: recipient.into(),
            message,
        }
    }
}
