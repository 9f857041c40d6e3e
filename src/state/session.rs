//! Session state management.
//!
//! A session is one two-player game: seats, board, turn pointer and status.
//! The registry owns every session and indexes them by player.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::board::{BoardDescriptor, BoardValidationError, Difficulty, START_SQUARE};
use super::{PlayerId, SessionId};

/// Seats per session.
pub const SEATS: usize = 2;

/// Default grace before a half-empty session is torn down after a disconnect.
pub const DEFAULT_DISCONNECT_GRACE_SECS: i64 = 5;

/// Default maximum session age.
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Playing,
    Won,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Won => "won",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// A seated player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPlayer {
    pub id: PlayerId,
    pub name: String,
    pub position: u8,
    /// 1 or 2, by seat
    pub player_number: u8,
}

impl SessionPlayer {
    pub fn new(id: PlayerId, name: String, player_number: u8) -> Self {
        Self {
            id,
            name,
            position: START_SQUARE,
            player_number,
        }
    }
}

/// A disconnected player whose seat is held open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub player: SessionPlayer,
    pub grace_until: DateTime<Utc>,
}

/// How a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalKind {
    /// Explicit leave; never waits
    Leave,
    /// Dropped connection; the seat is held for the grace period
    Disconnect,
}

/// Full session state as sent to clients when a game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub players: Vec<SessionPlayer>,
    pub current_player: PlayerId,
    pub status: SessionStatus,
    pub winner: Option<PlayerId>,
    pub difficulty: Difficulty,
    pub board: BoardDescriptor,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a session needs two distinct players")]
    SamePlayer,

    #[error("player {0} is already in a session")]
    AlreadyInSession(PlayerId),

    #[error("invalid board: {0}")]
    InvalidBoard(#[from] BoardValidationError),
}

/// One game between two players.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,

    /// Present players indexed by id
    players: HashMap<PlayerId, SessionPlayer>,

    /// Both seat holders in seat order, present or not
    seats: [PlayerId; SEATS],

    current_player: PlayerId,

    status: SessionStatus,

    winner: Option<PlayerId>,

    pub difficulty: Difficulty,

    board: BoardDescriptor,

    pub created_at: DateTime<Utc>,

    departure: Option<Departure>,
}

impl Session {
    /// Seat two players on a validated board. The first player moves first.
    pub fn new(
        id: SessionId,
        first: (PlayerId, String),
        second: (PlayerId, String),
        difficulty: Difficulty,
        board: BoardDescriptor,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if first.0 == second.0 {
            return Err(SessionError::SamePlayer);
        }
        board.validate()?;

        let seats = [first.0.clone(), second.0.clone()];
        let mut players = HashMap::with_capacity(SEATS);
        for (number, (player_id, name)) in [first, second].into_iter().enumerate() {
            players.insert(
                player_id.clone(),
                SessionPlayer::new(player_id, name, number as u8 + 1),
            );
        }

        Ok(Self {
            id,
            players,
            current_player: seats[0].clone(),
            seats,
            status: SessionStatus::Playing,
            winner: None,
            difficulty,
            board,
            created_at,
            departure: None,
        })
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn current_player(&self) -> &str {
        &self.current_player
    }

    pub fn is_player_turn(&self, player_id: &str) -> bool {
        self.status.is_playing() && self.current_player == player_id
    }

    pub fn board(&self) -> &BoardDescriptor {
        &self.board
    }

    pub fn departure(&self) -> Option<&Departure> {
        self.departure.as_ref()
    }

    pub fn get_player(&self, player_id: &str) -> Option<&SessionPlayer> {
        self.players.get(player_id)
    }

    pub(crate) fn get_player_mut(&mut self, player_id: &str) -> Option<&mut SessionPlayer> {
        self.players.get_mut(player_id)
    }

    pub fn has_player(&self, player_id: &str) -> bool {
        self.players.contains_key(player_id)
    }

    /// Present players in seat order.
    pub fn players(&self) -> impl Iterator<Item = &SessionPlayer> {
        self.seats.iter().filter_map(|id| self.players.get(id))
    }

    pub fn player_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.players().map(|p| p.id.as_str())
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// The other seat holder, if still present.
    pub fn opponent_of(&self, player_id: &str) -> Option<&SessionPlayer> {
        self.seats
            .iter()
            .find(|id| id.as_str() != player_id)
            .and_then(|id| self.players.get(id))
    }

    pub(crate) fn set_current_player(&mut self, player_id: PlayerId) {
        self.current_player = player_id;
    }

    pub(crate) fn declare_winner(&mut self, player_id: PlayerId) {
        self.status = SessionStatus::Won;
        self.current_player = player_id.clone();
        self.winner = Some(player_id);
    }

    /// Back to the starting squares, first seat to move. Idempotent.
    ///
    /// The first seat gets the turn even while it is held for a disconnect;
    /// no move can be made until the seat is refilled.
    pub fn reset(&mut self) {
        for player in self.players.values_mut() {
            player.position = START_SQUARE;
        }
        if let Some(departure) = self.departure.as_mut() {
            departure.player.position = START_SQUARE;
        }
        self.status = SessionStatus::Playing;
        self.winner = None;
        self.current_player = self.seats[0].clone();
    }

    /// Take a player out of their seat.
    pub(crate) fn remove_player(
        &mut self,
        player_id: &str,
        kind: RemovalKind,
        grace_until: DateTime<Utc>,
    ) -> Option<SessionPlayer> {
        let player = self.players.remove(player_id)?;
        if kind == RemovalKind::Disconnect && self.players.len() == 1 {
            self.departure = Some(Departure {
                player: player.clone(),
                grace_until,
            });
        }
        Some(player)
    }

    /// Put a disconnected player back into their seat.
    pub(crate) fn restore(&mut self, player_id: &str, now: DateTime<Utc>) -> bool {
        match &self.departure {
            Some(d) if d.player.id == player_id && now < d.grace_until => {}
            _ => return false,
        }
        let Some(departure) = self.departure.take() else {
            return false;
        };
        self.players
            .insert(departure.player.id.clone(), departure.player);
        true
    }

    /// A seat was vacated by a disconnect and the grace period has run out.
    pub fn grace_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.departure
            .as_ref()
            .is_some_and(|d| now >= d.grace_until)
    }

    pub fn is_older_than(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > max_age
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            players: self.players().cloned().collect(),
            current_player: self.current_player.clone(),
            status: self.status,
            winner: self.winner.clone(),
            difficulty: self.difficulty,
            board: self.board.clone(),
            created_at: self.created_at,
        }
    }
}

/// What happened to a session when a player was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub session_id: SessionId,
    pub player: SessionPlayer,
    /// Players still seated
    pub remaining: Vec<PlayerId>,
    /// Session deleted right away
    pub closed: bool,
    /// Deletion deferred until this instant unless the seat is refilled
    pub grace_until: Option<DateTime<Utc>>,
}

/// Session registry - owns every live session.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    /// Player ID to session ID
    player_index: HashMap<PlayerId, SessionId>,
    grace: Duration,
    max_age: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(
            Duration::seconds(DEFAULT_DISCONNECT_GRACE_SECS),
            Duration::seconds(DEFAULT_SESSION_MAX_AGE_SECS),
        )
    }
}

impl SessionRegistry {
    pub fn new(grace: Duration, max_age: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            player_index: HashMap::new(),
            grace,
            max_age,
        }
    }

    /// Create a session for a freshly paired couple of players.
    pub fn create(
        &mut self,
        first: (PlayerId, String),
        second: (PlayerId, String),
        difficulty: Difficulty,
        board: BoardDescriptor,
        now: DateTime<Utc>,
    ) -> Result<&Session, SessionError> {
        for player_id in [&first.0, &second.0] {
            if self.player_index.contains_key(player_id) {
                return Err(SessionError::AlreadyInSession(player_id.clone()));
            }
        }

        let id = format!("game-{}", uuid::Uuid::new_v4().simple());
        let session = Session::new(id.clone(), first, second, difficulty, board, now)?;

        for player_id in session.player_ids() {
            self.player_index.insert(player_id.to_string(), id.clone());
        }
        info!(session_id = %id, %difficulty, "session created");

        Ok(self.sessions.entry(id).or_insert(session))
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    pub fn session_id_for(&self, player_id: &str) -> Option<&str> {
        self.player_index.get(player_id).map(String::as_str)
    }

    pub fn get_for_player(&self, player_id: &str) -> Option<&Session> {
        self.player_index
            .get(player_id)
            .and_then(|id| self.sessions.get(id))
    }

    pub fn get_for_player_mut(&mut self, player_id: &str) -> Option<&mut Session> {
        let id = self.player_index.get(player_id)?;
        self.sessions.get_mut(id)
    }

    /// Reset a session. Unknown ids are ignored.
    pub fn reset(&mut self, session_id: &str) -> Option<&Session> {
        let session = self.sessions.get_mut(session_id)?;
        session.reset();
        Some(session)
    }

    /// Unseat a player and tear the session down when appropriate.
    ///
    /// An empty session is deleted immediately. A session left with one
    /// player is deleted immediately after a leave, but only once the grace
    /// period expires after a disconnect.
    pub fn remove_player(
        &mut self,
        session_id: &str,
        player_id: &str,
        kind: RemovalKind,
        now: DateTime<Utc>,
    ) -> Option<Removal> {
        let grace_until = now + self.grace;
        let session = self.sessions.get_mut(session_id)?;
        let player = session.remove_player(player_id, kind, grace_until)?;
        self.player_index.remove(player_id);

        let remaining: Vec<PlayerId> = session.player_ids().map(str::to_string).collect();
        let closed = remaining.is_empty() || kind == RemovalKind::Leave;
        let grace_until = session.departure().map(|d| d.grace_until);

        if closed {
            self.remove(session_id);
        }

        Some(Removal {
            session_id: session_id.to_string(),
            player,
            remaining,
            closed,
            grace_until: grace_until.filter(|_| !closed),
        })
    }

    /// Session holding a seat open for a disconnected player.
    pub fn departed_session_for(&self, player_id: &str) -> Option<&str> {
        self.sessions
            .values()
            .find(|s| s.departure().is_some_and(|d| d.player.id == player_id))
            .map(|s| s.id.as_str())
    }

    /// Refill a seat vacated by a disconnect, if still within grace.
    pub fn restore_player(&mut self, player_id: &str, now: DateTime<Utc>) -> Option<&Session> {
        let session_id = self.departed_session_for(player_id)?.to_string();

        let session = self.sessions.get_mut(&session_id)?;
        if !session.restore(player_id, now) {
            return None;
        }
        self.player_index
            .insert(player_id.to_string(), session_id.clone());
        debug!(session_id = %session_id, player_id, "seat restored");

        self.sessions.get(&session_id)
    }

    /// Delete sessions whose disconnect grace has run out.
    pub fn expire_grace(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.grace_elapsed(now))
            .map(|s| s.id.clone())
            .collect();

        expired.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Delete every session older than the maximum age, whatever its state.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<Session> {
        let max_age = self.max_age;
        let expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_older_than(max_age, now))
            .map(|s| s.id.clone())
            .collect();

        expired.iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Remove a session.
    pub fn remove(&mut self, session_id: &str) -> Option<Session> {
        let session = self.sessions.remove(session_id)?;

        for player_id in session.player_ids() {
            self.player_index.remove(player_id);
        }
        info!(session_id, "session removed");

        Some(session)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
