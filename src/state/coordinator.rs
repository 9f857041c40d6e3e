//! Event handling for the whole process.
//!
//! `Coordinator` owns the queue, the registry and the board supply. The
//! transport calls one method per client event; every resulting
//! notification lands in the outbox, which the host drains and delivers.
//!
//! Events are handled one at a time. Hosts on a multi-threaded runtime share
//! a single coordinator behind a lock (`SharedCoordinator`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use super::board::{BoardDescriptor, Difficulty};
use super::matchmaking::{EnqueueOutcome, MatchmakingQueue, PendingMatch};
use super::message::{Outbound, ServerMessage};
use super::resolver::{resolve_move, MoveError, MoveOutcome, MAX_DIE, MIN_DIE};
use super::session::{RemovalKind, SessionRegistry};
use super::supply::{BoardGenerator, BoardPresets, BoardSupply, GenerationError};
use super::{PlayerId, SessionId};
use crate::config::CoordinatorConfig;

/// A coordinator behind one global lock.
pub type SharedCoordinator = Arc<Mutex<Coordinator>>;

/// Result of a maintenance pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupResult {
    /// Sessions closed because a disconnected seat was never refilled
    pub grace_expired: Vec<SessionId>,
    /// Sessions closed for exceeding the maximum age
    pub aged_out: Vec<SessionId>,
    /// Players still seated in the closed sessions
    pub unseated: Vec<PlayerId>,
}

impl CleanupResult {
    pub fn is_empty(&self) -> bool {
        self.grace_expired.is_empty() && self.aged_out.is_empty()
    }
}

#[derive(Debug)]
pub struct Coordinator {
    config: CoordinatorConfig,
    queue: MatchmakingQueue,
    sessions: SessionRegistry,
    boards: BoardSupply,
    dice: StdRng,
    /// Paired players waiting on a board, by ticket
    pending: HashMap<PlayerId, u64>,
    outbox: Vec<Outbound>,
    last_sweep: DateTime<Utc>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(CoordinatorConfig::default())
    }
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self::with_presets(config, BoardPresets::builtin())
    }

    pub fn with_presets(config: CoordinatorConfig, presets: BoardPresets) -> Self {
        let dice = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut boards = BoardSupply::new(
            presets,
            config.seed.map(|s| s.wrapping_add(1)),
            config.feature_count_tolerance,
        );
        if !config.algorithmic_fallback {
            boards = boards.without_algorithmic();
        }

        Self {
            queue: MatchmakingQueue::new(),
            sessions: SessionRegistry::new(config.disconnect_grace(), config.session_max_age()),
            boards,
            dice,
            pending: HashMap::new(),
            outbox: Vec::new(),
            last_sweep: Utc::now(),
            config,
        }
    }

    pub fn into_shared(self) -> SharedCoordinator {
        Arc::new(Mutex::new(self))
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn queue(&self) -> &MatchmakingQueue {
        &self.queue
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Take every queued notification.
    pub fn drain_outbound(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    // Matchmaking

    /// Queue a player. Returns the pairing when an opponent was waiting; the
    /// host then fetches a board and calls `start_match`.
    pub fn join(
        &mut self,
        player_id: &str,
        name: &str,
        difficulty: Difficulty,
    ) -> Option<PendingMatch> {
        self.join_at(player_id, name, difficulty, Utc::now())
    }

    pub fn join_at(
        &mut self,
        player_id: &str,
        name: &str,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Option<PendingMatch> {
        self.reconcile_stale(player_id, now);

        match self
            .queue
            .enqueue_at(player_id.to_string(), name.to_string(), difficulty, now)
        {
            EnqueueOutcome::Waiting { queue_len } => {
                debug!(player_id, queue_len, "player waiting for opponent");
                self.outbox
                    .push(Outbound::new(player_id, ServerMessage::Waiting));
                None
            }
            EnqueueOutcome::Paired(pending) => {
                info!(
                    first = %pending.first.player_id,
                    second = %pending.second.player_id,
                    difficulty = %pending.difficulty,
                    "players paired"
                );
                for id in pending.player_ids() {
                    self.pending.insert(id.to_string(), pending.ticket);
                }
                Some(pending)
            }
        }
    }

    /// Create the session for a pairing once the external generator answered.
    ///
    /// Returns `None` if either player left, disconnected or re-joined while
    /// the board was being generated.
    pub fn start_match(
        &mut self,
        pending: PendingMatch,
        generated: Result<BoardDescriptor, GenerationError>,
    ) -> Option<SessionId> {
        self.start_match_at(pending, generated, Utc::now())
    }

    pub fn start_match_at(
        &mut self,
        pending: PendingMatch,
        generated: Result<BoardDescriptor, GenerationError>,
        now: DateTime<Utc>,
    ) -> Option<SessionId> {
        let live = pending
            .player_ids()
            .iter()
            .all(|id| self.pending.get(*id) == Some(&pending.ticket));
        if !live {
            debug!(ticket = pending.ticket, "pairing abandoned before start");
            return None;
        }
        for id in pending.player_ids() {
            self.pending.remove(id);
        }

        let acquired = self.boards.settle(pending.difficulty, generated);
        let PendingMatch {
            first,
            second,
            difficulty,
            ..
        } = pending;

        let session = match self.sessions.create(
            (first.player_id, first.name),
            (second.player_id, second.name),
            difficulty,
            acquired.board,
            now,
        ) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "could not create session");
                return None;
            }
        };

        debug!(session_id = %session.id, source = acquired.source.as_str(), "board attached");
        let started: Vec<Outbound> = session
            .player_ids()
            .map(|id| Outbound::new(id, ServerMessage::started(session, id)))
            .collect();
        let session_id = session.id.clone();
        self.outbox.extend(started);

        Some(session_id)
    }

    /// `join` followed by `start_match`, calling the generator inline.
    pub fn join_with<G>(
        &mut self,
        generator: &mut G,
        player_id: &str,
        name: &str,
        difficulty: Difficulty,
    ) -> Option<SessionId>
    where
        G: BoardGenerator + ?Sized,
    {
        let pending = self.join(player_id, name, difficulty)?;
        let generated = generator.generate(pending.difficulty);
        self.start_match(pending, generated)
    }

    // Gameplay

    /// Roll the die for `player_id`.
    pub fn roll(&mut self, player_id: &str) -> Option<MoveOutcome> {
        let die = self.dice.gen_range(MIN_DIE..=MAX_DIE);
        self.apply_roll(player_id, die)
    }

    /// Apply an already rolled die for `player_id`.
    pub fn apply_roll(&mut self, player_id: &str, die: u8) -> Option<MoveOutcome> {
        let Some(session) = self.sessions.get_for_player_mut(player_id) else {
            debug!(player_id, "roll without a session ignored");
            return None;
        };

        match resolve_move(session, player_id, die) {
            Ok(outcome) => {
                if outcome.won {
                    info!(session_id = %session.id, player_id, "game won");
                }
                let message = ServerMessage::updated(session, outcome.clone());
                let recipients: Vec<PlayerId> =
                    session.player_ids().map(str::to_string).collect();
                self.broadcast(recipients, message);
                Some(outcome)
            }
            Err(MoveError::NotYourTurn | MoveError::GameFinished) => {
                self.outbox
                    .push(Outbound::new(player_id, ServerMessage::NotYourTurn));
                None
            }
            Err(err) => {
                warn!(session_id = %session.id, player_id, error = %err, "roll ignored");
                None
            }
        }
    }

    /// Reset the requester's session.
    pub fn reset(&mut self, player_id: &str) {
        let Some(session_id) = self.sessions.session_id_for(player_id).map(str::to_string) else {
            debug!(player_id, "reset without a session ignored");
            return;
        };
        let Some(session) = self.sessions.reset(&session_id) else {
            return;
        };

        let message = ServerMessage::reset(session);
        let recipients: Vec<PlayerId> = session.player_ids().map(str::to_string).collect();
        self.broadcast(recipients, message);
    }

    // Departures

    /// Voluntary leave. Never waits for a grace period.
    pub fn leave(&mut self, player_id: &str) {
        self.leave_at(player_id, Utc::now())
    }

    pub fn leave_at(&mut self, player_id: &str, now: DateTime<Utc>) {
        self.depart(player_id, RemovalKind::Leave, now);
    }

    /// Dropped connection. A half-empty session survives for the grace period.
    pub fn disconnected(&mut self, player_id: &str) {
        self.disconnected_at(player_id, Utc::now())
    }

    pub fn disconnected_at(&mut self, player_id: &str, now: DateTime<Utc>) {
        self.depart(player_id, RemovalKind::Disconnect, now);
    }

    /// A disconnected player came back within the grace period.
    ///
    /// Both seat holders get a fresh `game-started`, the peer having been
    /// told `player-left` when the connection dropped.
    pub fn reconnected(&mut self, player_id: &str) -> bool {
        self.reconnected_at(player_id, Utc::now())
    }

    pub fn reconnected_at(&mut self, player_id: &str, now: DateTime<Utc>) -> bool {
        let Some(session) = self.sessions.restore_player(player_id, now) else {
            return false;
        };
        let started: Vec<Outbound> = session
            .player_ids()
            .map(|id| Outbound::new(id, ServerMessage::started(session, id)))
            .collect();
        self.outbox.extend(started);
        true
    }

    fn depart(&mut self, player_id: &str, kind: RemovalKind, now: DateTime<Utc>) {
        self.queue.remove(player_id);
        self.abandon_pending(player_id);

        let Some(session_id) = self.sessions.session_id_for(player_id).map(str::to_string) else {
            return;
        };
        let Some(removal) = self.sessions.remove_player(&session_id, player_id, kind, now) else {
            return;
        };
        info!(
            session_id = %removal.session_id,
            player_id,
            closed = removal.closed,
            ?kind,
            "player left session"
        );

        for recipient in removal.remaining {
            self.outbox.push(Outbound::new(
                recipient,
                ServerMessage::PlayerLeft {
                    player_id: player_id.to_string(),
                },
            ));
        }
    }

    /// Drop a pairing that has not become a session yet.
    fn abandon_pending(&mut self, player_id: &str) {
        let Some(ticket) = self.pending.remove(player_id) else {
            return;
        };
        let partner = self
            .pending
            .iter()
            .find(|(_, t)| **t == ticket)
            .map(|(id, _)| id.clone());

        if let Some(partner) = partner {
            self.pending.remove(&partner);
            self.outbox.push(Outbound::new(
                partner,
                ServerMessage::PlayerLeft {
                    player_id: player_id.to_string(),
                },
            ));
        }
    }

    /// A re-joining player gives up whatever they were in before.
    fn reconcile_stale(&mut self, player_id: &str, now: DateTime<Utc>) {
        self.depart(player_id, RemovalKind::Leave, now);

        if let Some(session_id) = self
            .sessions
            .departed_session_for(player_id)
            .map(str::to_string)
        {
            debug!(%session_id, player_id, "held seat abandoned by re-join");
            self.sessions.remove(&session_id);
        }
    }

    fn broadcast(&mut self, recipients: Vec<PlayerId>, message: ServerMessage) {
        for recipient in recipients {
            self.outbox.push(Outbound::new(recipient, message.clone()));
        }
    }

    // Maintenance

    /// Close sessions whose grace ran out and, once per sweep interval,
    /// sessions past their maximum age.
    pub fn cleanup(&mut self) -> CleanupResult {
        self.cleanup_at(Utc::now())
    }

    pub fn cleanup_at(&mut self, now: DateTime<Utc>) -> CleanupResult {
        let mut result = CleanupResult::default();

        for session in self.sessions.expire_grace(now) {
            result
                .unseated
                .extend(session.player_ids().map(str::to_string));
            result.grace_expired.push(session.id);
        }

        if now - self.last_sweep >= self.config.sweep_interval() {
            self.last_sweep = now;
            for session in self.sessions.sweep_expired(now) {
                result
                    .unseated
                    .extend(session.player_ids().map(str::to_string));
                result.aged_out.push(session.id);
            }
        }

        if !result.is_empty() {
            info!(
                grace_expired = result.grace_expired.len(),
                aged_out = result.aged_out.len(),
                unseated = result.unseated.len(),
                "cleanup closed sessions"
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::session::SessionStatus;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn make_coordinator() -> Coordinator {
        Coordinator::new(CoordinatorConfig::default().with_seed(11))
    }

    fn classic() -> Result<BoardDescriptor, GenerationError> {
        Ok(BoardDescriptor::classic())
    }

    /// Pair `a` and `b` and return the new session id, with the outbox drained.
    fn start(coord: &mut Coordinator, a: &str, b: &str) -> SessionId {
        assert!(coord.join(a, a, Difficulty::Medium).is_none());
        let pending = coord.join(b, b, Difficulty::Medium).unwrap();
        let id = coord.start_match(pending, Err(GenerationError::TimedOut)).unwrap();
        coord.drain_outbound();
        id
    }

    fn messages_for(outbound: &[Outbound], recipient: &str) -> Vec<&'static str> {
        outbound
            .iter()
            .filter(|o| o.recipient == recipient)
            .map(|o| o.message.as_str())
            .collect()
    }

    #[test]
    fn test_join_waits_then_pairs() {
        let mut coord = make_coordinator();

        assert!(coord.join("a", "Alice", Difficulty::Medium).is_none());
        assert_eq!(
            coord.drain_outbound(),
            vec![Outbound::new("a", ServerMessage::Waiting)]
        );

        let pending = coord.join("b", "Bob", Difficulty::Hard).unwrap();
        assert_eq!(pending.difficulty, Difficulty::Medium);

        let session_id = coord.start_match(pending, classic()).unwrap();
        let out = coord.drain_outbound();
        assert_eq!(messages_for(&out, "a"), vec!["game-started"]);
        assert_eq!(messages_for(&out, "b"), vec!["game-started"]);

        let session = coord.sessions().get(&session_id).unwrap();
        assert_eq!(session.current_player(), "a");
        assert_eq!(session.board(), &BoardDescriptor::classic());
    }

    #[test]
    fn test_invalid_generated_board_never_attached() {
        let mut coord = make_coordinator();
        coord.join("a", "Alice", Difficulty::Medium);
        let pending = coord.join("b", "Bob", Difficulty::Medium).unwrap();

        let broken: BoardDescriptor =
            serde_json::from_value(serde_json::json!({"snake": {"10": 50}, "ladder": {}}))
                .unwrap();
        let id = coord.start_match(pending, Ok(broken.clone())).unwrap();

        let board = coord.sessions().get(&id).unwrap().board();
        assert_ne!(board, &broken);
        assert!(board.validate().is_ok());
    }

    #[test]
    fn test_roll_out_of_turn_rejected() {
        let mut coord = make_coordinator();
        start(&mut coord, "a", "b");

        assert!(coord.apply_roll("b", 3).is_none());
        assert_eq!(
            coord.drain_outbound(),
            vec![Outbound::new("b", ServerMessage::NotYourTurn)]
        );
    }

    #[test]
    fn test_roll_broadcasts_update() {
        let mut coord = make_coordinator();
        start(&mut coord, "a", "b");

        let outcome = coord.roll("a").unwrap();
        assert!((1..=6).contains(&outcome.die_value));

        let out = coord.drain_outbound();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].message, out[1].message);
        assert_eq!(out[0].message.as_str(), "game-updated");
    }

    #[test]
    fn test_roll_without_session_ignored() {
        let mut coord = make_coordinator();
        assert!(coord.roll("nobody").is_none());
        assert!(coord.drain_outbound().is_empty());
    }

    #[test]
    fn test_reset_broadcasts() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");
        coord.apply_roll("a", 2);
        coord.drain_outbound();

        coord.reset("b");

        let out = coord.drain_outbound();
        assert_eq!(messages_for(&out, "a"), vec!["game-reset"]);
        assert_eq!(messages_for(&out, "b"), vec!["game-reset"]);
        let session = coord.sessions().get(&id).unwrap();
        assert_eq!(session.status(), SessionStatus::Playing);
        assert_eq!(session.current_player(), "a");
        assert!(session.players().all(|p| p.position == 0));
    }

    #[test]
    fn test_leave_notifies_peer_and_closes() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");

        coord.leave("a");

        assert_eq!(
            coord.drain_outbound(),
            vec![Outbound::new(
                "b",
                ServerMessage::PlayerLeft {
                    player_id: "a".to_string()
                }
            )]
        );
        assert!(coord.sessions().get(&id).is_none());
    }

    #[test]
    fn test_disconnect_grace_and_cleanup() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");
        let now = Utc::now();

        coord.disconnected_at("a", now);
        assert_eq!(messages_for(&coord.drain_outbound(), "b"), vec!["player-left"]);
        assert!(coord.sessions().get(&id).is_some());

        assert!(coord.cleanup_at(now + Duration::seconds(1)).is_empty());
        let result = coord.cleanup_at(now + Duration::seconds(5));
        assert_eq!(result.grace_expired, vec![id.clone()]);
        assert_eq!(result.unseated, vec!["b".to_string()]);
        assert!(coord.sessions().get(&id).is_none());
    }

    #[test]
    fn test_reconnect_within_grace() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");
        let now = Utc::now();

        coord.disconnected_at("a", now);
        coord.drain_outbound();
        assert!(coord.reconnected_at("a", now + Duration::seconds(3)));
        assert_eq!(messages_for(&coord.drain_outbound(), "a"), vec!["game-started"]);

        assert!(coord.cleanup_at(now + Duration::seconds(10)).grace_expired.is_empty());
        assert_eq!(coord.sessions().get(&id).unwrap().player_count(), 2);
    }

    #[test]
    fn test_reconnect_notifies_peer() {
        let mut coord = make_coordinator();
        start(&mut coord, "a", "b");
        let now = Utc::now();
        let moved = coord.apply_roll("a", 3).unwrap();
        coord.disconnected_at("b", now);
        assert_eq!(messages_for(&coord.drain_outbound(), "a"), vec!["player-left"]);

        assert!(coord.reconnected_at("b", now + Duration::seconds(2)));

        let out = coord.drain_outbound();
        assert_eq!(messages_for(&out, "a"), vec!["game-started"]);
        assert_eq!(messages_for(&out, "b"), vec!["game-started"]);

        let for_a = out.iter().find(|o| o.recipient == "a").unwrap();
        let json = for_a.message.to_json();
        assert_eq!(json["yourPlayerId"], "a");
        assert_eq!(json["session"]["currentPlayer"], "b");
        assert_eq!(json["session"]["players"][0]["position"], moved.to);
    }

    #[test]
    fn test_rejoin_leaves_old_session() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");

        coord.join("a", "Alice", Difficulty::Easy);

        let out = coord.drain_outbound();
        assert_eq!(messages_for(&out, "b"), vec!["player-left"]);
        assert_eq!(messages_for(&out, "a"), vec!["waiting"]);
        assert!(coord.sessions().get(&id).is_none());
        assert!(coord.queue().contains("a"));
    }

    #[test]
    fn test_pending_match_abandoned_on_leave() {
        let mut coord = make_coordinator();
        coord.join("a", "Alice", Difficulty::Easy);
        let pending = coord.join("b", "Bob", Difficulty::Easy).unwrap();
        coord.drain_outbound();

        coord.disconnected("b");
        assert_eq!(messages_for(&coord.drain_outbound(), "a"), vec!["player-left"]);

        assert!(coord.start_match(pending, classic()).is_none());
        assert!(coord.sessions().is_empty());
    }

    #[test]
    fn test_age_sweep_runs_on_interval() {
        let mut coord = make_coordinator();
        let id = start(&mut coord, "a", "b");
        let later = Utc::now() + Duration::hours(25);

        let result = coord.cleanup_at(later);
        assert_eq!(result.aged_out, vec![id]);
        assert_eq!(result.unseated, vec!["a".to_string(), "b".to_string()]);

        // The next sweep is an hour away
        let id = start(&mut coord, "c", "d");
        let result = coord.cleanup_at(later + Duration::minutes(10));
        assert!(result.aged_out.is_empty());
        assert!(coord.sessions().get(&id).is_some());
    }

    #[test]
    fn test_coordinator_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Coordinator>();

        let shared = make_coordinator().into_shared();
        shared.lock().unwrap().join("a", "Alice", Difficulty::Easy);
        assert!(shared.lock().unwrap().queue().contains("a"));
    }
}
