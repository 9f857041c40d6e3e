//! Matchmaking queue.
//!
//! Players wait here until an opponent shows up. Pairing is strictly FIFO
//! and happens the moment a second entry lands in the queue.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use super::board::Difficulty;
use super::PlayerId;

/// A player waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub player_id: PlayerId,

    /// Display name
    pub name: String,

    /// Board difficulty this player asked for
    pub difficulty: Difficulty,

    pub joined_at: DateTime<Utc>,
}

/// Two players popped off the queue, waiting for a board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMatch {
    /// Identifies this pairing until its session is created
    pub ticket: u64,

    /// Longest-waiting player; moves first
    pub first: QueueEntry,

    pub second: QueueEntry,

    /// Always the first player's preference
    pub difficulty: Difficulty,
}

impl PendingMatch {
    pub fn player_ids(&self) -> [&str; 2] {
        [&self.first.player_id, &self.second.player_id]
    }

    pub fn involves(&self, player_id: &str) -> bool {
        self.first.player_id == player_id || self.second.player_id == player_id
    }
}

/// Result of joining the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// No opponent yet
    Waiting { queue_len: usize },

    /// An opponent was found
    Paired(PendingMatch),
}

/// FIFO waiting list.
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    entries: VecDeque<QueueEntry>,
    next_ticket: u64,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a player, replacing any entry they already had.
    pub fn enqueue(
        &mut self,
        player_id: PlayerId,
        name: String,
        difficulty: Difficulty,
    ) -> EnqueueOutcome {
        self.enqueue_at(player_id, name, difficulty, Utc::now())
    }

    pub fn enqueue_at(
        &mut self,
        player_id: PlayerId,
        name: String,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> EnqueueOutcome {
        self.remove(&player_id);
        self.entries.push_back(QueueEntry {
            player_id,
            name,
            difficulty,
            joined_at: now,
        });

        match self.dequeue_pair() {
            Some(pending) => EnqueueOutcome::Paired(pending),
            None => EnqueueOutcome::Waiting {
                queue_len: self.entries.len(),
            },
        }
    }

    /// Pop the two oldest entries, if there are two.
    pub fn dequeue_pair(&mut self) -> Option<PendingMatch> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.pop_front()?;
        let second = self.entries.pop_front()?;

        self.next_ticket += 1;
        Some(PendingMatch {
            ticket: self.next_ticket,
            difficulty: first.difficulty,
            first,
            second,
        })
    }

    /// Remove a player's entry. No-op if they are not queued.
    pub fn remove(&mut self, player_id: &str) -> Option<QueueEntry> {
        let index = self.position_of(player_id)?;
        self.entries.remove(index)
    }

    /// Zero-based place in line.
    pub fn position_of(&self, player_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.player_id == player_id)
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.position_of(player_id).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
