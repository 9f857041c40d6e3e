//! State management module for Ladderline.
//!
//! This module provides the core state types and managers:
//!
//! - `board` - Snake/ladder layouts and their validation
//! - `supply` - Board acquisition with fallbacks
//! - `matchmaking` - FIFO pairing of waiting players
//! - `session` - Active sessions and the session registry
//! - `resolver` - Dice movement and turn rules
//! - `message` - Notifications for the transport layer
//! - `coordinator` - Event handling on top of all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                            Coordinator                               │
//! │                                                                      │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐   │
//! │  │ MatchmakingQueue │  │ SessionRegistry  │  │   BoardSupply    │   │
//! │  │                  │  │                  │  │                  │   │
//! │  │ FIFO entries     │  │ session_id →     │  │ generator ─▶     │   │
//! │  │   ──▶ Pending    │  │   Session        │  │  algorithmic ─▶  │   │
//! │  │       Match      │  │ player_id →      │  │  preset ─▶       │   │
//! │  │                  │  │   session_id     │  │  classic         │   │
//! │  └──────────────────┘  └────────┬─────────┘  └──────────────────┘   │
//! │                                 │ resolve_move                       │
//! │                                 ▼                                    │
//! │                        outbox: Vec<Outbound>                         │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use ladderline_state::state::{Coordinator, Difficulty};
//!
//! let mut coordinator = Coordinator::default();
//!
//! coordinator.join("conn-1", "Alice", Difficulty::Easy);
//! if let Some(pending) = coordinator.join("conn-2", "Bob", Difficulty::Hard) {
//!     let generated = external_generator(pending.difficulty);
//!     coordinator.start_match(pending, generated);
//! }
//!
//! coordinator.roll("conn-1");
//! for outbound in coordinator.drain_outbound() {
//!     transport.send(&outbound.recipient, outbound.message.to_json());
//! }
//! ```

pub mod board;
pub mod coordinator;
pub mod matchmaking;
pub mod message;
pub mod resolver;
pub mod session;
pub mod supply;

/// Opaque connection identifier of a player.
pub type PlayerId = String;

/// Session identifier (`game-<uuid>`).
pub type SessionId = String;

// Re-export commonly used types
pub use board::{
    BoardDescriptor, BoardFeature, BoardValidationError, Difficulty, FeatureKind, FINAL_SQUARE,
    FIRST_SQUARE, START_SQUARE,
};
pub use coordinator::{CleanupResult, Coordinator, SharedCoordinator};
pub use matchmaking::{EnqueueOutcome, MatchmakingQueue, PendingMatch, QueueEntry};
pub use message::{Outbound, ServerMessage};
pub use resolver::{bounce, resolve_move, MoveError, MoveOutcome};
pub use session::{
    RemovalKind, Session, SessionError, SessionPlayer, SessionRegistry, SessionSnapshot,
    SessionStatus,
};
pub use supply::{
    AcquiredBoard, AlgorithmicGenerator, BoardGenerator, BoardPresets, BoardSource, BoardSupply,
    GenerationError,
};
