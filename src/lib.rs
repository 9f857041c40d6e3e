//! Ladderline State Library
//!
//! This crate provides state management for two-player snakes and ladders.
//!
//! # Overview
//!
//! The state module provides:
//!
//! - **Matchmaking** - A FIFO queue that pairs waiting players two at a time.
//!
//! - **Sessions** - Active games with seats, turn pointer, status and a board,
//!   plus a registry that handles reset, departures, disconnect grace periods
//!   and age-based expiry.
//!
//! - **Move Resolution** - Dice movement with a bounce off square 100, snakes
//!   and ladders, opponent displacement, extra turns on a six, win detection.
//!
//! - **Board Supply** - Validation of externally generated layouts with an
//!   algorithmic, preset and classic fallback chain.
//!
//! # Design Principles
//!
//! 1. **One owner** - All mutable state lives in a `Coordinator`; events are
//!    applied one at a time.
//!
//! 2. **Rejections are values** - Out-of-turn rolls and finished games produce
//!    a `NotYourTurn` notice, never a panic or a mutation.
//!
//! 3. **Transport-agnostic** - Events go in as method calls and notifications
//!    come out of an outbox; sockets and board generation belong to the host.
//!
//! 4. **Serialization-ready** - Every notification serializes to JSON.
//!
//! # Example
//!
//! ```rust
//! use ladderline_state::{BoardDescriptor, Coordinator, CoordinatorConfig, Difficulty};
//!
//! let mut coordinator = Coordinator::new(CoordinatorConfig::default().with_seed(7));
//!
//! // First player waits
//! assert!(coordinator.join("conn-1", "Alice", Difficulty::Easy).is_none());
//!
//! // Second player pairs; the host fetches a board and starts the match
//! let pending = coordinator.join("conn-2", "Bob", Difficulty::Hard).unwrap();
//! assert_eq!(pending.difficulty, Difficulty::Easy);
//! let session_id = coordinator
//!     .start_match(pending, Ok(BoardDescriptor::classic()))
//!     .unwrap();
//!
//! // Alice moves first
//! coordinator.apply_roll("conn-1", 3).unwrap();
//! let session = coordinator.sessions().get(&session_id).unwrap();
//! assert_eq!(session.current_player(), "conn-2");
//!
//! for outbound in coordinator.drain_outbound() {
//!     let _payload = outbound.message.to_json();
//! }
//! ```

pub mod config;
pub mod state;

pub use config::{ConfigError, CoordinatorConfig};

// Re-export everything from state module at crate root
pub use state::*;
