//! Move resolution.
//!
//! Applies one die roll to a session: bounce off the final square, follow a
//! snake or ladder, knock an opponent back to square one, then decide
//! between a win, an extra turn, or passing the turn.

use serde::Serialize;

use super::board::{BoardFeature, FINAL_SQUARE, FIRST_SQUARE, START_SQUARE};
use super::session::Session;
use super::PlayerId;

pub const MIN_DIE: u8 = 1;
pub const MAX_DIE: u8 = 6;

/// Result of a single move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    pub player_id: PlayerId,
    pub die_value: u8,
    pub from: u8,
    /// Square reached by the die alone, after bouncing
    pub landed: u8,
    /// Square after any snake or ladder
    pub to: u8,
    pub feature: Option<BoardFeature>,
    pub extra_turn: bool,
    pub displaced_player_ids: Vec<PlayerId>,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("it's not your turn")]
    NotYourTurn,

    #[error("game is already over")]
    GameFinished,

    #[error("die value {0} out of range")]
    InvalidDie(u8),

    #[error("opponent is not seated")]
    OpponentMissing,
}

/// Square reached from `position` with `die`, reflecting any overshoot of
/// the final square back toward it.
///
/// Meaningful for `position <= 100` and a die of 1 to 6. Other inputs never
/// panic; the result saturates to `0..=100`.
pub fn bounce(position: u8, die: u8) -> u8 {
    let last = u16::from(FINAL_SQUARE);
    let target = u16::from(position) + u16::from(die);
    let square = if target > last {
        (2 * last).saturating_sub(target)
    } else {
        target
    };
    square.min(last) as u8
}

/// Apply `die` for `player_id`. Nothing is mutated on error.
pub fn resolve_move(
    session: &mut Session,
    player_id: &str,
    die: u8,
) -> Result<MoveOutcome, MoveError> {
    if !(MIN_DIE..=MAX_DIE).contains(&die) {
        return Err(MoveError::InvalidDie(die));
    }
    if !session.status().is_playing() {
        return Err(MoveError::GameFinished);
    }
    if session.current_player() != player_id {
        return Err(MoveError::NotYourTurn);
    }

    let from = session
        .get_player(player_id)
        .map(|p| p.position)
        .ok_or(MoveError::NotYourTurn)?;
    let opponent = session
        .opponent_of(player_id)
        .map(|p| (p.id.clone(), p.position))
        .ok_or(MoveError::OpponentMissing)?;

    let landed = bounce(from, die);
    let feature = session.board().feature_at(landed);
    let to = feature.map_or(landed, |f| f.to);

    let mut displaced_player_ids = Vec::new();
    let (opponent_id, opponent_position) = opponent;
    if opponent_position == to && to != START_SQUARE {
        if let Some(other) = session.get_player_mut(&opponent_id) {
            other.position = FIRST_SQUARE;
        }
        displaced_player_ids.push(opponent_id.clone());
    }

    if let Some(player) = session.get_player_mut(player_id) {
        player.position = to;
    }

    let won = to == FINAL_SQUARE;
    let extra_turn = !won && die == MAX_DIE;
    if won {
        session.declare_winner(player_id.to_string());
    } else if !extra_turn {
        session.set_current_player(opponent_id);
    }

    Ok(MoveOutcome {
        player_id: player_id.to_string(),
        die_value: die,
        from,
        landed,
        to,
        feature,
        extra_turn,
        displaced_player_ids,
        won,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::board::{BoardDescriptor, Difficulty, FeatureKind};
    use crate::state::session::SessionStatus;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn make_session(board: BoardDescriptor) -> Session {
        Session::new(
            "game-1".to_string(),
            ("a".to_string(), "Alice".to_string()),
            ("b".to_string(), "Bob".to_string()),
            Difficulty::Medium,
            board,
            Utc::now(),
        )
        .unwrap()
    }

    fn empty_board() -> BoardDescriptor {
        BoardDescriptor::from_pairs(&[], &[]).unwrap()
    }

    fn place(session: &mut Session, player_id: &str, position: u8) {
        session.get_player_mut(player_id).unwrap().position = position;
    }

    fn position(session: &Session, player_id: &str) -> u8 {
        session.get_player(player_id).unwrap().position
    }

    #[test]
    fn test_bounce_invariant() {
        for p in 0..=FINAL_SQUARE {
            for d in MIN_DIE..=MAX_DIE {
                let target = bounce(p, d);
                if u16::from(p) + u16::from(d) > 100 {
                    assert_eq!(u16::from(target), 200 - u16::from(p) - u16::from(d));
                    assert!((94..=100).contains(&target), "{} + {} -> {}", p, d, target);
                } else {
                    assert_eq!(target, p + d);
                }
            }
        }
    }

    #[test]
    fn test_bounce_out_of_domain_stays_on_board() {
        assert_eq!(bounce(200, 60), 0);
        assert_eq!(bounce(101, 100), 0);
        assert_eq!(bounce(u8::MAX, u8::MAX), 0);
        for p in [0, 50, 100, 150, u8::MAX] {
            for d in [0, 7, 100, u8::MAX] {
                assert!(bounce(p, d) <= FINAL_SQUARE);
            }
        }
    }

    #[test]
    fn test_plain_move_passes_turn() {
        let mut session = make_session(empty_board());

        let outcome = resolve_move(&mut session, "a", 3).unwrap();

        assert_eq!(outcome.from, 0);
        assert_eq!(outcome.to, 3);
        assert!(!outcome.extra_turn);
        assert_eq!(position(&session, "a"), 3);
        assert_eq!(session.current_player(), "b");
    }

    #[test]
    fn test_six_grants_extra_turn() {
        let mut session = make_session(empty_board());

        let outcome = resolve_move(&mut session, "a", 6).unwrap();

        assert!(outcome.extra_turn);
        assert_eq!(session.current_player(), "a");
    }

    #[test]
    fn test_wrong_player_rejected_without_mutation() {
        let mut session = make_session(empty_board());
        let before = session.snapshot();

        assert_eq!(resolve_move(&mut session, "b", 4), Err(MoveError::NotYourTurn));
        assert_eq!(
            resolve_move(&mut session, "stranger", 4),
            Err(MoveError::NotYourTurn)
        );
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_invalid_die_rejected() {
        let mut session = make_session(empty_board());
        assert_eq!(resolve_move(&mut session, "a", 0), Err(MoveError::InvalidDie(0)));
        assert_eq!(resolve_move(&mut session, "a", 7), Err(MoveError::InvalidDie(7)));
    }

    #[test]
    fn test_ladder_and_snake() {
        let board = BoardDescriptor::from_pairs(&[(30, 8)], &[(4, 25)]).unwrap();
        let mut session = make_session(board);

        let up = resolve_move(&mut session, "a", 4).unwrap();
        assert_eq!(up.landed, 4);
        assert_eq!(up.to, 25);
        assert_eq!(up.feature.map(|f| f.kind), Some(FeatureKind::Ladder));

        place(&mut session, "b", 27);
        let down = resolve_move(&mut session, "b", 3).unwrap();
        assert_eq!(down.to, 8);
        assert_eq!(down.feature.map(|f| f.kind), Some(FeatureKind::Snake));
    }

    #[test]
    fn test_bounce_onto_snake_keeps_extra_turn() {
        let board = BoardDescriptor::from_pairs(&[(99, 80)], &[]).unwrap();
        let mut session = make_session(board);
        place(&mut session, "a", 95);

        let outcome = resolve_move(&mut session, "a", 6).unwrap();

        assert_eq!(outcome.landed, 99);
        assert_eq!(outcome.to, 80);
        assert!(!outcome.won);
        assert!(outcome.extra_turn);
        assert_eq!(session.current_player(), "a");
        assert_eq!(session.status(), SessionStatus::Playing);
    }

    #[test]
    fn test_collision_sends_opponent_to_one() {
        let mut session = make_session(empty_board());
        place(&mut session, "a", 10);
        place(&mut session, "b", 14);

        let outcome = resolve_move(&mut session, "a", 4).unwrap();

        assert_eq!(outcome.displaced_player_ids, vec!["b".to_string()]);
        assert_eq!(position(&session, "b"), 1);
        assert_eq!(position(&session, "a"), 14);
    }

    #[test]
    fn test_collision_after_ladder() {
        let board = BoardDescriptor::from_pairs(&[], &[(5, 40)]).unwrap();
        let mut session = make_session(board);
        place(&mut session, "b", 40);

        let outcome = resolve_move(&mut session, "a", 5).unwrap();

        assert_eq!(outcome.to, 40);
        assert_eq!(outcome.displaced_player_ids, vec!["b".to_string()]);
        assert_eq!(position(&session, "b"), 1);
    }

    #[test]
    fn test_collision_on_square_one_is_noop_displacement() {
        let mut session = make_session(empty_board());
        place(&mut session, "b", 1);

        let outcome = resolve_move(&mut session, "a", 1).unwrap();

        // Still listed, even though the opponent does not move
        assert_eq!(outcome.displaced_player_ids, vec!["b".to_string()]);
        assert_eq!(position(&session, "b"), 1);
        assert_eq!(position(&session, "a"), 1);
    }

    #[test]
    fn test_win_freezes_turn() {
        let mut session = make_session(empty_board());
        place(&mut session, "a", 94);

        let outcome = resolve_move(&mut session, "a", 6).unwrap();

        assert!(outcome.won);
        assert!(!outcome.extra_turn);
        assert_eq!(session.status(), SessionStatus::Won);
        assert_eq!(session.winner(), Some("a"));
        assert_eq!(session.current_player(), "a");

        // No further moves from either player
        let before = session.snapshot();
        assert_eq!(resolve_move(&mut session, "a", 2), Err(MoveError::GameFinished));
        assert_eq!(resolve_move(&mut session, "b", 2), Err(MoveError::GameFinished));
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_missing_opponent_rejected() {
        let mut session = make_session(empty_board());
        session.remove_player(
            "b",
            crate::state::session::RemovalKind::Disconnect,
            Utc::now(),
        );

        assert_eq!(
            resolve_move(&mut session, "a", 3),
            Err(MoveError::OpponentMissing)
        );
        assert_eq!(position(&session, "a"), 0);
    }
}
