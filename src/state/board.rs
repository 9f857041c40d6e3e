//! Board descriptors.
//!
//! A board is a pair of immutable mappings: snakes (head → tail) and
//! ladders (bottom → top). Every position used by a feature lies in
//! `2..=99` and no square belongs to more than one feature endpoint.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Square a token starts from (off the board).
pub const START_SQUARE: u8 = 0;

/// Square a displaced token is sent back to.
pub const FIRST_SQUARE: u8 = 1;

/// Winning square.
pub const FINAL_SQUARE: u8 = 100;

/// Board difficulty requested at matchmaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Self::Easy, Self::Medium, Self::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    /// Expected number of snakes and ladders on a board of this difficulty.
    pub fn feature_counts(&self) -> FeatureCounts {
        match self {
            Self::Easy => FeatureCounts {
                snakes: 4,
                ladders: 8,
            },
            Self::Medium => FeatureCounts {
                snakes: 6,
                ladders: 6,
            },
            Self::Hard => FeatureCounts {
                snakes: 10,
                ladders: 4,
            },
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = UnknownDifficulty;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(UnknownDifficulty(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown difficulty {0:?}")]
pub struct UnknownDifficulty(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureCounts {
    pub snakes: usize,
    pub ladders: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Snake,
    Ladder,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Snake => f.write_str("snake"),
            Self::Ladder => f.write_str("ladder"),
        }
    }
}

/// A snake or ladder a token landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardFeature {
    pub kind: FeatureKind,
    pub from: u8,
    pub to: u8,
}

/// Reasons a descriptor is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardValidationError {
    #[error("{kind} {from}->{to} uses square {position}, outside 2..=99")]
    OutOfRange {
        kind: FeatureKind,
        from: u8,
        to: u8,
        position: u8,
    },

    #[error("{kind} {from}->{to} points the wrong way")]
    WrongDirection { kind: FeatureKind, from: u8, to: u8 },

    #[error("square {0} is used by more than one feature")]
    Overlap(u8),

    #[error("expected {expected} {kind}s (±{tolerance}), found {actual}")]
    FeatureCount {
        kind: FeatureKind,
        expected: usize,
        actual: usize,
        tolerance: usize,
    },
}

/// Snake and ladder layout for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    #[serde(rename = "snake")]
    snakes: BTreeMap<u8, u8>,
    #[serde(rename = "ladder")]
    ladders: BTreeMap<u8, u8>,
}

impl BoardDescriptor {
    /// Build a descriptor, rejecting anything that breaks the layout rules.
    pub fn new(
        snakes: BTreeMap<u8, u8>,
        ladders: BTreeMap<u8, u8>,
    ) -> Result<Self, BoardValidationError> {
        let board = Self { snakes, ladders };
        board.validate()?;
        Ok(board)
    }

    pub fn from_pairs(
        snakes: &[(u8, u8)],
        ladders: &[(u8, u8)],
    ) -> Result<Self, BoardValidationError> {
        Self::new(
            snakes.iter().copied().collect(),
            ladders.iter().copied().collect(),
        )
    }

    /// Hardcoded layouts only; covered by the preset tests.
    pub(crate) fn from_static(snakes: &[(u8, u8)], ladders: &[(u8, u8)]) -> Self {
        Self {
            snakes: snakes.iter().copied().collect(),
            ladders: ladders.iter().copied().collect(),
        }
    }

    /// The classic layout, used when nothing better is available.
    pub fn classic() -> Self {
        Self::from_static(
            &[
                (17, 7),
                (54, 34),
                (62, 19),
                (64, 60),
                (87, 36),
                (93, 73),
                (95, 75),
                (98, 79),
            ],
            &[
                (4, 14),
                (9, 31),
                (21, 42),
                (28, 84),
                (51, 67),
                (72, 91),
                (80, 99),
            ],
        )
    }

    /// Check direction, range and overlap rules.
    pub fn validate(&self) -> Result<(), BoardValidationError> {
        let mut used = BTreeSet::new();
        let features = self
            .snakes
            .iter()
            .map(|(&from, &to)| (FeatureKind::Snake, from, to))
            .chain(
                self.ladders
                    .iter()
                    .map(|(&from, &to)| (FeatureKind::Ladder, from, to)),
            );

        for (kind, from, to) in features {
            for position in [from, to] {
                if !(FIRST_SQUARE + 1..FINAL_SQUARE).contains(&position) {
                    return Err(BoardValidationError::OutOfRange {
                        kind,
                        from,
                        to,
                        position,
                    });
                }
            }

            let ok = match kind {
                FeatureKind::Snake => from > to,
                FeatureKind::Ladder => from < to,
            };
            if !ok {
                return Err(BoardValidationError::WrongDirection { kind, from, to });
            }

            for position in [from, to] {
                if !used.insert(position) {
                    return Err(BoardValidationError::Overlap(position));
                }
            }
        }

        Ok(())
    }

    /// Structural validation plus feature counts for `difficulty`.
    pub fn validate_for(
        &self,
        difficulty: Difficulty,
        tolerance: usize,
    ) -> Result<(), BoardValidationError> {
        self.validate()?;

        let expected = difficulty.feature_counts();
        for (kind, expected, actual) in [
            (FeatureKind::Snake, expected.snakes, self.snakes.len()),
            (FeatureKind::Ladder, expected.ladders, self.ladders.len()),
        ] {
            if actual.abs_diff(expected) > tolerance {
                return Err(BoardValidationError::FeatureCount {
                    kind,
                    expected,
                    actual,
                    tolerance,
                });
            }
        }

        Ok(())
    }

    /// Feature starting at `position`. Snakes are checked first.
    pub fn feature_at(&self, position: u8) -> Option<BoardFeature> {
        if let Some(&to) = self.snakes.get(&position) {
            return Some(BoardFeature {
                kind: FeatureKind::Snake,
                from: position,
                to,
            });
        }
        self.ladders.get(&position).map(|&to| BoardFeature {
            kind: FeatureKind::Ladder,
            from: position,
            to,
        })
    }

    pub fn snakes(&self) -> &BTreeMap<u8, u8> {
        &self.snakes
    }

    pub fn ladders(&self) -> &BTreeMap<u8, u8> {
        &self.ladders
    }

    pub fn snake_count(&self) -> usize {
        self.snakes.len()
    }

    pub fn ladder_count(&self) -> usize {
        self.ladders.len()
    }
}
