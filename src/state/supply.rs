//! Board acquisition.
//!
//! Sessions get their layout from an external generator. Whatever it hands
//! back is validated here, and a failure walks down a fallback chain so a
//! session is never created with a broken board:
//!
//! ```text
//! external generator ──▶ algorithmic ──▶ difficulty preset ──▶ classic board
//! ```

use std::collections::{BTreeSet, HashMap};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use super::board::{
    BoardDescriptor, BoardValidationError, Difficulty, FeatureCounts, FINAL_SQUARE,
};

/// Default tolerance on snake/ladder counts for generated boards.
pub const DEFAULT_FEATURE_COUNT_TOLERANCE: usize = 2;

/// Shortest snake or ladder the algorithmic generator will place.
pub const MIN_FEATURE_SPAN: u8 = 10;

const MAX_BOARD_ATTEMPTS: usize = 32;
const MAX_PLACEMENT_ATTEMPTS: usize = 200;

/// Why a generator produced no usable board.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("board generator unavailable: {0}")]
    Unavailable(String),

    #[error("board generator timed out")]
    TimedOut,

    #[error("generated board is invalid: {0}")]
    Invalid(#[from] BoardValidationError),
}

/// Produces board layouts for a difficulty.
pub trait BoardGenerator {
    fn generate(&mut self, difficulty: Difficulty) -> Result<BoardDescriptor, GenerationError>;
}

/// Random layouts that honour the difficulty's feature counts.
#[derive(Debug, Clone)]
pub struct AlgorithmicGenerator {
    rng: StdRng,
}

impl AlgorithmicGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    fn try_layout(&mut self, counts: FeatureCounts) -> Option<BoardDescriptor> {
        let mut used = BTreeSet::new();
        let mut snakes = Vec::with_capacity(counts.snakes);
        let mut ladders = Vec::with_capacity(counts.ladders);

        for _ in 0..counts.snakes {
            let (low, high) = self.place(&mut used)?;
            snakes.push((high, low));
        }
        for _ in 0..counts.ladders {
            ladders.push(self.place(&mut used)?);
        }

        BoardDescriptor::from_pairs(&snakes, &ladders).ok()
    }

    /// Pick an unused (low, high) pair of squares at least `MIN_FEATURE_SPAN` apart.
    fn place(&mut self, used: &mut BTreeSet<u8>) -> Option<(u8, u8)> {
        for _ in 0..MAX_PLACEMENT_ATTEMPTS {
            let low = self.rng.gen_range(2..FINAL_SQUARE - MIN_FEATURE_SPAN);
            let high = self.rng.gen_range(low + MIN_FEATURE_SPAN..FINAL_SQUARE);
            if used.contains(&low) || used.contains(&high) {
                continue;
            }
            used.insert(low);
            used.insert(high);
            return Some((low, high));
        }
        None
    }
}

impl BoardGenerator for AlgorithmicGenerator {
    fn generate(&mut self, difficulty: Difficulty) -> Result<BoardDescriptor, GenerationError> {
        let counts = difficulty.feature_counts();
        for _ in 0..MAX_BOARD_ATTEMPTS {
            if let Some(board) = self.try_layout(counts) {
                return Ok(board);
            }
        }
        Err(GenerationError::Unavailable(format!(
            "no {} layout after {} attempts",
            difficulty, MAX_BOARD_ATTEMPTS
        )))
    }
}

/// Fixed layouts per difficulty.
#[derive(Debug, Clone, Default)]
pub struct BoardPresets {
    presets: HashMap<Difficulty, BoardDescriptor>,
}

impl BoardPresets {
    /// No presets at all; every fallback ends at the classic board.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut presets = HashMap::new();
        presets.insert(
            Difficulty::Easy,
            BoardDescriptor::from_static(
                &[(33, 12), (58, 40), (86, 66), (94, 74)],
                &[
                    (3, 22),
                    (8, 30),
                    (13, 46),
                    (27, 56),
                    (37, 63),
                    (50, 69),
                    (71, 92),
                    (79, 97),
                ],
            ),
        );
        presets.insert(
            Difficulty::Medium,
            BoardDescriptor::from_static(
                &[(25, 6), (48, 29), (65, 45), (82, 59), (91, 71), (97, 78)],
                &[(5, 26), (11, 34), (20, 41), (43, 61), (57, 76), (68, 88)],
            ),
        );
        presets.insert(
            Difficulty::Hard,
            BoardDescriptor::from_static(
                &[
                    (16, 4),
                    (32, 10),
                    (39, 18),
                    (47, 26),
                    (62, 38),
                    (74, 51),
                    (89, 68),
                    (92, 70),
                    (96, 77),
                    (99, 41),
                ],
                &[(7, 29), (24, 45), (53, 72), (66, 85)],
            ),
        );
        Self { presets }
    }

    /// Register a preset. Invalid layouts are refused.
    pub fn insert(
        &mut self,
        difficulty: Difficulty,
        board: BoardDescriptor,
    ) -> Result<(), BoardValidationError> {
        board.validate()?;
        self.presets.insert(difficulty, board);
        Ok(())
    }

    pub fn get(&self, difficulty: Difficulty) -> Option<&BoardDescriptor> {
        self.presets.get(&difficulty)
    }
}

/// Where a session's board came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSource {
    Generator,
    Algorithmic,
    Preset,
    Default,
}

impl BoardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Algorithmic => "algorithmic",
            Self::Preset => "preset",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquiredBoard {
    pub board: BoardDescriptor,
    pub source: BoardSource,
}

/// Validation and fallback chain for board layouts.
#[derive(Debug, Clone)]
pub struct BoardSupply {
    presets: BoardPresets,
    algorithmic: Option<AlgorithmicGenerator>,
    tolerance: usize,
}

impl BoardSupply {
    pub fn new(presets: BoardPresets, seed: Option<u64>, tolerance: usize) -> Self {
        Self {
            presets,
            algorithmic: Some(AlgorithmicGenerator::new(seed)),
            tolerance,
        }
    }

    /// Skip the algorithmic stage and go straight to presets on failure.
    pub fn without_algorithmic(mut self) -> Self {
        self.algorithmic = None;
        self
    }

    pub fn presets(&self) -> &BoardPresets {
        &self.presets
    }

    /// Ask `generator` for a layout and settle the result.
    pub fn acquire<G>(&mut self, generator: &mut G, difficulty: Difficulty) -> AcquiredBoard
    where
        G: BoardGenerator + ?Sized,
    {
        let generated = generator.generate(difficulty);
        self.settle(difficulty, generated)
    }

    /// Turn whatever the external generator produced into a usable board.
    pub fn settle(
        &mut self,
        difficulty: Difficulty,
        generated: Result<BoardDescriptor, GenerationError>,
    ) -> AcquiredBoard {
        let checked = generated.and_then(|board| {
            board.validate_for(difficulty, self.tolerance)?;
            Ok(board)
        });
        let err = match checked {
            Ok(board) => {
                return AcquiredBoard {
                    board,
                    source: BoardSource::Generator,
                }
            }
            Err(err) => err,
        };
        warn!(%difficulty, error = %err, "board generator failed, falling back");

        let tolerance = self.tolerance;
        if let Some(algorithmic) = self.algorithmic.as_mut() {
            let layout = algorithmic.generate(difficulty).and_then(|board| {
                board.validate_for(difficulty, tolerance)?;
                Ok(board)
            });
            match layout {
                Ok(board) => {
                    return AcquiredBoard {
                        board,
                        source: BoardSource::Algorithmic,
                    }
                }
                Err(err) => {
                    warn!(%difficulty, error = %err, "algorithmic layout failed, using preset");
                }
            }
        }

        match self.presets.get(difficulty) {
            Some(board) => AcquiredBoard {
                board: board.clone(),
                source: BoardSource::Preset,
            },
            None => {
                warn!(%difficulty, "no preset for difficulty, using classic board");
                AcquiredBoard {
                    board: BoardDescriptor::classic(),
                    source: BoardSource::Default,
                }
            }
        }
    }
}

impl Default for BoardSupply {
    fn default() -> Self {
        Self::new(
            BoardPresets::builtin(),
            None,
            DEFAULT_FEATURE_COUNT_TOLERANCE,
        )
    }
}
