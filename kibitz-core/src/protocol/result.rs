//! Structured search results

use serde::{Deserialize, Serialize};

/// Engine evaluation of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Score {
    /// Centipawns from the side to move's point of view
    Cp(i32),
    /// Forced mate in N moves (negative when the side to move gets mated)
    Mate(i32),
}

/// Outcome of one search
///
/// A result with no best move means the reply ended without a `bestmove`
/// line; see [`AnalysisResult::is_incomplete`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: Option<Score>,
    pub best_move: Option<String>,
    #[serde(default)]
    pub pv: Vec<String>,
}

impl AnalysisResult {
    /// Centipawn score, if the last reported score was one
    pub fn cp(&self) -> Option<i32> {
        match self.score {
            Some(Score::Cp(cp)) => Some(cp),
            _ => None,
        }
    }

    /// Mate distance, if the last reported score was one
    pub fn mate(&self) -> Option<i32> {
        match self.score {
            Some(Score::Mate(n)) => Some(n),
            _ => None,
        }
    }

    /// True when the engine never produced a best move
    pub fn is_incomplete(&self) -> bool {
        self.best_move.is_none()
    }
}
