//! Review output shapes, serialized as JSON for the caller.

use serde::{Deserialize, Serialize};

/// Quality label for one played move, ordered best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Brilliant,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Blunder,
}

impl Judgment {
    pub fn as_str(self) -> &'static str {
        match self {
            Judgment::Brilliant => "brilliant",
            Judgment::Excellent => "excellent",
            Judgment::Good => "good",
            Judgment::Inaccuracy => "inaccuracy",
            Judgment::Mistake => "mistake",
            Judgment::Blunder => "blunder",
        }
    }
}

impl std::fmt::Display for Judgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-side classification counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentCounts {
    pub brilliant: u32,
    pub excellent: u32,
    pub good: u32,
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl JudgmentCounts {
    pub fn bump(&mut self, judgment: Judgment) {
        match judgment {
            Judgment::Brilliant => self.brilliant += 1,
            Judgment::Excellent => self.excellent += 1,
            Judgment::Good => self.good += 1,
            Judgment::Inaccuracy => self.inaccuracy += 1,
            Judgment::Mistake => self.mistake += 1,
            Judgment::Blunder => self.blunder += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.brilliant + self.excellent + self.good + self.inaccuracy + self.mistake + self.blunder
    }
}

/// One judged move. Evaluations are centipawns from White's perspective;
/// `delta` is from the mover's perspective, negative when ground was lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedMove {
    /// Ply index into the game, counted from zero.
    pub index: usize,
    #[serde(rename = "move")]
    pub uci: String,
    pub san: String,
    pub eval_before: i32,
    pub eval_after: i32,
    pub best_move: String,
    pub delta: i32,
    pub judgment: Judgment,
    pub rationale: String,
}

/// Aggregates for one side over its judged moves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideSummary {
    pub judged: u32,
    pub counts: JudgmentCounts,
    /// Mean centipawns lost per judged move (gains count as zero loss).
    pub avg_cp_loss: f64,
    /// 0-100, penalty-averaged over the side's judged moves.
    pub accuracy: f64,
}

/// Full review of one game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameReview {
    pub moves: Vec<AnnotatedMove>,
    pub white: SideSummary,
    pub black: SideSummary,
    /// Leading plies excluded from judgment as opening theory.
    pub opening_skip: usize,
    pub total_moves: usize,
}
