use chess_rules::MoveRecord;
use serde::{Deserialize, Serialize};

/// Evaluation embedded in a `[%eval ...]` comment tag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EvalTag {
    /// Centipawns from White's perspective.
    Cp(i32),
    /// Forced mate in N; negative when Black delivers it.
    Mate(i32),
}

/// One replayed move with everything the surrounding notation said about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayedMove {
    pub record: MoveRecord,
    /// Trailing `!`/`?` glyphs split off the move token.
    pub annotation: Option<String>,
    /// Comment text with embedded tags removed.
    pub comment: Option<String>,
    pub eval: Option<EvalTag>,
    /// Mover's clock in whole seconds, from a `[%clk ...]` tag.
    pub clock: Option<u32>,
}

impl PlayedMove {
    pub fn from_record(record: MoveRecord) -> PlayedMove {
        PlayedMove {
            record,
            annotation: None,
            comment: None,
            eval: None,
            clock: None,
        }
    }
}

/// Snapshot metadata for one position in the replayed sequence. Entry 0 is
/// the initial position; entry i carries the annotations of move i-1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionInfo {
    pub fen: String,
    pub is_check: bool,
    pub is_checkmate: bool,
    /// Square of the piece giving check, when in check.
    pub checker_square: Option<String>,
    /// Last known clocks, carried forward until overwritten.
    pub white_clock: Option<u32>,
    pub black_clock: Option<u32>,
    pub eval: Option<EvalTag>,
    pub comment: Option<String>,
}

/// Where and why replay stopped before the end of the move text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayHalt {
    /// Index the failing move would have had.
    pub move_index: usize,
    pub token: String,
    pub reason: String,
}

/// Parse output: headers in file order, replayed moves, and one
/// `PositionInfo` per position (moves + 1 when replay completes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedGame {
    pub headers: Vec<(String, String)>,
    pub moves: Vec<PlayedMove>,
    pub positions: Vec<PositionInfo>,
    /// Result marker from the move text (`1-0`, `0-1`, `1/2-1/2`, `*`).
    pub result: Option<String>,
    /// Set when replay stopped early; everything before it is still valid.
    pub halted: Option<ReplayHalt>,
}

impl ParsedGame {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn san_moves(&self) -> Vec<String> {
        self.moves.iter().map(|m| m.record.san.clone()).collect()
    }
}
