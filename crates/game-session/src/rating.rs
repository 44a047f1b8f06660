//! Seam for the external rating collaborator. Rating math itself lives
//! outside this crate; sessions only report terminal results for games
//! with two human seats.

use chess_rules::Color;
use serde::Serialize;

/// Rating adjustment reported back after a recorded result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingDelta {
    pub white: i32,
    pub black: i32,
}

/// External rating collaborator. `winner` of `None` records a draw.
pub trait RatingStore: Send + Sync {
    fn lookup_rating(&self, identity: &str) -> Option<u32>;

    fn record_result(&self, white: &str, black: &str, winner: Option<Color>) -> RatingDelta;
}
