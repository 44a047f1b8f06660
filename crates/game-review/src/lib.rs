//! Post-hoc game review: replays parsed notation, evaluates positions
//! through the engine pool in fixed-size batches, and grades every move
//! past the opening against the engine's choice.

pub mod classify;
pub mod error;
pub mod report;
pub mod review;

pub use error::ReviewError;
pub use report::{AnnotatedMove, GameReview, Judgment, JudgmentCounts, SideSummary};
pub use review::ReviewEngine;
