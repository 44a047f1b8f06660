//! Live game orchestration: two-seat sessions across coordination modes
//! (alternating, simultaneous, voting, reaction, correspondence),
//! automated opponents backed by the engine pool, and the registry that
//! owns every running game.

pub mod config;
pub mod error;
pub mod modes;
pub mod rating;
pub mod registry;
pub mod session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use modes::{ModeKind, Speed};
pub use rating::{RatingDelta, RatingStore};
pub use registry::{SessionRegistry, SweepEvent};
pub use session::{
    AppliedMove, FinishReason, GameSession, HistoryEntry, MoveOutcome, ReactionOutcome, SeatKind,
    SessionOptions, SessionState, SessionSummary, SweepNotice, VoteStatus,
};
