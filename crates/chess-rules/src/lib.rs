//! Variant-aware wrapper around the rules oracle: position handling, move
//! legality, SAN/UCI conversion, terminal-state detection.

pub mod error;
pub mod variant;

pub use error::RulesError;
pub use variant::{MoveRecord, Terminal, Variant, VariantPosition};

pub use shakmaty::{Color, Move, Role, Square};

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
