//! Game-notation ingestion: header/move-text split, tokenization with
//! comment and tag extraction, replay into a position sequence, and the
//! reverse direction (serializing a move history back to notation).

pub mod game;
pub mod pgn;
pub mod writer;

pub use game::{EvalTag, ParsedGame, PlayedMove, PositionInfo, ReplayHalt};
pub use pgn::parse;
pub use writer::{write_game, write_movetext};
