use thiserror::Error;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("illegal move {mv} in position {fen}")]
    IllegalMove { mv: String, fen: String },

    #[error("unparseable move: {0}")]
    ParseMove(String),

    #[error("invalid FEN: {0}")]
    ParseFen(String),
}
