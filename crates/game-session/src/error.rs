use thiserror::Error;

use chess_rules::RulesError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("move rejected: {0}")]
    IllegalMove(#[from] RulesError),

    #[error("not your turn")]
    NotYourTurn,

    #[error("still waiting for a second player")]
    NotStarted,

    #[error("game already finished")]
    GameFinished,

    #[error("no game running for {0}")]
    SessionNotFound(String),

    #[error("a game is already running for {0}")]
    SessionExists(String),

    #[error("{0} is not seated in this game")]
    NotAParticipant(String),

    #[error("{0}")]
    NotAllowed(&'static str),
}
