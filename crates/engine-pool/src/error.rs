//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine produced no bestmove within {0}ms")]
    Timeout(u64),

    #[error("engine process failed: {0}")]
    Process(String),

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected engine output: {0}")]
    Protocol(String),
}
