use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("engine analysis failed: {0}")]
    Engine(#[from] engine_pool::EngineError),

    #[error("position error: {0}")]
    Rules(#[from] chess_rules::RulesError),
}
