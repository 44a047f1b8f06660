//! Analysis-engine orchestration: a per-call UCI subprocess client and a
//! bounded, arrival-ordered pool in front of it.

pub mod client;
pub mod config;
pub mod error;
pub mod pool;

pub use client::{AnalysisResult, EngineClient, SearchLimit, FAST_SEARCH_DEPTH};
pub use config::EngineConfig;
pub use error::EngineError;
pub use pool::EnginePool;
