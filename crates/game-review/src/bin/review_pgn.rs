//! Review a PGN file through the engine pool and print the JSON report.
//!
//! Usage: cargo run -p game-review --bin review-pgn -- game.pgn
//!
//! Engine settings come from ENGINE_* environment variables or a .env
//! file; ENGINE_PATH must point at a UCI engine binary.

use std::sync::Arc;

use engine_pool::{EngineConfig, EnginePool, SearchLimit};
use game_review::ReviewEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();
    let _ = dotenvy::dotenv();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow::anyhow!("usage: review-pgn <game.pgn>"))?;
    let notation = std::fs::read_to_string(&path)?;

    let config = EngineConfig::load();
    let pool = Arc::new(EnginePool::new(&config));
    let reviewer = ReviewEngine::new(pool, SearchLimit::movetime(config.movetime_ms));

    let review = reviewer.review_game(&notation).await?;
    println!("{}", serde_json::to_string_pretty(&review)?);

    let judged = review.white.judged + review.black.judged;
    eprintln!(
        "{} plies, {} judged after skipping {}; accuracy {:.1} (white) / {:.1} (black)",
        review.total_moves,
        judged,
        review.opening_skip,
        review.white.accuracy,
        review.black.accuracy
    );
    Ok(())
}
