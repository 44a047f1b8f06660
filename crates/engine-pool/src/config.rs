//! Engine configuration from environment variables.

use std::env;

/// Tunables for the engine subprocess and the pool in front of it.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Path to the UCI engine binary.
    pub engine_path: String,

    /// Concurrent subprocess limit.
    pub pool_size: usize,

    /// Default time budget per search, in milliseconds.
    pub movetime_ms: u64,

    /// Wall-clock allowance past the search budget before a call is
    /// forcibly terminated.
    pub timeout_grace_ms: u64,

    /// Threads per engine subprocess.
    pub threads: u32,

    /// Hash table size per subprocess, in megabytes.
    pub hash_mb: u32,
}

impl EngineConfig {
    /// Load configuration from environment variables, falling back to the
    /// defaults for anything unset or unparseable.
    pub fn load() -> EngineConfig {
        let defaults = EngineConfig::default();
        EngineConfig {
            engine_path: env::var("ENGINE_PATH").unwrap_or(defaults.engine_path),
            pool_size: env::var("ENGINE_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.pool_size),
            movetime_ms: env::var("ENGINE_MOVETIME_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.movetime_ms),
            timeout_grace_ms: env::var("ENGINE_TIMEOUT_GRACE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_grace_ms),
            threads: env::var("ENGINE_THREADS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threads),
            hash_mb: env::var("ENGINE_HASH_MB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.hash_mb),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            engine_path: "/usr/local/bin/stockfish".to_string(),
            pool_size: 4,
            movetime_ms: 1500,
            timeout_grace_ms: 1500,
            threads: 1,
            hash_mb: 128,
        }
    }
}
