//! Bounded dispatch in front of the engine client.

use tokio::sync::Semaphore;
use tracing::debug;

use crate::client::{AnalysisResult, EngineClient, SearchLimit};
use crate::config::EngineConfig;
use crate::error::EngineError;

/// Caps concurrent engine subprocesses. The semaphore is fair, so waiting
/// callers get slots strictly in arrival order; a failed call releases its
/// slot and resolves only its own caller.
pub struct EnginePool {
    client: EngineClient,
    slots: Semaphore,
    size: usize,
}

impl EnginePool {
    pub fn new(config: &EngineConfig) -> EnginePool {
        EnginePool {
            client: EngineClient::new(config),
            slots: Semaphore::new(config.pool_size),
            size: config.pool_size,
        }
    }

    /// Number of concurrent slots; review batching keys off this.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Analyze one position, queueing when all slots are busy.
    pub async fn analyze(
        &self,
        fen: &str,
        limit: SearchLimit,
    ) -> Result<AnalysisResult, EngineError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| EngineError::Process("engine pool closed".to_string()))?;
        debug!(fen, available = self.slots.available_permits(), "engine slot acquired");
        self.client.analyze(fen, limit).await
    }
}
