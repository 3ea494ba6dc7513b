//! In-memory persistence sink for testing

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;
use crate::workspace::WorkspaceState;

/// In-memory sink that keeps every persisted state, for testing and development
#[derive(Debug, Clone)]
pub struct MemorySink {
    history: Arc<RwLock<Vec<WorkspaceState>>>,
}

impl MemorySink {
    /// Create a new, empty memory sink
    pub fn new() -> Self {
        Self {
            history: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Most recently persisted state
    pub fn latest(&self) -> ReconResult<Option<WorkspaceState>> {
        let history = self
            .history
            .read()
            .map_err(|_| ReconError::Persistence("memory sink lock poisoned".to_string()))?;
        Ok(history.last().cloned())
    }

    /// Number of writes received so far
    pub fn write_count(&self) -> usize {
        self.history.read().map(|h| h.len()).unwrap_or_default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconResult<()> {
        self.history
            .write()
            .map_err(|_| ReconError::Persistence("memory sink lock poisoned".to_string()))?
            .clear();
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateSink for MemorySink {
    async fn persist(&mut self, state: &WorkspaceState) -> ReconResult<()> {
        self.history
            .write()
            .map_err(|_| ReconError::Persistence("memory sink lock poisoned".to_string()))?
            .push(state.clone());
        Ok(())
    }
}
