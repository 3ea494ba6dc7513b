//! Bounded undo stack of full-state checkpoints

use chrono::NaiveDateTime;
use std::collections::VecDeque;

use crate::types::*;
use crate::workspace::WorkspaceState;

/// Deep copy of the workspace state taken right before a mutation
#[derive(Debug, Clone)]
pub struct Checkpoint {
    state: WorkspaceState,
    taken_at: NaiveDateTime,
}

impl Checkpoint {
    pub fn new(state: WorkspaceState) -> Self {
        Self {
            state,
            taken_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn taken_at(&self) -> NaiveDateTime {
        self.taken_at
    }

    /// Check the captured state before it is applied
    pub fn verify(&self) -> ReconResult<()> {
        self.state.verify_integrity().map_err(|err| match err {
            ReconError::Validation(reason) => ReconError::CorruptCheckpoint(reason),
            other => other,
        })
    }

    pub fn into_state(self) -> WorkspaceState {
        self.state
    }
}

/// FIFO-bounded, LIFO-popped stack of checkpoints
///
/// When full, pushing evicts the oldest checkpoint first, so the store never
/// holds more than `capacity` entries.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    entries: VecDeque<Checkpoint>,
    capacity: usize,
}

impl CheckpointStore {
    /// Create a store holding at most `capacity` checkpoints (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a copy of `state`
    pub fn save(&mut self, state: &WorkspaceState) {
        while self.entries.len() >= self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(taken_at = %evicted.taken_at, "Oldest checkpoint evicted");
            }
        }

        self.entries.push_back(Checkpoint::new(state.clone()));
        tracing::debug!(depth = self.entries.len(), "Checkpoint saved");
    }

    /// Remove and return the most recent checkpoint
    pub fn pop(&mut self) -> Option<Checkpoint> {
        self.entries.pop_back()
    }

    /// Put back a checkpoint that was popped but not applied
    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        if self.entries.len() < self.capacity {
            self.entries.push_back(checkpoint);
        }
    }

    pub fn peek(&self) -> Option<&Checkpoint> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
