//! Workspace configuration

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::*;
use crate::utils::amount::from_cents;

/// Default values for [`ReconConfig`].
pub mod constants {
    /// Adjustments strictly above this many cents need sign-off (10.00).
    pub const APPROVAL_THRESHOLD_CENTS: i64 = 1_000;

    /// Adjustments up to this many cents qualify for a write-off (0.50).
    pub const WRITE_OFF_LIMIT_CENTS: i64 = 50;

    /// Maximum number of undo checkpoints kept per workspace.
    pub const CHECKPOINT_CAPACITY: usize = 20;
}

/// Tunable limits of a reconciliation workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    /// Adjustments strictly greater than this are routed for approval
    pub approval_threshold: BigDecimal,
    /// Adjustments up to this are flagged as write-off eligible
    pub write_off_limit: BigDecimal,
    /// Size of the undo stack
    pub checkpoint_capacity: usize,
    /// Maximum number of retained snapshots; `None` keeps all of them
    pub snapshot_retention: Option<usize>,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            approval_threshold: from_cents(constants::APPROVAL_THRESHOLD_CENTS),
            write_off_limit: from_cents(constants::WRITE_OFF_LIMIT_CENTS),
            checkpoint_capacity: constants::CHECKPOINT_CAPACITY,
            snapshot_retention: None,
        }
    }
}

impl ReconConfig {
    /// Parse a configuration from JSON, filling gaps with defaults
    pub fn from_json(json: &str) -> ReconResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the limits are internally consistent
    pub fn validate(&self) -> ReconResult<()> {
        let zero = BigDecimal::from(0);

        if self.approval_threshold < zero {
            return Err(ReconError::Validation(
                "Approval threshold cannot be negative".to_string(),
            ));
        }

        if self.write_off_limit < zero {
            return Err(ReconError::Validation(
                "Write-off limit cannot be negative".to_string(),
            ));
        }

        if self.write_off_limit > self.approval_threshold {
            return Err(ReconError::Validation(format!(
                "Write-off limit {} exceeds approval threshold {}",
                self.write_off_limit, self.approval_threshold
            )));
        }

        if self.checkpoint_capacity == 0 {
            return Err(ReconError::Validation(
                "Checkpoint capacity must be at least 1".to_string(),
            ));
        }

        if self.snapshot_retention == Some(0) {
            return Err(ReconError::Validation(
                "Snapshot retention must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }
}
