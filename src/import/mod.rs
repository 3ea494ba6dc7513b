//! Boundary with the external feed importer
//!
//! Parsing spreadsheets and detecting columns happens outside the core. The
//! importer hands over raw string rows per side; rows that fail validation
//! are dropped and counted, the rest land as unmatched transactions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::traits::RecordValidator;
use crate::types::*;

/// A row as delivered by the importer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub date: String,
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub reference: Option<String>,
}

impl RawRecord {
    pub fn new(id: &str, date: &str, description: &str, amount: &str) -> Self {
        Self {
            id: id.to_string(),
            date: date.to_string(),
            description: description.to_string(),
            amount: amount.to_string(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: &str) -> Self {
        self.reference = Some(reference.to_string());
        self
    }
}

/// Validated rows ready to be appended to a workspace
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub left: Vec<Transaction>,
    pub right: Vec<Transaction>,
    /// Rows dropped for failing validation or repeating a known id
    pub skipped: usize,
}

impl ImportBatch {
    /// Validate both sides, dropping bad rows and ids already in `existing`
    pub fn prepare(
        left: &[RawRecord],
        right: &[RawRecord],
        existing: &HashSet<&str>,
        validator: &dyn RecordValidator,
    ) -> Self {
        let mut batch = Self::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (rows, side) in [(left, Side::Left), (right, Side::Right)] {
            for record in rows {
                match validator.validate_record(record, side) {
                    Ok(txn) => {
                        if existing.contains(txn.id.as_str()) || !seen.insert(txn.id.clone()) {
                            tracing::warn!(id = %txn.id, %side, "Duplicate record id skipped");
                            batch.skipped += 1;
                            continue;
                        }
                        match side {
                            Side::Left => batch.left.push(txn),
                            Side::Right => batch.right.push(txn),
                        }
                    }
                    Err(err) => {
                        tracing::warn!(id = %record.id, %side, error = %err, "Invalid record skipped");
                        batch.skipped += 1;
                    }
                }
            }
        }

        batch
    }

    pub fn imported(&self) -> usize {
        self.left.len() + self.right.len()
    }
}

/// Outcome of an import reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub date: NaiveDate,
    pub imported_left: usize,
    pub imported_right: usize,
    pub skipped: usize,
    /// Id of the snapshot captured once the rows landed
    pub snapshot_id: String,
}
