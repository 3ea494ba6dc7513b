//! Named, restorable snapshots of transactions and matches

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::*;

/// What triggered a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotKind {
    /// Taken automatically after an import lands
    Import,
    /// Saved explicitly by an operator
    Manual,
    /// Taken by the system on a schedule
    Auto,
}

impl fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotKind::Import => f.write_str("import"),
            SnapshotKind::Manual => f.write_str("manual"),
            SnapshotKind::Auto => f.write_str("auto"),
        }
    }
}

/// Figures derived at capture time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub transaction_count: usize,
    pub match_count: usize,
    /// Sum of left-side totals across all matches
    pub matched_value: BigDecimal,
}

/// Point-in-time copy of transactions and matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub id: String,
    pub label: String,
    pub kind: SnapshotKind,
    pub created_at: NaiveDateTime,
    /// User id of the operator who triggered the capture
    pub created_by: String,
    pub transactions: Vec<Transaction>,
    pub matches: Vec<MatchGroup>,
    pub selected_date: Option<NaiveDate>,
    pub stats: SnapshotStats,
}

impl SystemSnapshot {
    /// Capture copies of `transactions` and `matches`
    pub fn capture(
        label: String,
        kind: SnapshotKind,
        transactions: &[Transaction],
        matches: &[MatchGroup],
        selected_date: Option<NaiveDate>,
        created_by: &str,
    ) -> Self {
        let stats = SnapshotStats {
            transaction_count: transactions.len(),
            match_count: matches.len(),
            matched_value: matches.iter().map(|m| &m.total_left).sum(),
        };

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            kind,
            created_at: chrono::Utc::now().naive_utc(),
            created_by: created_by.to_string(),
            transactions: transactions.to_vec(),
            matches: matches.to_vec(),
            selected_date,
            stats,
        }
    }
}

/// Retained snapshots in creation order
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    snapshots: Vec<SystemSnapshot>,
    retention: Option<usize>,
}

impl SnapshotStore {
    /// Create a store keeping at most `retention` snapshots (minimum 1), or
    /// all of them
    pub fn new(retention: Option<usize>) -> Self {
        Self {
            snapshots: Vec::new(),
            retention: retention.map(|limit| limit.max(1)),
        }
    }

    /// Add a snapshot, dropping the oldest ones beyond the retention limit
    pub fn push(&mut self, snapshot: SystemSnapshot) -> &SystemSnapshot {
        tracing::info!(
            snapshot_id = %snapshot.id,
            label = %snapshot.label,
            kind = %snapshot.kind,
            transactions = snapshot.stats.transaction_count,
            matches = snapshot.stats.match_count,
            "Snapshot captured"
        );
        self.snapshots.push(snapshot);

        if let Some(limit) = self.retention {
            if self.snapshots.len() > limit {
                let excess = self.snapshots.len() - limit;
                self.snapshots.drain(..excess);
                tracing::debug!(evicted = excess, "Snapshots beyond retention dropped");
            }
        }

        &self.snapshots[self.snapshots.len() - 1]
    }

    pub fn get(&self, id: &str) -> Option<&SystemSnapshot> {
        self.snapshots.iter().find(|s| s.id == id)
    }

    pub fn list(&self) -> &[SystemSnapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&SystemSnapshot> {
        self.snapshots.last()
    }

    pub fn retention(&self) -> Option<usize> {
        self.retention
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
