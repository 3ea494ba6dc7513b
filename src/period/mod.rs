//! Financial period lock
//!
//! A single global cutoff date closes every period up to and including it.
//! Transactions dated on or before the cutoff can no longer be matched,
//! unmatched or commented on.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// Whether `date` falls in a closed period for the given cutoff
pub fn is_locked(date: NaiveDate, cutoff: Option<NaiveDate>) -> bool {
    cutoff.is_some_and(|cutoff| date <= cutoff)
}

/// Current period cutoff of a workspace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodLock {
    cutoff: Option<NaiveDate>,
}

impl PeriodLock {
    /// No period closed
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything on or before `cutoff` closed
    pub fn at(cutoff: NaiveDate) -> Self {
        Self {
            cutoff: Some(cutoff),
        }
    }

    pub fn cutoff(&self) -> Option<NaiveDate> {
        self.cutoff
    }

    pub(crate) fn set_cutoff(&mut self, cutoff: Option<NaiveDate>) {
        self.cutoff = cutoff;
    }

    pub fn is_locked(&self, date: NaiveDate) -> bool {
        is_locked(date, self.cutoff)
    }

    /// Fail with [`ReconError::PeriodLocked`] if any of `dates` is locked
    pub fn check<I>(&self, dates: I) -> ReconResult<()>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let Some(cutoff) = self.cutoff else {
            return Ok(());
        };

        if let Some(date) = dates.into_iter().find(|date| *date <= cutoff) {
            tracing::warn!(%cutoff, %date, "Operation touches a locked period");
            return Err(ReconError::PeriodLocked { cutoff });
        }

        Ok(())
    }
}
