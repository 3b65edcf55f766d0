//! Customer-relative period windows.
//!
//! Period `k` (1-based) for a customer covers the half-open interval
//! `[first + (k-1)*len, first + k*len)` where `first` is the customer's
//! earliest transaction and `len` is the churn period in whole days.

use std::collections::BTreeMap;

use chrono::{Duration as ChronoDuration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::grouping::group_reduce;
use crate::pipeline::ClvError;
use crate::transaction::Transaction;

pub const DEFAULT_CHURN_PERIOD_DAYS: u32 = 30;

/// Width of one period bucket and distance of the recency boundary from the
/// latest transaction. Always a positive number of whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ChurnPeriod(u32);

impl ChurnPeriod {
    pub fn from_days(days: i64) -> Result<Self, ClvError> {
        if days <= 0 {
            return Err(ClvError::InvalidConfiguration(format!(
                "churn period must be a positive number of days, got {days}"
            )));
        }
        let days = u32::try_from(days).map_err(|_| {
            ClvError::InvalidConfiguration(format!("churn period of {days} days is too large"))
        })?;
        Ok(Self(days))
    }

    pub fn from_duration(duration: ChronoDuration) -> Result<Self, ClvError> {
        let days = duration.num_days();
        if duration - ChronoDuration::days(days) != ChronoDuration::zero() {
            return Err(ClvError::InvalidConfiguration(format!(
                "churn period must be a whole number of days, got {}s",
                duration.num_seconds()
            )));
        }
        Self::from_days(days)
    }

    pub fn days(self) -> u32 {
        self.0
    }

    pub fn duration(self) -> ChronoDuration {
        ChronoDuration::days(i64::from(self.0))
    }
}

impl Default for ChurnPeriod {
    fn default() -> Self {
        Self(DEFAULT_CHURN_PERIOD_DAYS)
    }
}

impl TryFrom<u32> for ChurnPeriod {
    type Error = ClvError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        Self::from_days(i64::from(days))
    }
}

impl From<ChurnPeriod> for u32 {
    fn from(period: ChurnPeriod) -> Self {
        period.0
    }
}

/// 1-based index of the window containing `date`, counted from `first`.
///
/// Elapsed time is measured in whole days, so a transaction later on the
/// same calendar day as `first` still lands in period 1. Dates before
/// `first` clamp to period 1.
pub fn period_index(first: NaiveDateTime, date: NaiveDateTime, period: ChurnPeriod) -> u32 {
    let elapsed_days = date.signed_duration_since(first).num_days().max(0);
    let completed = elapsed_days / i64::from(period.days());
    u32::try_from(completed)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

/// Phase one of period assignment: each customer's earliest transaction.
pub fn customer_start_dates(transactions: &[Transaction]) -> BTreeMap<&str, NaiveDateTime> {
    group_reduce(
        transactions,
        |tx| tx.customer_id.as_str(),
        |tx| tx.date,
        |first, tx| *first = (*first).min(tx.date),
    )
}

/// Phase two: map every transaction to its period, preserving input order.
pub fn assign_transaction_periods(transactions: &[Transaction], period: ChurnPeriod) -> Vec<u32> {
    let starts = customer_start_dates(transactions);
    transactions
        .iter()
        .map(|tx| period_for(&starts, tx, period))
        .collect()
}

pub(crate) fn period_for(
    starts: &BTreeMap<&str, NaiveDateTime>,
    tx: &Transaction,
    period: ChurnPeriod,
) -> u32 {
    starts
        .get(tx.customer_id.as_str())
        .map_or(1, |first| period_index(*first, tx.date, period))
}
