//! Customer-period buckets.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::grouping::group_reduce;
use crate::period::{customer_start_dates, period_for, ChurnPeriod};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodBucket {
    pub customer_id: String,
    pub period_index: u32,
    pub tx_count: u64,
    pub profit_sum: f64,
    pub quantity_sum: i64,
    pub purchased_items: BTreeSet<String>,
    pub bucket_end_date: NaiveDateTime,
}

impl PeriodBucket {
    fn seed(customer_id: &str, period_index: u32, tx: &Transaction) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            period_index,
            tx_count: 1,
            profit_sum: tx.profit,
            quantity_sum: tx.quantity,
            purchased_items: BTreeSet::from([tx.stock_code.clone()]),
            bucket_end_date: tx.date,
        }
    }

    fn absorb(&mut self, tx: &Transaction) {
        self.tx_count += 1;
        self.profit_sum += tx.profit;
        self.quantity_sum = self.quantity_sum.saturating_add(tx.quantity);
        if !self.purchased_items.contains(&tx.stock_code) {
            self.purchased_items.insert(tx.stock_code.clone());
        }
        self.bucket_end_date = self.bucket_end_date.max(tx.date);
    }
}

/// Buckets transactions by `(customer_id, period_index)`.
///
/// Start dates are resolved in a first pass over the whole input, then each
/// transaction is keyed by its period. Output is sorted by customer id, then
/// period index.
pub fn aggregate_periods(transactions: &[Transaction], period: ChurnPeriod) -> Vec<PeriodBucket> {
    let starts = customer_start_dates(transactions);

    group_reduce(
        transactions,
        |tx| (tx.customer_id.as_str(), period_for(&starts, tx, period)),
        |tx| PeriodBucket::seed(&tx.customer_id, period_for(&starts, tx, period), tx),
        PeriodBucket::absorb,
    )
    .into_values()
    .collect()
}
