//! Per-customer profit and lifetime summary.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::grouping::group_reduce;
use crate::period::{period_index, ChurnPeriod};
use crate::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    pub total_profit: f64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    /// Number of churn periods spanned from first to last transaction.
    pub lifetime_periods: u32,
}

#[derive(Debug, Clone, Copy)]
struct SummaryAcc {
    total_profit: f64,
    start_date: NaiveDateTime,
    end_date: NaiveDateTime,
}

impl SummaryAcc {
    fn seed(tx: &Transaction) -> Self {
        Self {
            total_profit: tx.profit,
            start_date: tx.date,
            end_date: tx.date,
        }
    }

    fn absorb(&mut self, tx: &Transaction) {
        self.total_profit += tx.profit;
        self.start_date = self.start_date.min(tx.date);
        self.end_date = self.end_date.max(tx.date);
    }
}

/// One summary row per distinct customer, ordered by customer id.
pub fn summarize_customers(
    transactions: &[Transaction],
    period: ChurnPeriod,
) -> Vec<CustomerSummary> {
    group_reduce(
        transactions,
        |tx| tx.customer_id.as_str(),
        SummaryAcc::seed,
        SummaryAcc::absorb,
    )
    .into_iter()
    .map(|(customer_id, acc)| CustomerSummary {
        customer_id: customer_id.to_string(),
        total_profit: acc.total_profit,
        start_date: acc.start_date,
        end_date: acc.end_date,
        lifetime_periods: period_index(acc.start_date, acc.end_date, period),
    })
    .collect()
}
