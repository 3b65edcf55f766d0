//! Raw purchase records consumed by the CLV pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One purchase line. Read-only to every stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: String,
    pub date: NaiveDateTime,
    pub profit: f64,
    pub quantity: i64,
    pub stock_code: String,
}

impl Transaction {
    pub fn new(
        customer_id: impl Into<String>,
        date: NaiveDateTime,
        profit: f64,
        quantity: i64,
        stock_code: impl Into<String>,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            date,
            profit,
            quantity,
            stock_code: stock_code.into(),
        }
    }
}

/// Latest transaction date across every customer, or `None` for empty input.
pub fn global_max_date(transactions: &[Transaction]) -> Option<NaiveDateTime> {
    transactions.iter().map(|tx| tx.date).max()
}
