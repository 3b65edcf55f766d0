//! Churned/active partition and the labelled output rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::period::ChurnPeriod;
use crate::rollup::CustomerFeatures;
use crate::summary::CustomerSummary;

/// Rows that can be classified by recency.
pub trait LastActivity {
    fn customer_id(&self) -> &str;
    fn last_activity(&self) -> NaiveDateTime;
}

impl LastActivity for CustomerSummary {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn last_activity(&self) -> NaiveDateTime {
        self.end_date
    }
}

impl LastActivity for CustomerFeatures {
    fn customer_id(&self) -> &str {
        &self.customer_id
    }

    fn last_activity(&self) -> NaiveDateTime {
        self.last_transaction_date
    }
}

/// Cutoff computed once from the latest transaction in the whole input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecencyBoundary(NaiveDateTime);

impl RecencyBoundary {
    pub fn from_global_max(global_max_date: NaiveDateTime, period: ChurnPeriod) -> Self {
        let boundary = global_max_date
            .checked_sub_signed(period.duration())
            .unwrap_or(NaiveDateTime::MIN);
        Self(boundary)
    }

    pub fn date(self) -> NaiveDateTime {
        self.0
    }

    /// Strictly before the boundary. A last activity equal to it is active.
    pub fn is_churned(self, last_activity: NaiveDateTime) -> bool {
        last_activity < self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnSplit<T> {
    /// `None` only when there was nothing to classify.
    pub boundary: Option<RecencyBoundary>,
    pub churned: Vec<T>,
    pub active: Vec<T>,
}

impl<T> ChurnSplit<T> {
    pub fn len(&self) -> usize {
        self.churned.len() + self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renames each side into its labelled row type. Values pass through
    /// unchanged.
    pub fn relabel<C, A>(self) -> LabelledSplit<C, A>
    where
        C: From<T>,
        A: From<T>,
    {
        LabelledSplit {
            boundary: self.boundary.map(RecencyBoundary::date),
            churned: self.churned.into_iter().map(C::from).collect(),
            active: self.active.into_iter().map(A::from).collect(),
        }
    }
}

/// Partition after relabelling: `C` carries a CLV, `A` a running profit total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledSplit<C, A> {
    pub boundary: Option<NaiveDateTime>,
    pub churned: Vec<C>,
    pub active: Vec<A>,
}

impl<C, A> LabelledSplit<C, A> {
    pub fn empty() -> Self {
        Self {
            boundary: None,
            churned: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.churned.len() + self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Splits `rows` by a single shared boundary. Every row lands on exactly
/// one side; input order is preserved within each side.
pub fn classify<T: LastActivity>(rows: Vec<T>, boundary: RecencyBoundary) -> ChurnSplit<T> {
    let (churned, active): (Vec<T>, Vec<T>) = rows
        .into_iter()
        .partition(|row| boundary.is_churned(row.last_activity()));

    debug!(
        component = "churn",
        event = "clv.churn.partition",
        boundary = %boundary.date(),
        churned = churned.len(),
        active = active.len()
    );

    ChurnSplit {
        boundary: Some(boundary),
        churned,
        active,
    }
}

/// Summary row for a churned customer: the profit total is a closed CLV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnedSummary {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "CLV")]
    pub clv: f64,
    #[serde(rename = "Lifetime")]
    pub lifetime_periods: u32,
}

/// Summary row for an active customer: the profit total is still running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSummary {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Profit")]
    pub total_profit: f64,
    #[serde(rename = "Lifetime")]
    pub lifetime_periods: u32,
}

impl From<CustomerSummary> for ChurnedSummary {
    fn from(row: CustomerSummary) -> Self {
        Self {
            customer_id: row.customer_id,
            clv: row.total_profit,
            lifetime_periods: row.lifetime_periods,
        }
    }
}

impl From<CustomerSummary> for ActiveSummary {
    fn from(row: CustomerSummary) -> Self {
        Self {
            customer_id: row.customer_id,
            total_profit: row.total_profit,
            lifetime_periods: row.lifetime_periods,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnedFeatures {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Lifetime")]
    pub lifetime_periods: u32,
    #[serde(rename = "Txs")]
    pub tx_count: u64,
    #[serde(rename = "CLV")]
    pub clv: f64,
    #[serde(rename = "Quantity")]
    pub quantity_total: i64,
    #[serde(rename = "Purchases")]
    pub purchased_items: BTreeSet<String>,
    #[serde(rename = "Txs_by_period")]
    pub tx_by_period: BTreeMap<u32, u64>,
    #[serde(rename = "Profit_by_period")]
    pub profit_by_period: BTreeMap<u32, f64>,
    #[serde(rename = "Quantity_by_period")]
    pub quantity_by_period: BTreeMap<u32, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveFeatures {
    #[serde(rename = "CustomerID")]
    pub customer_id: String,
    #[serde(rename = "Lifetime")]
    pub lifetime_periods: u32,
    #[serde(rename = "Txs")]
    pub tx_count: u64,
    #[serde(rename = "Profit")]
    pub profit_total: f64,
    #[serde(rename = "Quantity")]
    pub quantity_total: i64,
    #[serde(rename = "Purchases")]
    pub purchased_items: BTreeSet<String>,
    #[serde(rename = "Txs_by_period")]
    pub tx_by_period: BTreeMap<u32, u64>,
    #[serde(rename = "Profit_by_period")]
    pub profit_by_period: BTreeMap<u32, f64>,
    #[serde(rename = "Quantity_by_period")]
    pub quantity_by_period: BTreeMap<u32, i64>,
}

impl From<CustomerFeatures> for ChurnedFeatures {
    fn from(row: CustomerFeatures) -> Self {
        Self {
            customer_id: row.customer_id,
            lifetime_periods: row.lifetime_periods,
            tx_count: row.tx_count,
            clv: row.profit_total,
            quantity_total: row.quantity_total,
            purchased_items: row.purchased_items,
            tx_by_period: row.tx_by_period,
            profit_by_period: row.profit_by_period,
            quantity_by_period: row.quantity_by_period,
        }
    }
}

impl From<CustomerFeatures> for ActiveFeatures {
    fn from(row: CustomerFeatures) -> Self {
        Self {
            customer_id: row.customer_id,
            lifetime_periods: row.lifetime_periods,
            tx_count: row.tx_count,
            profit_total: row.profit_total,
            quantity_total: row.quantity_total,
            purchased_items: row.purchased_items,
            tx_by_period: row.tx_by_period,
            profit_by_period: row.profit_by_period,
            quantity_by_period: row.quantity_by_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn day(offset: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::days(offset)
    }

    fn summary(customer: &str, end: i64) -> CustomerSummary {
        CustomerSummary {
            customer_id: customer.to_string(),
            total_profit: 10.0,
            start_date: day(0),
            end_date: day(end),
            lifetime_periods: 1,
        }
    }

    #[test]
    fn boundary_is_inclusive_on_the_active_side() {
        let boundary = RecencyBoundary::from_global_max(day(100), ChurnPeriod::default());
        assert_eq!(boundary.date(), day(70));
        assert!(!boundary.is_churned(day(70)));
        assert!(boundary.is_churned(day(69)));
        assert!(!boundary.is_churned(day(100)));
    }

    #[test]
    fn classify_partitions_every_row_once() {
        let rows = vec![summary("a", 69), summary("b", 70), summary("c", 100), summary("d", 5)];
        let boundary = RecencyBoundary::from_global_max(day(100), ChurnPeriod::default());

        let split = classify(rows, boundary);
        let churned: Vec<_> = split.churned.iter().map(|r| r.customer_id.as_str()).collect();
        let active: Vec<_> = split.active.iter().map(|r| r.customer_id.as_str()).collect();
        assert_eq!(churned, vec!["a", "d"]);
        assert_eq!(active, vec!["b", "c"]);
        assert_eq!(split.len(), 4);
        assert_eq!(split.boundary, Some(boundary));
    }

    #[test]
    fn relabel_renames_profit_without_changing_it() {
        let boundary = RecencyBoundary::from_global_max(day(100), ChurnPeriod::default());
        let split = classify(vec![summary("a", 10), summary("b", 90)], boundary)
            .relabel::<ChurnedSummary, ActiveSummary>();

        assert_eq!(split.boundary, Some(day(70)));
        assert_eq!(split.churned[0].customer_id, "a");
        assert_eq!(split.churned[0].clv, 10.0);
        assert_eq!(split.active[0].customer_id, "b");
        assert_eq!(split.active[0].total_profit, 10.0);
    }

    #[test]
    fn labelled_columns_use_original_names() {
        let churned = serde_json::to_value(ChurnedSummary::from(summary("a", 1))).unwrap();
        assert!(churned.get("CLV").is_some());
        assert!(churned.get("Profit").is_none());

        let active = serde_json::to_value(ActiveSummary::from(summary("a", 1))).unwrap();
        assert!(active.get("Profit").is_some());
        assert!(active.get("CLV").is_none());
    }
}
