//! Rolls period buckets up into one feature row per customer.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::aggregate::PeriodBucket;
use crate::grouping::group_reduce;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub customer_id: String,
    /// Highest period index with at least one transaction.
    pub lifetime_periods: u32,
    pub tx_count: u64,
    pub profit_total: f64,
    pub quantity_total: i64,
    pub purchased_items: BTreeSet<String>,
    pub tx_by_period: BTreeMap<u32, u64>,
    pub profit_by_period: BTreeMap<u32, f64>,
    pub quantity_by_period: BTreeMap<u32, i64>,
    pub last_transaction_date: NaiveDateTime,
}

impl CustomerFeatures {
    fn seed(bucket: &PeriodBucket) -> Self {
        Self {
            customer_id: bucket.customer_id.clone(),
            lifetime_periods: bucket.period_index,
            tx_count: bucket.tx_count,
            profit_total: bucket.profit_sum,
            quantity_total: bucket.quantity_sum,
            purchased_items: bucket.purchased_items.clone(),
            tx_by_period: BTreeMap::from([(bucket.period_index, bucket.tx_count)]),
            profit_by_period: BTreeMap::from([(bucket.period_index, bucket.profit_sum)]),
            quantity_by_period: BTreeMap::from([(bucket.period_index, bucket.quantity_sum)]),
            last_transaction_date: bucket.bucket_end_date,
        }
    }

    fn absorb(&mut self, bucket: &PeriodBucket) {
        let period = bucket.period_index;
        self.lifetime_periods = self.lifetime_periods.max(period);
        self.tx_count += bucket.tx_count;
        self.profit_total += bucket.profit_sum;
        self.quantity_total = self.quantity_total.saturating_add(bucket.quantity_sum);
        self.purchased_items
            .extend(bucket.purchased_items.iter().cloned());
        // A repeated (customer, period) pair folds into the existing entry so the
        // per-period maps keep summing to the totals.
        *self.tx_by_period.entry(period).or_insert(0) += bucket.tx_count;
        *self.profit_by_period.entry(period).or_insert(0.0) += bucket.profit_sum;
        let quantity = self.quantity_by_period.entry(period).or_insert(0);
        *quantity = quantity.saturating_add(bucket.quantity_sum);
        self.last_transaction_date = self.last_transaction_date.max(bucket.bucket_end_date);
    }
}

/// One feature row per customer, ordered by customer id.
pub fn rollup_customers(buckets: &[PeriodBucket]) -> Vec<CustomerFeatures> {
    group_reduce(
        buckets,
        |bucket| bucket.customer_id.as_str(),
        CustomerFeatures::seed,
        CustomerFeatures::absorb,
    )
    .into_values()
    .collect()
}
