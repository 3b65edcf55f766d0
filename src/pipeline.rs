//! Public CLV operations: summary-level `calculate`, `assign_periods`, and the
//! full `engineer_features` rollup, each over a [`Table`] or typed slices.

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::aggregate::aggregate_periods;
use crate::churn::{
    classify, ActiveFeatures, ActiveSummary, ChurnedFeatures, ChurnedSummary,
    LabelledSplit, RecencyBoundary,
};
use crate::period::{assign_transaction_periods, ChurnPeriod};
use crate::rollup::rollup_customers;
use crate::summary::summarize_customers;
use crate::table::{Table, TransactionColumns, TransactionFields};
use crate::transaction::{global_max_date, Transaction};

pub const DEFAULT_OUTPUT_DIR: &str = "out";

pub type CalculateOutput = LabelledSplit<ChurnedSummary, ActiveSummary>;
pub type FeaturesOutput = LabelledSplit<ChurnedFeatures, ActiveFeatures>;

#[derive(Debug, Error)]
pub enum ClvError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("missing column: {column}")]
    MissingColumn { column: String },
    #[error("invalid value '{value}' in column {column} at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        found: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClvConfig {
    pub churn_period: ChurnPeriod,
    pub columns: TransactionColumns,
}

/// Reads `CLV_CHURN_PERIOD_DAYS` and the `CLV_*_COL` overrides. Unset or
/// blank variables keep their defaults; a churn period that does not parse
/// to a positive day count is rejected.
pub fn clv_config_from_env() -> Result<ClvConfig, ClvError> {
    let mut config = ClvConfig::default();

    if let Some(raw) = non_blank_env("CLV_CHURN_PERIOD_DAYS") {
        let days = raw.parse::<i64>().map_err(|_| {
            ClvError::InvalidConfiguration(format!(
                "CLV_CHURN_PERIOD_DAYS must be an integer, got '{raw}'"
            ))
        })?;
        config.churn_period = ChurnPeriod::from_days(days)?;
    }

    let overrides = [
        ("CLV_DATE_COL", &mut config.columns.date_col),
        ("CLV_ID_COL", &mut config.columns.id_col),
        ("CLV_PROFIT_COL", &mut config.columns.profit_col),
        ("CLV_QUANTITY_COL", &mut config.columns.quantity_col),
        ("CLV_STOCK_CODE_COL", &mut config.columns.stock_code_col),
    ];
    for (key, slot) in overrides {
        if let Some(value) = non_blank_env(key) {
            *slot = value;
        }
    }

    Ok(config)
}

/// Output directory from `CLV_OUTPUT_DIR`, or `out` when unset or blank.
pub fn output_dir_from_env() -> PathBuf {
    non_blank_env("CLV_OUTPUT_DIR")
        .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from)
}

/// Checks the column mapping for the columns `fields` reads. Columns outside
/// that set may be blank or reuse a name. [`ChurnPeriod`] is nonzero by
/// construction.
pub fn validate_config(cfg: &ClvConfig, fields: TransactionFields) -> Result<(), ClvError> {
    let mut seen = HashSet::new();
    for (field, name) in cfg.columns.names_for(fields) {
        if name.trim().is_empty() {
            return Err(ClvError::InvalidConfiguration(format!(
                "{field} must not be blank"
            )));
        }
        if !seen.insert(name) {
            return Err(ClvError::InvalidConfiguration(format!(
                "{field} '{name}' is mapped to more than one input field"
            )));
        }
    }

    Ok(())
}

/// Per-customer profit and lifetime, split into churned (CLV) and active
/// (running profit).
pub fn calculate(table: &Table, cfg: &ClvConfig) -> Result<CalculateOutput, ClvError> {
    let transactions = load_validated(table, cfg, TransactionFields::Summary)?;
    Ok(calculate_transactions(&transactions, cfg.churn_period))
}

pub fn calculate_transactions(transactions: &[Transaction], period: ChurnPeriod) -> CalculateOutput {
    info!(
        component = "pipeline",
        event = "clv.calculate.start",
        transactions = transactions.len(),
        churn_period_days = period.days()
    );

    let output: CalculateOutput = match boundary_for(transactions, period) {
        Some(boundary) => classify(summarize_customers(transactions, period), boundary).relabel(),
        None => LabelledSplit::empty(),
    };

    info!(
        component = "pipeline",
        event = "clv.calculate.finish",
        churned = output.churned.len(),
        active = output.active.len()
    );

    output
}

/// Period index of every row, in input row order.
pub fn assign_periods(table: &Table, cfg: &ClvConfig) -> Result<Vec<u32>, ClvError> {
    let transactions = load_validated(table, cfg, TransactionFields::Periods)?;
    Ok(assign_transaction_periods(&transactions, cfg.churn_period))
}

/// Full feature rollup split into churned and active customers.
pub fn engineer_features(table: &Table, cfg: &ClvConfig) -> Result<FeaturesOutput, ClvError> {
    let transactions = load_validated(table, cfg, TransactionFields::Features)?;
    Ok(engineer_transaction_features(
        &transactions,
        cfg.churn_period,
    ))
}

pub fn engineer_transaction_features(
    transactions: &[Transaction],
    period: ChurnPeriod,
) -> FeaturesOutput {
    info!(
        component = "pipeline",
        event = "clv.features.start",
        transactions = transactions.len(),
        churn_period_days = period.days()
    );

    let output: FeaturesOutput = match boundary_for(transactions, period) {
        Some(boundary) => {
            let buckets = aggregate_periods(transactions, period);
            let features = rollup_customers(&buckets);
            info!(
                component = "pipeline",
                event = "clv.features.rollup",
                buckets = buckets.len(),
                customers = features.len()
            );
            classify(features, boundary).relabel()
        }
        None => LabelledSplit::empty(),
    };

    info!(
        component = "pipeline",
        event = "clv.features.finish",
        churned = output.churned.len(),
        active = output.active.len()
    );

    output
}

fn load_validated(
    table: &Table,
    cfg: &ClvConfig,
    fields: TransactionFields,
) -> Result<Vec<Transaction>, ClvError> {
    let checked =
        validate_config(cfg, fields).and_then(|_| table.validate_columns(&cfg.columns, fields));
    if let Err(err) = &checked {
        warn!(
            component = "pipeline",
            event = "clv.config.invalid",
            error = %err
        );
    }
    checked?;
    table.transactions(&cfg.columns, fields)
}

fn boundary_for(transactions: &[Transaction], period: ChurnPeriod) -> Option<RecencyBoundary> {
    let global_max = global_max_date(transactions)?;
    let boundary = RecencyBoundary::from_global_max(global_max, period);
    info!(
        component = "pipeline",
        event = "clv.churn.boundary",
        global_max_date = %global_max,
        boundary = %boundary.date()
    );
    Some(boundary)
}

fn non_blank_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
