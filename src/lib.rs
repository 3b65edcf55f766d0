//! Customer lifetime value feature engineering.
//!
//! Current implemented scope:
//! - summary-level CLV / running profit per customer (`calculate`)
//! - customer-relative period assignment (`assign_periods`)
//! - period-bucketed feature rollup (`engineer_features`)
//! - churned/active split against one global recency boundary
//! - CSV / SQLite ingestion and CSV / JSONL export for the batch driver

mod aggregate;
mod churn;
mod export;
mod grouping;
mod ingest;
mod observability;
mod period;
mod pipeline;
mod rollup;
mod schema;
mod summary;
mod table;
mod transaction;

pub use aggregate::{aggregate_periods, PeriodBucket};
pub use churn::{
    classify, ActiveFeatures, ActiveSummary, ChurnSplit, ChurnedFeatures, ChurnedSummary,
    LabelledSplit, LastActivity, RecencyBoundary,
};
pub use export::{write_features_jsonl, write_schema_json, write_summary_csv, ExportError};
pub use ingest::{load_csv_table, load_sqlite_table, read_csv_table, LoadError};
pub use observability::{
    init_logging, log_run_finish, log_run_start, log_source_selected, logging_config_from_env,
    LogFormat, LoggingConfig, LoggingInitError,
};
pub use period::{
    assign_transaction_periods, customer_start_dates, period_index, ChurnPeriod,
    DEFAULT_CHURN_PERIOD_DAYS,
};
pub use pipeline::{
    assign_periods, calculate, calculate_transactions, clv_config_from_env, engineer_features,
    engineer_transaction_features, output_dir_from_env, validate_config, CalculateOutput,
    ClvConfig, ClvError, FeaturesOutput, DEFAULT_OUTPUT_DIR,
};
pub use rollup::{rollup_customers, CustomerFeatures};
pub use schema::{
    assert_schema_compatible, build_output_schema, ColumnType, OutputKind, SchemaColumn,
    SchemaError, TableSchema, OUTPUT_SCHEMA_VERSION,
};
pub use summary::{summarize_customers, CustomerSummary};
pub use table::{parse_datetime, Table, TransactionColumns, TransactionFields};
pub use transaction::{global_max_date, Transaction};
