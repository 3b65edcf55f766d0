//! Versioned column layouts for the churned/active outputs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    ChurnedSummary,
    ActiveSummary,
    ChurnedFeatures,
    ActiveFeatures,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChurnedSummary => "churned_summary",
            Self::ActiveSummary => "active_summary",
            Self::ChurnedFeatures => "churned_features",
            Self::ActiveFeatures => "active_features",
        }
    }

    fn profit_column(self) -> &'static str {
        match self {
            Self::ChurnedSummary | Self::ChurnedFeatures => "CLV",
            Self::ActiveSummary | Self::ActiveFeatures => "Profit",
        }
    }

    fn is_features(self) -> bool {
        matches!(self, Self::ChurnedFeatures | Self::ActiveFeatures)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    TextSet,
    /// Sparse period index → value mapping.
    PeriodMap,
}

impl ColumnType {
    fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::TextSet => "text_set",
            Self::PeriodMap => "period_map",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    pub dtype: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub kind: OutputKind,
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
}

/// Column order matches the serialized field order of the labelled row types.
pub fn build_output_schema(kind: OutputKind) -> TableSchema {
    let column = |name: &str, dtype| SchemaColumn {
        name: name.to_string(),
        dtype,
    };

    let columns = if kind.is_features() {
        vec![
            column("CustomerID", ColumnType::Text),
            column("Lifetime", ColumnType::Integer),
            column("Txs", ColumnType::Integer),
            column(kind.profit_column(), ColumnType::Float),
            column("Quantity", ColumnType::Integer),
            column("Purchases", ColumnType::TextSet),
            column("Txs_by_period", ColumnType::PeriodMap),
            column("Profit_by_period", ColumnType::PeriodMap),
            column("Quantity_by_period", ColumnType::PeriodMap),
        ]
    } else {
        vec![
            column("CustomerID", ColumnType::Text),
            column(kind.profit_column(), ColumnType::Float),
            column("Lifetime", ColumnType::Integer),
        ]
    };

    let fingerprint = schema_fingerprint(kind, &columns);

    debug!(
        component = "schema",
        event = "clv.schema.built",
        kind = kind.as_str(),
        version = OUTPUT_SCHEMA_VERSION,
        column_count = columns.len(),
        fingerprint = fingerprint
    );

    TableSchema {
        kind,
        version: OUTPUT_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

pub fn assert_schema_compatible(
    expected_version: u32,
    expected_fingerprint: &str,
    actual: &TableSchema,
) -> Result<(), SchemaError> {
    if expected_version != actual.version {
        return Err(SchemaError::VersionMismatch {
            expected: expected_version,
            actual: actual.version,
        });
    }

    if expected_fingerprint != actual.fingerprint {
        return Err(SchemaError::FingerprintMismatch {
            expected: expected_fingerprint.to_string(),
            actual: actual.fingerprint.clone(),
        });
    }

    Ok(())
}

fn schema_fingerprint(kind: OutputKind, columns: &[SchemaColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{OUTPUT_SCHEMA_VERSION};"));
    hasher.update(format!("kind:{};", kind.as_str()));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(format!(":{};", column.dtype.as_str()));
    }
    hex::encode(hasher.finalize())
}
