//! Writing labelled outputs to disk.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::schema::TableSchema;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

/// Writes flat rows as CSV. The header comes from `schema`, so an empty
/// slice still produces a header line.
pub fn write_summary_csv<T: Serialize>(
    path: &Path,
    schema: &TableSchema,
    rows: &[T],
) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(schema.column_names())?;
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;

    write_atomic(path, &bytes)?;
    log_export(path, "csv", rows.len());
    Ok(())
}

/// Writes one JSON object per line. Period maps become objects keyed by
/// period index.
pub fn write_features_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut bytes = Vec::new();
    for row in rows {
        serde_json::to_writer(&mut bytes, row)?;
        bytes.push(b'\n');
    }

    write_atomic(path, &bytes)?;
    log_export(path, "jsonl", rows.len());
    Ok(())
}

pub fn write_schema_json(path: &Path, schemas: &[TableSchema]) -> Result<(), ExportError> {
    let bytes = serde_json::to_vec_pretty(schemas)?;
    write_atomic(path, &bytes)?;
    log_export(path, "schema", schemas.len());
    Ok(())
}

fn log_export(path: &Path, format: &str, rows: usize) {
    info!(
        component = "export",
        event = "clv.export.finish",
        path = %path.display(),
        format,
        rows
    );
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ExportError::InvalidPath(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::churn::{ActiveSummary, ChurnedSummary};
    use crate::schema::{build_output_schema, OutputKind};

    #[test]
    fn empty_summary_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("churned.csv");
        let schema = build_output_schema(OutputKind::ChurnedSummary);

        write_summary_csv::<ChurnedSummary>(&path, &schema, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "CustomerID,CLV,Lifetime\n");
        assert!(!dir.path().join("churned.csv.tmp").exists());
    }

    #[test]
    fn summary_rows_follow_schema_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.csv");
        let schema = build_output_schema(OutputKind::ActiveSummary);
        let rows = vec![ActiveSummary {
            customer_id: "17850".to_string(),
            total_profit: 12.5,
            lifetime_periods: 3,
        }];

        write_summary_csv(&path, &schema, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "CustomerID,Profit,Lifetime\n17850,12.5,3\n"
        );
    }
}
