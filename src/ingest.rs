//! Loading transaction tables from CSV exports and SQLite stores.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use crate::pipeline::ClvError;
use crate::table::Table;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("invalid table name: {0}")]
    InvalidTableName(String),
    #[error(transparent)]
    Table(#[from] ClvError),
}

pub fn load_csv_table(path: &Path) -> Result<Table, LoadError> {
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_csv_table(file)?;

    info!(
        component = "ingest",
        event = "clv.load.finish",
        source = "csv",
        path = %path.display(),
        columns = table.headers().len(),
        rows = table.len()
    );

    Ok(table)
}

/// Reads a headered CSV stream. Header names are trimmed; cell values are
/// kept verbatim.
pub fn read_csv_table<R: Read>(reader: R) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table::new(headers, rows)?)
}

/// Reads every column of `table_name`. Numbers are rendered as text and
/// NULL becomes an empty cell.
pub fn load_sqlite_table(path: &Path, table_name: &str) -> Result<Table, LoadError> {
    if !is_plain_identifier(table_name) {
        return Err(LoadError::InvalidTableName(table_name.to_string()));
    }

    let conn = Connection::open(path)?;
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{table_name}\""))?;
    let headers: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let column_count = headers.len();

    let mut query = stmt.query([])?;
    let mut rows = Vec::new();
    while let Some(row) = query.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(render_value(row.get_ref(idx)?));
        }
        rows.push(values);
    }

    let table = Table::new(headers, rows)?;

    info!(
        component = "ingest",
        event = "clv.load.finish",
        source = "sqlite",
        path = %path.display(),
        table = table_name,
        columns = table.headers().len(),
        rows = table.len()
    );

    Ok(table)
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(v) => v.to_string(),
        ValueRef::Real(v) => v.to_string(),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).to_string(),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
