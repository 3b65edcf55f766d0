//! Column-named transaction table at the API edge.
//!
//! Values stay as raw strings until [`Table::transactions`] resolves the
//! configured columns and parses only the fields a pipeline needs.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::pipeline::ClvError;
use crate::transaction::Transaction;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Input column names. Defaults follow the Online Retail export layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionColumns {
    pub date_col: String,
    pub id_col: String,
    pub profit_col: String,
    pub quantity_col: String,
    pub stock_code_col: String,
}

impl Default for TransactionColumns {
    fn default() -> Self {
        Self {
            date_col: "InvoiceDate".to_string(),
            id_col: "CustomerID".to_string(),
            profit_col: "Profit".to_string(),
            quantity_col: "Quantity".to_string(),
            stock_code_col: "StockCode".to_string(),
        }
    }
}

impl TransactionColumns {
    /// Mapped names of the columns `fields` reads, keyed by setting name.
    pub(crate) fn names_for(&self, fields: TransactionFields) -> Vec<(&'static str, &str)> {
        let mut names = vec![
            ("date_col", self.date_col.as_str()),
            ("id_col", self.id_col.as_str()),
        ];
        if fields.needs_profit() {
            names.push(("profit_col", self.profit_col.as_str()));
        }
        if fields.needs_items() {
            names.push(("quantity_col", self.quantity_col.as_str()));
            names.push(("stock_code_col", self.stock_code_col.as_str()));
        }
        names
    }
}

/// Which columns a pipeline reads. Columns outside the set may be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFields {
    /// Date and customer id.
    Periods,
    /// Date, customer id, and profit.
    Summary,
    /// Every column, including quantity and stock code.
    Features,
}

impl TransactionFields {
    fn needs_profit(self) -> bool {
        matches!(self, Self::Summary | Self::Features)
    }

    fn needs_items(self) -> bool {
        matches!(self, Self::Features)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedColumns {
    date: usize,
    id: usize,
    profit: Option<usize>,
    quantity: Option<usize>,
    stock_code: Option<usize>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ClvError> {
        for (idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(ClvError::RaggedRow {
                    row: idx + 1,
                    found: row.len(),
                    expected: headers.len(),
                });
            }
        }
        Ok(Self { headers, rows })
    }

    /// Builds a table holding `transactions` under the given column names.
    pub fn from_transactions(transactions: &[Transaction], columns: &TransactionColumns) -> Self {
        let headers = vec![
            columns.date_col.clone(),
            columns.id_col.clone(),
            columns.profit_col.clone(),
            columns.quantity_col.clone(),
            columns.stock_code_col.clone(),
        ];
        let rows = transactions
            .iter()
            .map(|tx| {
                vec![
                    tx.date.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
                    tx.customer_id.clone(),
                    tx.profit.to_string(),
                    tx.quantity.to_string(),
                    tx.stock_code.clone(),
                ]
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ClvError> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| ClvError::MissingColumn {
                column: name.to_string(),
            })
    }

    /// Checks that every column `fields` needs is present, before any row is read.
    pub fn validate_columns(
        &self,
        columns: &TransactionColumns,
        fields: TransactionFields,
    ) -> Result<(), ClvError> {
        self.resolve(columns, fields).map(|_| ())
    }

    /// Parses every row into a [`Transaction`]. Fields outside `fields` take
    /// neutral values (zero profit and quantity, empty stock code).
    pub fn transactions(
        &self,
        columns: &TransactionColumns,
        fields: TransactionFields,
    ) -> Result<Vec<Transaction>, ClvError> {
        let resolved = self.resolve(columns, fields)?;

        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| parse_row(idx + 1, row, columns, resolved))
            .collect()
    }

    fn resolve(
        &self,
        columns: &TransactionColumns,
        fields: TransactionFields,
    ) -> Result<ResolvedColumns, ClvError> {
        let optional = |needed: bool, name: &str| -> Result<Option<usize>, ClvError> {
            if needed {
                self.column_index(name).map(Some)
            } else {
                Ok(None)
            }
        };

        Ok(ResolvedColumns {
            date: self.column_index(&columns.date_col)?,
            id: self.column_index(&columns.id_col)?,
            profit: optional(fields.needs_profit(), &columns.profit_col)?,
            quantity: optional(fields.needs_items(), &columns.quantity_col)?,
            stock_code: optional(fields.needs_items(), &columns.stock_code_col)?,
        })
    }
}

fn parse_row(
    row_number: usize,
    row: &[String],
    columns: &TransactionColumns,
    resolved: ResolvedColumns,
) -> Result<Transaction, ClvError> {
    let cell = |idx: usize| row.get(idx).map(|raw| raw.trim()).unwrap_or_default();
    let invalid = |column: &str, value: &str| ClvError::InvalidValue {
        row: row_number,
        column: column.to_string(),
        value: value.to_string(),
    };

    let raw_date = cell(resolved.date);
    let date = parse_datetime(raw_date).ok_or_else(|| invalid(&columns.date_col, raw_date))?;

    let customer_id = cell(resolved.id);
    if customer_id.is_empty() {
        return Err(invalid(&columns.id_col, customer_id));
    }

    let profit = match resolved.profit {
        Some(idx) => {
            let raw = cell(idx);
            raw.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| invalid(&columns.profit_col, raw))?
        }
        None => 0.0,
    };

    let quantity = match resolved.quantity {
        Some(idx) => {
            let raw = cell(idx);
            raw.parse::<i64>()
                .map_err(|_| invalid(&columns.quantity_col, raw))?
        }
        None => 0,
    };

    let stock_code = resolved
        .stock_code
        .map(|idx| cell(idx).to_string())
        .unwrap_or_default();

    Ok(Transaction {
        customer_id: customer_id.to_string(),
        date,
        profit,
        quantity,
        stock_code,
    })
}

/// Parses the timestamp layouts seen in transaction exports. Bare dates
/// resolve to midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}
