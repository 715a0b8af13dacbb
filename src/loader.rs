// 📂 Transaction Loader - CSV → typed records
// Boundary collaborator: all input validation lives here so the engine
// can assume well-formed records. Bad rows are collected with their line
// numbers instead of aborting the whole load.

use crate::customers::{Transaction, TransactionKind};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;

// ============================================================================
// RAW ROW
// ============================================================================

/// One CSV row before validation. All fields arrive as strings; conversion
/// happens in `parse_row` so each failure can name its line.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Customer_ID")]
    customer_id: String,

    #[serde(rename = "Date")]
    date: String,

    #[serde(rename = "Amount")]
    amount: String,

    #[serde(rename = "Type")]
    kind: String,

    #[serde(rename = "Previous_Amount")]
    #[serde(default)]
    previous_amount: Option<String>,
}

// ============================================================================
// LOAD OUTCOME
// ============================================================================

/// A row the loader rejected, with enough context to fix the source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based line in the source file (header is line 1)
    pub line: usize,
    pub message: String,
}

/// Result of loading one file: the good rows plus everything rejected
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub transactions: Vec<Transaction>,
    pub row_errors: Vec<RowError>,
}

impl LoadOutcome {
    pub fn has_errors(&self) -> bool {
        !self.row_errors.is_empty()
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Load a transaction CSV.
///
/// Expected header: Customer_ID, Date, Amount, Type, Previous_Amount
/// (Previous_Amount optional). Dates accept YYYY-MM-DD or MM/DD/YYYY;
/// amounts accept "$" and "," decorations.
///
/// Fails only when the file itself cannot be read or has no usable
/// header; individual bad rows land in `row_errors`.
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<LoadOutcome> {
    let mut reader = csv::Reader::from_path(path.as_ref())
        .with_context(|| format!("Failed to open transaction CSV: {:?}", path.as_ref()))?;

    let mut outcome = LoadOutcome::default();

    for (index, record) in reader.deserialize::<RawRow>().enumerate() {
        // +2: line 1 is the header, enumerate is 0-based
        let line = index + 2;

        let row = match record {
            Ok(row) => row,
            Err(err) => {
                outcome.row_errors.push(RowError {
                    line,
                    message: format!("Malformed row: {}", err),
                });
                continue;
            }
        };

        match parse_row(&row) {
            Ok(tx) => outcome.transactions.push(tx),
            Err(err) => outcome.row_errors.push(RowError {
                line,
                message: err.to_string(),
            }),
        }
    }

    Ok(outcome)
}

fn parse_row(row: &RawRow) -> Result<Transaction> {
    let customer_id = row.customer_id.trim();
    if customer_id.is_empty() {
        bail!("Missing customer id");
    }

    let effective_date = parse_date(&row.date)?;
    let revenue_amount = parse_amount(&row.amount)?;
    let kind: TransactionKind = row.kind.parse()?;

    let previous_revenue_amount = match row.previous_amount.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(parse_amount(raw)?),
        _ => None,
    };

    Ok(Transaction {
        customer_id: customer_id.to_string(),
        effective_date,
        revenue_amount,
        kind,
        previous_revenue_amount,
    })
}

/// Accepts YYYY-MM-DD (preferred) or MM/DD/YYYY
fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .with_context(|| format!("Unparseable date '{}' (expected YYYY-MM-DD or MM/DD/YYYY)", raw))
}

/// Accepts "1234.56", "$1,234.56", " 1234 "; rejects negatives
fn parse_amount(raw: &str) -> Result<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    let amount: f64 = cleaned
        .parse()
        .with_context(|| format!("Unparseable amount '{}'", raw))?;

    if amount < 0.0 {
        bail!("Negative amount '{}' (revenue amounts must be >= 0)", raw);
    }

    Ok(amount)
}

// ============================================================================
// TESTS
// ============================================================================
