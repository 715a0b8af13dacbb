// 👥 Customer Aggregator - Transactions → per-customer summaries
// Groups the raw transaction stream by customer, orders each history
// chronologically, and derives current status (active/churned, revenue,
// acquisition date). Rebuilt from scratch on every analysis run.

use anyhow::bail;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// TRANSACTION
// ============================================================================

/// Kind of revenue event a transaction records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// First paid contract for a customer
    New,
    /// Revenue increase above the current amount
    Expansion,
    /// Revenue decrease (downgrade), customer stays active
    Contraction,
    /// Customer terminated; contributes zero revenue from this date on
    Churn,
    /// Contract renewed at the stated amount
    Renewal,
}

impl TransactionKind {
    pub fn name(&self) -> &str {
        match self {
            TransactionKind::New => "new",
            TransactionKind::Expansion => "expansion",
            TransactionKind::Contraction => "contraction",
            TransactionKind::Churn => "churn",
            TransactionKind::Renewal => "renewal",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "new" => Ok(TransactionKind::New),
            "expansion" | "upgrade" => Ok(TransactionKind::Expansion),
            "contraction" | "downgrade" => Ok(TransactionKind::Contraction),
            "churn" | "cancellation" => Ok(TransactionKind::Churn),
            "renewal" => Ok(TransactionKind::Renewal),
            other => bail!(
                "Unknown transaction kind '{}' (expected new, expansion, contraction, churn, or renewal)",
                other
            ),
        }
    }
}

/// A single revenue event. Immutable once parsed; the engine never
/// validates these fields (the loader already did).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: String,
    pub effective_date: NaiveDate,

    /// Monthly revenue amount in effect from `effective_date`
    pub revenue_amount: f64,

    pub kind: TransactionKind,

    /// Amount in effect before this event, when the source provides it
    pub previous_revenue_amount: Option<f64>,
}

// ============================================================================
// CUSTOMER SUMMARY
// ============================================================================

/// Derived per-customer view. Owned by the aggregator; recomputed fully on
/// every run, never incrementally patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,

    /// Date of the chronologically earliest transaction (acquisition date)
    pub first_transaction_date: NaiveDate,

    /// Full history, sorted ascending by effective date (stable on ties)
    pub transactions: Vec<Transaction>,

    /// Revenue in effect today: the latest transaction's amount, or 0 when
    /// the customer is churned
    pub current_revenue: f64,

    /// False iff the latest transaction is a churn event or carries zero revenue
    pub is_active: bool,

    /// Assigned by the cohort grouper; None until grouping runs
    pub cohort_label: Option<String>,
}

impl CustomerSummary {
    /// Latest transaction with effective_date <= `date`, if any
    ///
    /// Histories are sorted ascending, so this is the last matching entry.
    pub fn latest_on_or_before(&self, date: NaiveDate) -> Option<&Transaction> {
        self.transactions
            .iter()
            .rev()
            .find(|tx| tx.effective_date <= date)
    }

    /// First transaction of kind `new`, regardless of amount
    pub fn first_new_transaction(&self) -> Option<&Transaction> {
        self.transactions
            .iter()
            .find(|tx| tx.kind == TransactionKind::New)
    }

    /// Original acquisition amount: the first `new` transaction with a
    /// positive revenue amount. Used as the clipping ceiling when
    /// expansion revenue is excluded.
    pub fn original_new_revenue(&self) -> Option<f64> {
        self.transactions
            .iter()
            .find(|tx| tx.kind == TransactionKind::New && tx.revenue_amount > 0.0)
            .map(|tx| tx.revenue_amount)
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group transactions by customer id and derive one summary per customer.
///
/// Output order follows first appearance of each customer id in the input,
/// so identical inputs always yield identical output. Within a customer the
/// history is sorted ascending by date; transactions on the same date keep
/// their original relative order (stable sort).
///
/// This stage never rejects data - malformed input is filtered upstream.
pub fn aggregate_customers(transactions: &[Transaction]) -> Vec<CustomerSummary> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_customer: HashMap<&str, Vec<Transaction>> = HashMap::new();

    for tx in transactions {
        let entry = by_customer.entry(tx.customer_id.as_str()).or_default();
        if entry.is_empty() {
            order.push(tx.customer_id.as_str());
        }
        entry.push(tx.clone());
    }

    order
        .into_iter()
        .map(|customer_id| {
            let mut history = by_customer
                .remove(customer_id)
                .unwrap_or_default();
            history.sort_by_key(|tx| tx.effective_date);
            summarize(customer_id, history)
        })
        .collect()
}

fn summarize(customer_id: &str, history: Vec<Transaction>) -> CustomerSummary {
    // Grouping guarantees at least one transaction per customer
    let first_transaction_date = history
        .first()
        .map(|tx| tx.effective_date)
        .unwrap_or_default();

    let (current_revenue, is_active) = match history.last() {
        Some(last) if last.kind != TransactionKind::Churn && last.revenue_amount != 0.0 => {
            (last.revenue_amount, true)
        }
        _ => (0.0, false),
    };

    CustomerSummary {
        customer_id: customer_id.to_string(),
        first_transaction_date,
        transactions: history,
        current_revenue,
        is_active,
        cohort_label: None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
