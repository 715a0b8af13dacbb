// 🗂️ Cohort Grouper - Customers → acquisition cohorts
// Partitions customer summaries into cohorts keyed by the label of their
// acquisition bucket. Membership is fixed for the run: only the first
// transaction date decides the cohort, later transactions never move a
// customer.

use crate::customers::{CustomerSummary, TransactionKind};
use crate::periods::{self, CohortGranularity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// COHORT
// ============================================================================

/// A group of customers acquired in the same period bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    /// Display label, e.g. "2023-05", "Q2 2023", "2023"
    pub label: String,

    /// First day of the acquisition bucket
    pub bucket_start_date: NaiveDate,

    /// Sum of each member's first `new` transaction amount (0 when a
    /// member has none)
    pub initial_revenue: f64,

    pub members: Vec<CustomerSummary>,

    /// Retained revenue per month offset, index 0..=horizon.
    /// Empty until the retention calculator fills it.
    pub retention_by_month: Vec<f64>,
}

impl Cohort {
    fn new(label: String, bucket_start_date: NaiveDate) -> Self {
        Cohort {
            label,
            bucket_start_date,
            initial_revenue: 0.0,
            members: Vec::new(),
            retention_by_month: Vec::new(),
        }
    }

    /// Retained revenue at a month offset, if computed
    pub fn retention_at(&self, offset: usize) -> Option<f64> {
        self.retention_by_month.get(offset).copied()
    }

    /// NRR at a month offset as a percentage of initial revenue.
    /// None when the offset is out of range or initial revenue is zero.
    pub fn retention_percent(&self, offset: usize) -> Option<f64> {
        if self.initial_revenue <= 0.0 {
            return None;
        }
        self.retention_at(offset)
            .map(|revenue| revenue / self.initial_revenue * 100.0)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

// ============================================================================
// GROUPING
// ============================================================================

/// Partition summaries into cohorts by acquisition bucket.
///
/// Takes ownership of the summaries: each one gets its `cohort_label`
/// filled in as it moves into its cohort, so no shared summary is ever
/// mutated in place. Cohorts are created lazily on first encounter and
/// returned in first-encounter order; the result assembler sorts them
/// chronologically later.
pub fn group_into_cohorts(
    summaries: Vec<CustomerSummary>,
    granularity: CohortGranularity,
) -> Vec<Cohort> {
    let mut order: Vec<String> = Vec::new();
    let mut by_label: HashMap<String, Cohort> = HashMap::new();

    for mut summary in summaries {
        let bucket = periods::bucket_start(summary.first_transaction_date, granularity);
        let label = periods::label(bucket, granularity);

        summary.cohort_label = Some(label.clone());

        let cohort = by_label.entry(label.clone()).or_insert_with(|| {
            order.push(label.clone());
            Cohort::new(label, bucket)
        });
        cohort.members.push(summary);
    }

    order
        .into_iter()
        .filter_map(|label| by_label.remove(&label))
        .map(|mut cohort| {
            cohort.initial_revenue = initial_revenue(&cohort.members);
            cohort
        })
        .collect()
}

/// Sum of each member's first `new` transaction amount.
/// A member with no `new` transaction contributes 0 - a degenerate but
/// valid data shape, not an error.
fn initial_revenue(members: &[CustomerSummary]) -> f64 {
    members
        .iter()
        .map(|member| {
            member
                .transactions
                .iter()
                .find(|tx| tx.kind == TransactionKind::New)
                .map(|tx| tx.revenue_amount)
                .unwrap_or(0.0)
        })
        .sum()
}

// ============================================================================
// TESTS
// ============================================================================
