// 📈 Retention Engine - Cohort × month retained revenue
// The deterministic core: for every cohort and every month offset up to
// the horizon, sums the revenue each member still contributes as of that
// offset, honoring the analysis settings. No randomness anywhere - the
// same input always produces the same report.

use crate::cohorts::{group_into_cohorts, Cohort};
use crate::customers::{aggregate_customers, CustomerSummary, Transaction, TransactionKind};
use crate::periods::{self, CohortGranularity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed upper bound on tracked month offsets
pub const RETENTION_HORIZON_MONTHS: u32 = 24;

// ============================================================================
// SETTINGS
// ============================================================================

/// Analysis toggles - pure configuration, no hidden state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// When false, a customer's contribution is clipped at their original
    /// acquisition amount - expansion above it never counts, reductions
    /// below it still do
    pub include_expansion_revenue: bool,

    /// Intended to drop churned accounts from the analysis entirely.
    /// Currently a no-op on the deterministic path: a churned customer
    /// already contributes 0 on both branches. Kept so callers and saved
    /// configurations round-trip unchanged; see DESIGN.md.
    pub exclude_churned_accounts: bool,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        AnalysisSettings {
            include_expansion_revenue: true,
            exclude_churned_accounts: false,
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Final analysis output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Cohorts sorted ascending by bucket start date
    pub cohorts: Vec<Cohort>,

    /// Greatest month offset at which any cohort still shows revenue > 0,
    /// capped at the horizon. 0 for an empty dataset.
    pub max_months: u32,
}

impl AnalysisReport {
    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }

    pub fn customer_count(&self) -> usize {
        self.cohorts.iter().map(|c| c.member_count()).sum()
    }

    pub fn total_initial_revenue(&self) -> f64 {
        self.cohorts.iter().map(|c| c.initial_revenue).sum()
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct RetentionEngine {
    settings: AnalysisSettings,
}

impl RetentionEngine {
    pub fn new(settings: AnalysisSettings) -> Self {
        RetentionEngine { settings }
    }

    /// Run the full pipeline: aggregate → group → compute → assemble.
    ///
    /// A pure function of its inputs. An empty transaction set yields an
    /// empty report, not an error.
    pub fn analyze(
        &self,
        transactions: &[Transaction],
        granularity: CohortGranularity,
    ) -> AnalysisReport {
        let summaries = aggregate_customers(transactions);
        let mut cohorts = group_into_cohorts(summaries, granularity);

        for cohort in &mut cohorts {
            self.fill_retention(cohort);
        }

        let max_months = max_populated_offset(&cohorts);

        // Stable ascending sort; equal bucket dates cannot occur under the
        // current grouping rules but the order must stay deterministic anyway
        cohorts.sort_by_key(|c| c.bucket_start_date);

        AnalysisReport { cohorts, max_months }
    }

    /// Fill `retention_by_month` for offsets 0..=horizon.
    ///
    /// Offset 0 is the cohort's initial revenue by construction. For
    /// offset m >= 1 the target date is the bucket start advanced by m
    /// calendar months (always the 1st - day-of-month is deliberately
    /// dropped from the arithmetic).
    fn fill_retention(&self, cohort: &mut Cohort) {
        let mut retention = Vec::with_capacity(RETENTION_HORIZON_MONTHS as usize + 1);
        retention.push(cohort.initial_revenue);

        for offset in 1..=RETENTION_HORIZON_MONTHS {
            let target = periods::advance_months(cohort.bucket_start_date, offset);
            let total: f64 = cohort
                .members
                .iter()
                .map(|member| self.member_contribution(member, target))
                .sum();
            retention.push(total);
        }

        cohort.retention_by_month = retention;
    }

    /// Revenue one member contributes as of `target`.
    ///
    /// The chronologically latest transaction at-or-before the target date
    /// decides. A churn transaction zeroes the contribution on both
    /// settings branches (preserved legacy behavior, see DESIGN.md).
    fn member_contribution(&self, member: &CustomerSummary, target: NaiveDate) -> f64 {
        let latest = match member.latest_on_or_before(target) {
            Some(tx) => tx,
            None => return 0.0,
        };

        if latest.kind == TransactionKind::Churn {
            return 0.0;
        }

        let mut revenue = latest.revenue_amount;

        if !self.settings.include_expansion_revenue {
            if let Some(original) = member.original_new_revenue() {
                // Clip growth above the acquisition amount; contractions
                // below it pass through unchanged
                revenue = revenue.min(original);
            }
        }

        revenue.max(0.0)
    }
}

/// Greatest offset at which any cohort still shows revenue > 0
fn max_populated_offset(cohorts: &[Cohort]) -> u32 {
    let mut max_months = 0u32;
    for cohort in cohorts {
        for (offset, value) in cohort.retention_by_month.iter().enumerate() {
            if *value > 0.0 && offset as u32 > max_months {
                max_months = offset as u32;
            }
        }
    }
    max_months.min(RETENTION_HORIZON_MONTHS)
}

/// Convenience entry point: one-shot analysis with the given settings
pub fn analyze(
    transactions: &[Transaction],
    granularity: CohortGranularity,
    settings: &AnalysisSettings,
) -> AnalysisReport {
    RetentionEngine::new(*settings).analyze(transactions, granularity)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(customer: &str, d: NaiveDate, amount: f64, kind: TransactionKind) -> Transaction {
        Transaction {
            customer_id: customer.to_string(),
            effective_date: d,
            revenue_amount: amount,
            kind,
            previous_revenue_amount: None,
        }
    }

    fn expansion_scenario() -> Vec<Transaction> {
        vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("A", date(2023, 4, 1), 1500.0, TransactionKind::Expansion),
        ]
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let report = analyze(&[], CohortGranularity::Month, &AnalysisSettings::default());

        assert!(report.is_empty());
        assert_eq!(report.max_months, 0);
    }

    #[test]
    fn test_quarter_cohort_with_expansion() {
        let report = analyze(
            &expansion_scenario(),
            CohortGranularity::Quarter,
            &AnalysisSettings::default(),
        );

        assert_eq!(report.cohorts.len(), 1);
        let cohort = &report.cohorts[0];
        assert_eq!(cohort.label, "Q1 2023");
        assert_eq!(cohort.initial_revenue, 1000.0);

        // Offsets 1-2 (Feb, Mar): the Jan "new" is still the latest
        assert_eq!(cohort.retention_by_month[0], 1000.0);
        assert_eq!(cohort.retention_by_month[1], 1000.0);
        assert_eq!(cohort.retention_by_month[2], 1000.0);
        // Offset 3 targets 2023-04-01, the expansion lands exactly there
        assert_eq!(cohort.retention_by_month[3], 1500.0);
        assert_eq!(cohort.retention_by_month[24], 1500.0);

        assert_eq!(report.max_months, 24);
    }

    #[test]
    fn test_expansion_clipped_when_excluded() {
        let settings = AnalysisSettings {
            include_expansion_revenue: false,
            exclude_churned_accounts: false,
        };
        let report = analyze(&expansion_scenario(), CohortGranularity::Quarter, &settings);

        let cohort = &report.cohorts[0];
        // Clipped back to the original acquisition amount from offset 3 on
        assert_eq!(cohort.retention_by_month[3], 1000.0);
        assert_eq!(cohort.retention_by_month[24], 1000.0);
    }

    #[test]
    fn test_contraction_not_clipped_upward() {
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("A", date(2023, 3, 1), 600.0, TransactionKind::Contraction),
        ];
        let settings = AnalysisSettings {
            include_expansion_revenue: false,
            exclude_churned_accounts: false,
        };
        let report = analyze(&txs, CohortGranularity::Month, &settings);

        // min(600, 1000) = 600: the clip only caps growth, never raises
        assert_eq!(report.cohorts[0].retention_by_month[2], 600.0);
    }

    #[test]
    fn test_churn_zeroes_from_its_month_on() {
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("A", date(2023, 6, 1), 0.0, TransactionKind::Churn),
        ];

        for exclude_churned in [false, true] {
            let settings = AnalysisSettings {
                include_expansion_revenue: true,
                exclude_churned_accounts: exclude_churned,
            };
            let report = analyze(&txs, CohortGranularity::Month, &settings);
            let cohort = &report.cohorts[0];

            for offset in 0..=4 {
                assert_eq!(cohort.retention_by_month[offset], 1000.0, "offset {}", offset);
            }
            for offset in 5..=24 {
                assert_eq!(cohort.retention_by_month[offset], 0.0, "offset {}", offset);
            }
            assert_eq!(report.max_months, 4);
        }
    }

    #[test]
    fn test_reactivation_after_churn() {
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("A", date(2023, 3, 1), 0.0, TransactionKind::Churn),
            tx("A", date(2023, 8, 1), 800.0, TransactionKind::Renewal),
        ];
        let report = analyze(&txs, CohortGranularity::Month, &AnalysisSettings::default());
        let cohort = &report.cohorts[0];

        assert_eq!(cohort.retention_by_month[2], 0.0);
        assert_eq!(cohort.retention_by_month[6], 0.0);
        // The later renewal supersedes the churn
        assert_eq!(cohort.retention_by_month[7], 800.0);
    }

    #[test]
    fn test_month_zero_equals_initial_revenue() {
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("B", date(2023, 2, 1), 500.0, TransactionKind::New),
            tx("C", date(2023, 7, 1), 250.0, TransactionKind::New),
        ];
        let report = analyze(&txs, CohortGranularity::Quarter, &AnalysisSettings::default());

        for cohort in &report.cohorts {
            assert_eq!(cohort.retention_by_month[0], cohort.initial_revenue);
        }
    }

    #[test]
    fn test_all_values_non_negative() {
        // A contraction with a negative amount must never push a cohort
        // below zero
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("A", date(2023, 5, 1), -200.0, TransactionKind::Contraction),
            tx("B", date(2023, 1, 15), 300.0, TransactionKind::New),
        ];
        let report = analyze(&txs, CohortGranularity::Month, &AnalysisSettings::default());

        for cohort in &report.cohorts {
            for (offset, value) in cohort.retention_by_month.iter().enumerate() {
                assert!(*value >= 0.0, "negative value at offset {}", offset);
            }
        }
    }

    #[test]
    fn test_cohorts_sorted_ascending() {
        let txs = vec![
            tx("late", date(2024, 3, 1), 100.0, TransactionKind::New),
            tx("early", date(2023, 1, 1), 100.0, TransactionKind::New),
            tx("mid", date(2023, 7, 1), 100.0, TransactionKind::New),
        ];
        let report = analyze(&txs, CohortGranularity::Month, &AnalysisSettings::default());

        let dates: Vec<NaiveDate> = report.cohorts.iter().map(|c| c.bucket_start_date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
    }

    #[test]
    fn test_deterministic_across_runs() {
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("B", date(2023, 2, 10), 400.0, TransactionKind::New),
            tx("A", date(2023, 4, 1), 1500.0, TransactionKind::Expansion),
            tx("B", date(2023, 9, 1), 0.0, TransactionKind::Churn),
            tx("C", date(2024, 1, 5), 700.0, TransactionKind::New),
        ];
        let settings = AnalysisSettings::default();

        let first = analyze(&txs, CohortGranularity::Quarter, &settings);
        let second = analyze(&txs, CohortGranularity::Quarter, &settings);

        assert_eq!(first, second);
    }

    #[test]
    fn test_max_months_capped_at_horizon() {
        // Active customer far beyond the horizon
        let txs = vec![tx("A", date(2020, 1, 1), 1000.0, TransactionKind::New)];
        let report = analyze(&txs, CohortGranularity::Year, &AnalysisSettings::default());

        assert_eq!(report.max_months, RETENTION_HORIZON_MONTHS);
        assert_eq!(
            report.cohorts[0].retention_by_month.len(),
            RETENTION_HORIZON_MONTHS as usize + 1
        );
    }

    #[test]
    fn test_member_without_new_transaction() {
        // Renewal-only history: contributes 0 at offset 0 but its revenue
        // still shows up at later offsets
        let txs = vec![
            tx("A", date(2023, 1, 1), 1000.0, TransactionKind::New),
            tx("B", date(2023, 1, 20), 300.0, TransactionKind::Renewal),
        ];
        let report = analyze(&txs, CohortGranularity::Month, &AnalysisSettings::default());
        let cohort = &report.cohorts[0];

        assert_eq!(cohort.initial_revenue, 1000.0);
        assert_eq!(cohort.retention_by_month[0], 1000.0);
        assert_eq!(cohort.retention_by_month[1], 1300.0);
    }

    #[test]
    fn test_two_customers_same_quarter_summed() {
        let txs = vec![
            tx("A", date(2023, 1, 5), 1000.0, TransactionKind::New),
            tx("B", date(2023, 3, 20), 500.0, TransactionKind::New),
        ];
        let report = analyze(&txs, CohortGranularity::Quarter, &AnalysisSettings::default());

        assert_eq!(report.cohorts.len(), 1);
        assert_eq!(report.cohorts[0].initial_revenue, 1500.0);
        assert_eq!(report.cohorts[0].retention_by_month[6], 1500.0);
    }

    #[test]
    fn test_report_totals() {
        let txs = vec![
            tx("A", date(2023, 1, 5), 1000.0, TransactionKind::New),
            tx("B", date(2023, 6, 1), 500.0, TransactionKind::New),
        ];
        let report = analyze(&txs, CohortGranularity::Quarter, &AnalysisSettings::default());

        assert_eq!(report.customer_count(), 2);
        assert_eq!(report.total_initial_revenue(), 1500.0);
    }
}
