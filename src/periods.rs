// 📅 Period Normalizer - Cohort bucket calendar math
// Maps calendar dates to cohort buckets (month / quarter / year),
// renders display labels, and measures month offsets between dates.

use anyhow::bail;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// GRANULARITY
// ============================================================================

/// CohortGranularity - How wide an acquisition bucket is
///
/// Exhaustive by design: an unsupported granularity is unrepresentable,
/// so the engine never has to validate it. The only place a bad value can
/// appear is the CLI string boundary, handled by `FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CohortGranularity {
    Month,
    Quarter,
    Year,
}

impl CohortGranularity {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            CohortGranularity::Month => "month",
            CohortGranularity::Quarter => "quarter",
            CohortGranularity::Year => "year",
        }
    }
}

impl fmt::Display for CohortGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CohortGranularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "month" | "monthly" => Ok(CohortGranularity::Month),
            "quarter" | "quarterly" => Ok(CohortGranularity::Quarter),
            "year" | "yearly" | "annual" => Ok(CohortGranularity::Year),
            other => bail!(
                "Unknown cohort granularity '{}' (expected month, quarter, or year)",
                other
            ),
        }
    }
}

// ============================================================================
// BUCKET MATH
// ============================================================================

/// First day of the bucket containing `date`
///
/// - month: first day of that calendar month
/// - quarter: first day of the 3-month block (Jan-Mar, Apr-Jun, Jul-Sep, Oct-Dec)
/// - year: January 1 of that year
///
/// Uses the date's own calendar year/month; no timezone handling.
pub fn bucket_start(date: NaiveDate, granularity: CohortGranularity) -> NaiveDate {
    let month = match granularity {
        CohortGranularity::Month => date.month(),
        CohortGranularity::Quarter => ((date.month() - 1) / 3) * 3 + 1,
        CohortGranularity::Year => 1,
    };
    first_of(date.year(), month)
}

/// Display label for a bucket start date
///
/// - month: "YYYY-MM"
/// - quarter: "Q<n> YYYY" (n in 1..=4)
/// - year: "YYYY"
pub fn label(bucket_start_date: NaiveDate, granularity: CohortGranularity) -> String {
    match granularity {
        CohortGranularity::Month => {
            format!("{:04}-{:02}", bucket_start_date.year(), bucket_start_date.month())
        }
        CohortGranularity::Quarter => {
            let quarter = (bucket_start_date.month() - 1) / 3 + 1;
            format!("Q{} {}", quarter, bucket_start_date.year())
        }
        CohortGranularity::Year => format!("{}", bucket_start_date.year()),
    }
}

/// Whole calendar months between a cohort bucket date and a target date
///
/// (target_year - cohort_year) * 12 + (target_month - cohort_month).
/// The day component is ignored on both sides, so offsets are
/// month-granular regardless of cohort granularity. Negative when the
/// target precedes the cohort bucket.
pub fn month_offset(cohort_bucket_date: NaiveDate, target_date: NaiveDate) -> i32 {
    (target_date.year() - cohort_bucket_date.year()) * 12
        + (target_date.month() as i32 - cohort_bucket_date.month() as i32)
}

/// Advance a bucket start date by `months` calendar months
///
/// Bucket starts always fall on the 1st, so there is never a day-of-month
/// clamp to worry about.
pub fn advance_months(bucket_start_date: NaiveDate, months: u32) -> NaiveDate {
    let total = bucket_start_date.month0() + months;
    first_of(bucket_start_date.year() + (total / 12) as i32, total % 12 + 1)
}

fn first_of(year: i32, month: u32) -> NaiveDate {
    // month comes from a valid date or modular arithmetic in 1..=12,
    // so day 1 always exists
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| panic!("invalid bucket date {}-{:02}-01", year, month))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bucket_start() {
        assert_eq!(
            bucket_start(date(2023, 5, 17), CohortGranularity::Month),
            date(2023, 5, 1)
        );
        assert_eq!(
            bucket_start(date(2023, 5, 1), CohortGranularity::Month),
            date(2023, 5, 1)
        );
    }

    #[test]
    fn test_quarter_bucket_start() {
        // Q1: Jan-Mar
        assert_eq!(
            bucket_start(date(2023, 1, 15), CohortGranularity::Quarter),
            date(2023, 1, 1)
        );
        assert_eq!(
            bucket_start(date(2023, 3, 31), CohortGranularity::Quarter),
            date(2023, 1, 1)
        );
        // Q2: Apr-Jun
        assert_eq!(
            bucket_start(date(2023, 6, 30), CohortGranularity::Quarter),
            date(2023, 4, 1)
        );
        // Q4: Oct-Dec
        assert_eq!(
            bucket_start(date(2023, 12, 25), CohortGranularity::Quarter),
            date(2023, 10, 1)
        );
    }

    #[test]
    fn test_year_bucket_start() {
        assert_eq!(
            bucket_start(date(2023, 8, 9), CohortGranularity::Year),
            date(2023, 1, 1)
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(label(date(2023, 5, 1), CohortGranularity::Month), "2023-05");
        assert_eq!(label(date(2023, 1, 1), CohortGranularity::Quarter), "Q1 2023");
        assert_eq!(label(date(2023, 10, 1), CohortGranularity::Quarter), "Q4 2023");
        assert_eq!(label(date(2023, 1, 1), CohortGranularity::Year), "2023");
    }

    #[test]
    fn test_month_offset_same_month() {
        assert_eq!(month_offset(date(2023, 1, 1), date(2023, 1, 28)), 0);
    }

    #[test]
    fn test_month_offset_across_years() {
        assert_eq!(month_offset(date(2023, 1, 1), date(2024, 3, 1)), 14);
        assert_eq!(month_offset(date(2023, 11, 1), date(2024, 2, 1)), 3);
    }

    #[test]
    fn test_month_offset_ignores_day() {
        // Acquired on the 28th, target on the 1st: still one month apart
        assert_eq!(month_offset(date(2023, 1, 28), date(2023, 2, 1)), 1);
    }

    #[test]
    fn test_month_offset_negative() {
        assert_eq!(month_offset(date(2023, 6, 1), date(2023, 4, 1)), -2);
    }

    #[test]
    fn test_advance_months() {
        assert_eq!(advance_months(date(2023, 1, 1), 0), date(2023, 1, 1));
        assert_eq!(advance_months(date(2023, 1, 1), 3), date(2023, 4, 1));
        assert_eq!(advance_months(date(2023, 11, 1), 2), date(2024, 1, 1));
        assert_eq!(advance_months(date(2023, 1, 1), 24), date(2025, 1, 1));
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!(
            "quarter".parse::<CohortGranularity>().unwrap(),
            CohortGranularity::Quarter
        );
        assert_eq!(
            "Monthly".parse::<CohortGranularity>().unwrap(),
            CohortGranularity::Month
        );
        assert!("fortnight".parse::<CohortGranularity>().is_err());
    }
}
