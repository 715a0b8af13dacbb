// NRR Cohort Analysis Engine - Core Library
// Exposes all modules for use in the CLI and tests

pub mod cohorts;
pub mod customers;
pub mod export;
pub mod loader;
pub mod periods;
pub mod retention;

// Re-export commonly used types
pub use cohorts::{group_into_cohorts, Cohort};
pub use customers::{aggregate_customers, CustomerSummary, Transaction, TransactionKind};
pub use export::{export_csv, export_json, ExportMode};
pub use loader::{load_csv, LoadOutcome, RowError};
pub use periods::{advance_months, bucket_start, label, month_offset, CohortGranularity};
pub use retention::{
    analyze, AnalysisReport, AnalysisSettings, RetentionEngine, RETENTION_HORIZON_MONTHS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
