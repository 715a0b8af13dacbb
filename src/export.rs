// 📤 Report Exporter - AnalysisReport → CSV / JSON
// Boundary collaborator: flattens the cohort × offset table for
// spreadsheets (absolute revenue or NRR percentages) and serializes the
// full report for downstream tooling. No computation happens here.

use crate::retention::AnalysisReport;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// How cell values are rendered in the CSV table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMode {
    /// Raw retained revenue per offset
    Revenue,
    /// NRR as a percentage of each cohort's initial revenue
    /// (blank cells for cohorts with zero initial revenue)
    Percent,
}

/// Write the cohort table as CSV.
///
/// One row per cohort: label, member count, initial revenue, then one
/// column per month offset up to the report's `max_months`. Column
/// headers reuse the cohort labels' offset convention ("M0".."M24").
pub fn export_csv<P: AsRef<Path>>(
    report: &AnalysisReport,
    mode: ExportMode,
    path: P,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create export file: {:?}", path.as_ref()))?;

    let mut header = vec![
        "Cohort".to_string(),
        "Customers".to_string(),
        "Initial_Revenue".to_string(),
    ];
    for offset in 0..=report.max_months {
        header.push(format!("M{}", offset));
    }
    writer.write_record(&header)?;

    for cohort in &report.cohorts {
        let mut record = vec![
            cohort.label.clone(),
            cohort.member_count().to_string(),
            format!("{:.2}", cohort.initial_revenue),
        ];
        for offset in 0..=report.max_months as usize {
            let cell = match mode {
                ExportMode::Revenue => cohort
                    .retention_at(offset)
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_default(),
                ExportMode::Percent => cohort
                    .retention_percent(offset)
                    .map(|v| format!("{:.1}", v))
                    .unwrap_or_default(),
            };
            record.push(cell);
        }
        writer.write_record(&record)?;
    }

    writer
        .flush()
        .with_context(|| format!("Failed to write export file: {:?}", path.as_ref()))?;
    Ok(())
}

/// Write the full report as pretty-printed JSON
pub fn export_json<P: AsRef<Path>>(report: &AnalysisReport, path: P) -> Result<()> {
    let mut file = File::create(path.as_ref())
        .with_context(|| format!("Failed to create export file: {:?}", path.as_ref()))?;

    serde_json::to_writer_pretty(&mut file, report).context("Failed to serialize report")?;
    file.write_all(b"\n")?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
