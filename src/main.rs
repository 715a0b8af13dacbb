use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;

use nrr_cohorts::{
    analyze, export_csv, export_json, load_csv, AnalysisReport, AnalysisSettings,
    CohortGranularity, ExportMode,
};

/// Parsed command line
struct CliArgs {
    input: PathBuf,
    granularity: CohortGranularity,
    settings: AnalysisSettings,
    export_csv_path: Option<PathBuf>,
    export_json_path: Option<PathBuf>,
    percent: bool,
}

fn main() -> Result<()> {
    let args = match parse_args(env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("❌ {}", err);
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    run(args)
}

fn run(args: CliArgs) -> Result<()> {
    println!("📊 NRR Cohort Analysis (v{})", nrr_cohorts::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading {}...", args.input.display());
    let outcome = load_csv(&args.input)?;
    println!("✓ Loaded {} transactions", outcome.transactions.len());

    if outcome.has_errors() {
        println!("⚠️  Skipped {} bad rows:", outcome.row_errors.len());
        for error in &outcome.row_errors {
            println!("   line {}: {}", error.line, error.message);
        }
    }

    // 2. Run analysis
    println!(
        "\n🔬 Analyzing by {} cohorts (expansion: {}, exclude churned: {})...",
        args.granularity,
        on_off(args.settings.include_expansion_revenue),
        on_off(args.settings.exclude_churned_accounts),
    );
    let report = analyze(&outcome.transactions, args.granularity, &args.settings);
    println!(
        "✓ {} cohorts, {} customers, tracked through month {}",
        report.cohorts.len(),
        report.customer_count(),
        report.max_months
    );

    // 3. Print table
    println!();
    print_table(&report, args.percent);

    // 4. Exports
    if let Some(path) = &args.export_csv_path {
        let mode = if args.percent {
            ExportMode::Percent
        } else {
            ExportMode::Revenue
        };
        export_csv(&report, mode, path)
            .with_context(|| format!("CSV export failed: {}", path.display()))?;
        println!("\n💾 Wrote {}", path.display());
    }
    if let Some(path) = &args.export_json_path {
        export_json(&report, path)
            .with_context(|| format!("JSON export failed: {}", path.display()))?;
        println!("💾 Wrote {}", path.display());
    }

    Ok(())
}

fn parse_args<I: Iterator<Item = String>>(mut raw: I) -> Result<CliArgs> {
    let input = match raw.next() {
        Some(path) => PathBuf::from(path),
        None => bail!("Missing input file"),
    };

    let mut granularity = CohortGranularity::Month;
    let mut settings = AnalysisSettings::default();
    let mut export_csv_path = None;
    let mut export_json_path = None;
    let mut percent = false;

    while let Some(arg) = raw.next() {
        match arg.as_str() {
            "--granularity" | "-g" => {
                let value = raw
                    .next()
                    .context("--granularity requires a value (month, quarter, or year)")?;
                granularity = value.parse()?;
            }
            "--no-expansion" => settings.include_expansion_revenue = false,
            "--exclude-churned" => settings.exclude_churned_accounts = true,
            "--percent" => percent = true,
            "--export-csv" => {
                export_csv_path = Some(PathBuf::from(
                    raw.next().context("--export-csv requires a file path")?,
                ));
            }
            "--export-json" => {
                export_json_path = Some(PathBuf::from(
                    raw.next().context("--export-json requires a file path")?,
                ));
            }
            other => bail!("Unknown argument '{}'", other),
        }
    }

    Ok(CliArgs {
        input,
        granularity,
        settings,
        export_csv_path,
        export_json_path,
        percent,
    })
}

fn print_usage() {
    eprintln!("Usage: nrr-cohorts <transactions.csv> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -g, --granularity <month|quarter|year>   Cohort bucket size (default: month)");
    eprintln!("      --no-expansion                       Clip revenue at original acquisition amount");
    eprintln!("      --exclude-churned                    Exclude churned accounts");
    eprintln!("      --percent                            Show NRR percentages instead of revenue");
    eprintln!("      --export-csv <file>                  Write the cohort table as CSV");
    eprintln!("      --export-json <file>                 Write the full report as JSON");
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// Print the cohort table, one row per cohort, columns M0..max_months
fn print_table(report: &AnalysisReport, percent: bool) {
    if report.is_empty() {
        println!("(no cohorts - input was empty)");
        return;
    }

    print!("{:<10} {:>9} {:>12}", "Cohort", "Customers", "Initial");
    for offset in 0..=report.max_months {
        print!(" {:>9}", format!("M{}", offset));
    }
    println!();

    for cohort in &report.cohorts {
        print!(
            "{:<10} {:>9} {:>12.2}",
            cohort.label,
            cohort.member_count(),
            cohort.initial_revenue
        );
        for offset in 0..=report.max_months as usize {
            let cell = if percent {
                cohort
                    .retention_percent(offset)
                    .map(|v| format!("{:.1}%", v))
                    .unwrap_or_else(|| "-".to_string())
            } else {
                cohort
                    .retention_at(offset)
                    .map(|v| format!("{:.2}", v))
                    .unwrap_or_else(|| "-".to_string())
            };
            print!(" {:>9}", cell);
        }
        println!();
    }
}
