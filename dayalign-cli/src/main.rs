//! dayalign CLI: consolidation, validation, and calendar commands.
//!
//! Commands:
//! - `consolidate`: run a pipeline config and write the consolidated table
//! - `check`: validate every configured series without consolidating
//! - `integrity`: list raw dates missing per source
//! - `inspect`: print shape and date range of a consolidated CSV/Parquet file
//! - `calendar`: list holidays and business-day counts for a calendar preset
//!
//! Logging goes to stderr through `tracing`; set `RUST_LOG` to change the level.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dayalign_core::data::{read_csv_file, read_parquet};
use dayalign_core::{CalendarKind, ConsolidatedTable};
use dayalign_runner::{
    check_sources, integrity_report, run_pipeline, save_outputs, PipelineConfig,
    PipelineOutcome, RejectPolicy,
};

#[derive(Parser)]
#[command(
    name = "dayalign",
    about = "dayalign: align, validate and consolidate daily market and macro series"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline config and write the consolidated table.
    Consolidate {
        /// Path to the pipeline TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Override what happens to a series that fails validation.
        #[arg(long, value_enum)]
        on_rejected: Option<RejectArg>,

        /// Also write the integrity report.
        #[arg(long, default_value_t = false)]
        integrity: bool,
    },
    /// Validate every configured series and report each outcome.
    Check {
        /// Path to the pipeline TOML file.
        #[arg(long)]
        config: PathBuf,
    },
    /// List raw dates missing per source.
    Integrity {
        /// Path to the pipeline TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Write the report as CSV here instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print shape and date range of a consolidated CSV or Parquet file.
    Inspect {
        /// File to read (`.csv` or `.parquet`).
        path: PathBuf,
    },
    /// List holidays and business-day counts for a calendar preset.
    Calendar {
        #[arg(long, value_enum, default_value_t = CalendarArg::UsFederal)]
        kind: CalendarArg,

        /// Start date (YYYY-MM-DD).
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD).
        #[arg(long)]
        end: String,

        /// Extra one-off closures (YYYY-MM-DD), repeatable.
        #[arg(long = "closure")]
        closures: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RejectArg {
    Halt,
    Exclude,
}

impl From<RejectArg> for RejectPolicy {
    fn from(arg: RejectArg) -> Self {
        match arg {
            RejectArg::Halt => RejectPolicy::Halt,
            RejectArg::Exclude => RejectPolicy::Exclude,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CalendarArg {
    UsFederal,
    UsEquity,
    Weekdays,
}

impl From<CalendarArg> for CalendarKind {
    fn from(arg: CalendarArg) -> Self {
        match arg {
            CalendarArg::UsFederal => CalendarKind::UsFederal,
            CalendarArg::UsEquity => CalendarKind::UsEquity,
            CalendarArg::Weekdays => CalendarKind::Weekdays,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Consolidate {
            config,
            output_dir,
            on_rejected,
            integrity,
        } => run_consolidate(&config, output_dir, on_rejected, integrity),
        Commands::Check { config } => run_check(&config),
        Commands::Integrity { config, output } => run_integrity(&config, output.as_deref()),
        Commands::Inspect { path } => run_inspect(&path),
        Commands::Calendar {
            kind,
            start,
            end,
            closures,
        } => run_calendar(kind, &start, &end, &closures),
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_file(path)
        .with_context(|| format!("failed to load pipeline config {}", path.display()))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_consolidate(
    config_path: &Path,
    output_dir: Option<PathBuf>,
    on_rejected: Option<RejectArg>,
    integrity: bool,
) -> Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = output_dir {
        config.output.dir = dir;
    }
    if let Some(policy) = on_rejected {
        config.on_rejected = policy.into();
    }
    config.output.integrity_report |= integrity;
    info!(config = %config_path.display(), sources = config.sources.len(), "running pipeline");

    let outcome = run_pipeline(&config).context("pipeline failed")?;
    print_summary(&outcome);

    let written = save_outputs(&outcome, &config.output)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome) {
    let s = &outcome.summary;
    println!("=== Consolidation ===");
    println!("  Series:               {}", outcome.included.join(", "));
    println!("  Joined rows:          {}", s.joined_rows);
    println!("  Reference dropped:    {}", s.reference_dropped);
    println!("  Incomplete rows:      {} dropped", s.incomplete_dropped);
    println!("  Rows:                 {}", s.rows);
    println!("  Columns:              {}", outcome.table.width());
    if let Some((start, end)) = outcome.table.span() {
        println!("  Range:                {start} → {end}");
    }
    for rejection in &outcome.rejected {
        println!("  EXCLUDED {} ({}): {}", rejection.series, rejection.kind, rejection.message);
    }
    if let Some(report) = &outcome.integrity {
        println!(
            "  Integrity:            {} dates, {} unexplained",
            report.len(),
            report.unexplained().count()
        );
    }
}

fn run_check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let checks = check_sources(&config).context("failed to load sources")?;

    println!("{:<20} {:>6} {:>8}  {:<23}  Result", "Series", "Rows", "Missing", "Range");
    println!("{}", "-".repeat(76));
    for check in &checks {
        let range = check
            .span
            .map(|(s, e)| format!("{s} → {e}"))
            .unwrap_or_else(|| "-".to_string());
        let result = match &check.error {
            None => "ok".to_string(),
            Some(err) => format!("FAIL: {err}"),
        };
        println!(
            "{:<20} {:>6} {:>8}  {:<23}  {result}",
            check.name, check.rows, check.missing_values, range
        );
    }

    let failed = checks.iter().filter(|c| !c.passed()).count();
    if failed > 0 {
        bail!("{failed} of {} series failed validation", checks.len());
    }
    println!("\nAll {} series passed.", checks.len());
    Ok(())
}

fn run_integrity(config_path: &Path, output: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let report = integrity_report(&config).context("failed to build integrity report")?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            report.write_csv(file)?;
            println!("Wrote {} entries to {}", report.len(), path.display());
        }
        None => report.write_csv(std::io::stdout().lock())?,
    }

    let unexplained = report.unexplained().count();
    if unexplained > 0 {
        eprintln!("{unexplained} missing dates are not explained by any calendar");
    }
    Ok(())
}

fn run_inspect(path: &Path) -> Result<()> {
    let table: ConsolidatedTable = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => read_csv_file(path)?,
        Some("parquet") => read_parquet(path)?,
        _ => bail!("unsupported file type: {} (expected .csv or .parquet)", path.display()),
    };
    let info = table.info();
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn run_calendar(kind: CalendarArg, start: &str, end: &str, closures: &[String]) -> Result<()> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    if start > end {
        bail!("--start {start} is after --end {end}");
    }
    let closures = closures
        .iter()
        .map(|s| parse_date(s))
        .collect::<Result<Vec<_>>>()?;
    let calendar = CalendarKind::from(kind).calendar().with_closures(closures);

    println!("Calendar: {}", calendar.name());
    for (date, name) in calendar.holidays_between(start, end) {
        println!("  {date} {:<9} {name}", date.format("%a"));
    }
    println!(
        "Business days {start} → {end}: {}",
        calendar.count_business_days(start, end)
    );
    Ok(())
}
