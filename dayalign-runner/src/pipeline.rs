//! Config-driven pipeline: load → derive spreads → prepare → consolidate.
//!
//! Three entry points:
//! - `run_pipeline()`: full run, returns the consolidated table. Used by `dayalign consolidate`.
//! - `check_sources()`: validates every series and reports each outcome without consolidating.
//! - `integrity_report()`: lists raw dates missing per source.
//!
//! Loading and per-series preparation are independent across series and run
//! on the rayon pool; results keep the configured order.

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use dayalign_core::data::{DataIngestor, IngestError};
use dayalign_core::validate::{check_anomalies, check_time_gaps};
use dayalign_core::{
    consolidate, derive_spread, forward_fill, resample_daily, AlignTarget, AnomalyKind,
    ConsolidateError, ConsolidatedTable, ConsolidationInput, ConsolidationSummary, Frequency,
    HolidayCalendar, ResampleError, Series, SpreadError, ValidationError,
};

use crate::config::{ConfigError, PipelineConfig, RejectPolicy, SourceConfig};
use crate::report::{IntegrityReport, RawSource};

/// Errors from the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("source '{series}': {source}")]
    Ingest {
        series: String,
        #[source]
        source: IngestError,
    },

    #[error("source '{series}': {source}")]
    Resample {
        series: String,
        #[source]
        source: ResampleError,
    },

    #[error("spread '{spread}': {source}")]
    Spread {
        spread: String,
        #[source]
        source: SpreadError,
    },

    #[error("series rejected: {0}")]
    Rejected(ValidationError),

    #[error("consolidation failed: {0}")]
    Consolidate(#[from] ConsolidateError),
}

/// A series as read from disk (intraday already resampled), with the
/// settings that drive its preparation.
#[derive(Debug, Clone)]
pub struct LoadedSeries {
    pub series: Series,
    pub calendar: HolidayCalendar,
    pub target: AlignTarget,
    pub reference: bool,
    pub percent: bool,
    pub check_gaps: bool,
}

impl LoadedSeries {
    pub fn name(&self) -> &str {
        self.series.name()
    }
}

/// A series that failed validation and was left out of the table.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub series: String,
    pub kind: AnomalyKind,
    pub message: String,
}

impl From<&ValidationError> for Rejection {
    fn from(err: &ValidationError) -> Self {
        Rejection {
            series: err.series().to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Complete result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub table: ConsolidatedTable,
    pub summary: ConsolidationSummary,
    /// Series that made it into the table, in configured order.
    pub included: Vec<String>,
    pub rejected: Vec<Rejection>,
    /// Present when the output config asks for it.
    pub integrity: Option<IntegrityReport>,
}

/// Validation outcome for one series, as reported by `dayalign check`.
#[derive(Debug, Clone)]
pub struct SourceCheck {
    pub name: String,
    pub rows: usize,
    pub span: Option<(chrono::NaiveDate, chrono::NaiveDate)>,
    pub missing_values: usize,
    pub error: Option<ValidationError>,
}

impl SourceCheck {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Run the full pipeline described by `config`.
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome, PipelineError> {
    config.validate()?;
    let loaded = load_all(config)?;
    let results = prepare_all(&loaded);

    let mut prepared: Vec<(&LoadedSeries, Series)> = Vec::with_capacity(loaded.len());
    let mut rejected = Vec::new();
    for (item, result) in loaded.iter().zip(results) {
        match result {
            Ok(series) => prepared.push((item, series)),
            Err(err) if item.reference || config.on_rejected == RejectPolicy::Halt => {
                return Err(PipelineError::Rejected(err));
            }
            Err(err) => {
                warn!(series = %item.name(), kind = %err.kind(), "excluding series: {err}");
                rejected.push(Rejection::from(&err));
            }
        }
    }

    let inputs: Vec<ConsolidationInput<'_>> = prepared
        .iter()
        .map(|(item, series)| {
            let input = ConsolidationInput::new(series, &item.calendar).target(item.target);
            if item.reference {
                input.reference()
            } else {
                input
            }
        })
        .collect();
    let consolidation = consolidate(&inputs)?;

    let integrity = config
        .output
        .integrity_report
        .then(|| build_integrity(&loaded));

    info!(
        rows = consolidation.table.len(),
        columns = consolidation.table.width(),
        rejected = rejected.len(),
        "pipeline complete"
    );
    Ok(PipelineOutcome {
        table: consolidation.table,
        summary: consolidation.summary,
        included: prepared.iter().map(|(item, _)| item.name().to_string()).collect(),
        rejected,
        integrity,
    })
}

/// Validate every configured series without consolidating.
///
/// Load failures still abort; validation failures are collected.
pub fn check_sources(config: &PipelineConfig) -> Result<Vec<SourceCheck>, PipelineError> {
    config.validate()?;
    let loaded = load_all(config)?;
    let results = prepare_all(&loaded);
    Ok(loaded
        .iter()
        .zip(results)
        .map(|(item, result)| SourceCheck {
            name: item.name().to_string(),
            rows: item.series.len(),
            span: item.series.span(),
            missing_values: item.series.missing_count(),
            error: result.err(),
        })
        .collect())
}

/// Raw-date integrity report over every configured series.
pub fn integrity_report(config: &PipelineConfig) -> Result<IntegrityReport, PipelineError> {
    config.validate()?;
    let loaded = load_all(config)?;
    Ok(build_integrity(&loaded))
}

/// Read every source (in parallel), then derive the configured spreads
/// from the raw inputs. Sources come first, spreads after, each in
/// configured order.
pub fn load_all(config: &PipelineConfig) -> Result<Vec<LoadedSeries>, PipelineError> {
    let mut loaded = config
        .sources
        .par_iter()
        .map(|source| load_source(source, config))
        .collect::<Result<Vec<_>, _>>()?;

    let mut spreads = Vec::with_capacity(config.spreads.len());
    for spread in &config.spreads {
        let find = |name: &str| {
            loaded
                .iter()
                .find(|l: &&LoadedSeries| l.name() == name)
                .ok_or_else(|| ConfigError::UnknownSpreadInput {
                    spread: spread.name.clone(),
                    input: name.to_string(),
                })
        };
        let left = find(&spread.left)?;
        let right = find(&spread.right)?;
        let series = derive_spread(&spread.name, &left.series, &right.series).map_err(|source| {
            PipelineError::Spread {
                spread: spread.name.clone(),
                source,
            }
        })?;
        spreads.push(LoadedSeries {
            series,
            calendar: config.calendar.build(spread.calendar),
            target: spread.target,
            reference: false,
            percent: spread.percent,
            check_gaps: false,
        });
    }
    loaded.extend(spreads);
    Ok(loaded)
}

fn load_source(source: &SourceConfig, config: &PipelineConfig) -> Result<LoadedSeries, PipelineError> {
    let ingestor = match &source.columns {
        Some(columns) => DataIngestor::with_columns(columns.clone()),
        None => DataIngestor::new(),
    };
    let ingest_err = |err| PipelineError::Ingest {
        series: source.name.clone(),
        source: err,
    };

    let series = match source.frequency {
        Frequency::Intraday => {
            let bars = ingestor.read_intraday_file(&source.path).map_err(ingest_err)?;
            debug!(series = %source.name, observations = bars.len(), "resampling intraday");
            resample_daily(&source.name, &bars).map_err(|err| PipelineError::Resample {
                series: source.name.clone(),
                source: err,
            })?
        }
        frequency => ingestor
            .read_series_file(&source.name, frequency, &source.path)
            .map_err(ingest_err)?,
    };
    let series = series.with_domain(source.domain);
    info!(series = %source.name, rows = series.len(), path = %source.path.display(), "loaded source");

    Ok(LoadedSeries {
        series,
        calendar: config.calendar.build(source.calendar),
        target: source.target,
        reference: source.reference,
        percent: source.percent,
        check_gaps: source.check_gaps(),
    })
}

fn prepare_all(loaded: &[LoadedSeries]) -> Vec<Result<Series, ValidationError>> {
    loaded.par_iter().map(prepare).collect()
}

/// Percent conversion → calendar check → forward fill → anomaly check.
pub fn prepare(item: &LoadedSeries) -> Result<Series, ValidationError> {
    let series = if item.percent {
        item.series.percent_to_decimal()
    } else {
        item.series.clone()
    };
    if item.check_gaps {
        check_time_gaps(&series, &item.calendar)?;
    }
    let filled = forward_fill(&series);
    check_anomalies(&filled)?;
    debug!(series = %item.name(), rows = filled.len(), "prepared");
    Ok(filled)
}

fn build_integrity(loaded: &[LoadedSeries]) -> IntegrityReport {
    // Monthly releases have no daily cadence to report against.
    let sources: Vec<RawSource<'_>> = loaded
        .iter()
        .filter(|item| item.series.frequency() != Frequency::IrregularMacro)
        .map(|item| RawSource {
            series: &item.series,
            calendar: &item.calendar,
        })
        .collect();
    IntegrityReport::build(&sources)
}
