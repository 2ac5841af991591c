//! Structural anomaly checks for a single series.
//!
//! Both checks are read-only and independent of each other; a series must pass
//! both before it is consolidated. Failures are data-quality defects in the
//! source and are never auto-corrected here.

use crate::calendar::HolidayCalendar;
use crate::domain::Series;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use thiserror::Error;

/// How many offending dates a gap report carries.
pub const GAP_SAMPLE_SIZE: usize = 5;

/// Kind of anomaly, independent of the series it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnomalyKind {
    DomainViolation,
    DuplicateKey,
    ResidualMissing,
    CalendarGap,
    OutOfRangeSample,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyKind::DomainViolation => "domain violation",
            AnomalyKind::DuplicateKey => "duplicate key",
            AnomalyKind::ResidualMissing => "residual missing value",
            AnomalyKind::CalendarGap => "calendar gap",
            AnomalyKind::OutOfRangeSample => "out-of-range sample",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("domain violation in '{series}': column '{column}' is {value} on {date} (must be non-negative)")]
    DomainViolation {
        series: String,
        column: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("duplicate key in '{series}': {date} appears more than once")]
    DuplicateKey { series: String, date: NaiveDate },

    #[error("residual missing value in '{series}': column '{column}' is empty on {date}")]
    ResidualMissing {
        series: String,
        column: String,
        date: NaiveDate,
    },

    #[error(
        "calendar gap in '{series}': missing {missing_count} business dates, e.g. [{}]; {off_calendar} dates off calendar",
        join_dates(.sample)
    )]
    CalendarGap {
        series: String,
        missing_count: usize,
        sample: Vec<NaiveDate>,
        off_calendar: usize,
    },

    #[error("out-of-range sample in '{series}': {date} is outside {start}..={end}")]
    OutOfRangeSample {
        series: String,
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl ValidationError {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            ValidationError::DomainViolation { .. } => AnomalyKind::DomainViolation,
            ValidationError::DuplicateKey { .. } => AnomalyKind::DuplicateKey,
            ValidationError::ResidualMissing { .. } => AnomalyKind::ResidualMissing,
            ValidationError::CalendarGap { .. } => AnomalyKind::CalendarGap,
            ValidationError::OutOfRangeSample { .. } => AnomalyKind::OutOfRangeSample,
        }
    }

    /// Identity of the offending series.
    pub fn series(&self) -> &str {
        match self {
            ValidationError::DomainViolation { series, .. }
            | ValidationError::DuplicateKey { series, .. }
            | ValidationError::ResidualMissing { series, .. }
            | ValidationError::CalendarGap { series, .. }
            | ValidationError::OutOfRangeSample { series, .. } => series,
        }
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reject negative values (for non-negative series), repeated dates, and
/// missing cells.
///
/// The missing-cell check only makes sense once the fill policy has run.
pub fn check_anomalies(series: &Series) -> Result<&Series, ValidationError> {
    let domain = series.domain();
    for (column, values) in series.columns() {
        for (date, value) in series.dates().iter().zip(values) {
            if let Some(v) = value {
                if !domain.allows(*v) {
                    return Err(ValidationError::DomainViolation {
                        series: series.name().to_string(),
                        column: column.to_string(),
                        date: *date,
                        value: *v,
                    });
                }
            }
        }
    }

    if let Some(date) = first_duplicate(series.dates()) {
        return Err(ValidationError::DuplicateKey {
            series: series.name().to_string(),
            date,
        });
    }

    for (column, values) in series.columns() {
        if let Some(i) = values.iter().position(Option::is_none) {
            return Err(ValidationError::ResidualMissing {
                series: series.name().to_string(),
                column: column.to_string(),
                date: series.dates()[i],
            });
        }
    }

    Ok(series)
}

/// Require the series' date set to equal the canonical calendar over its own span.
pub fn check_time_gaps<'a>(
    series: &'a Series,
    calendar: &HolidayCalendar,
) -> Result<&'a Series, ValidationError> {
    let Some((start, end)) = series.span() else {
        return Ok(series);
    };
    let present: BTreeSet<NaiveDate> = series.dates().iter().copied().collect();
    let missing: Vec<NaiveDate> = calendar
        .business_days(start, end)
        .filter(|d| !present.contains(d))
        .collect();
    let off_calendar = present
        .iter()
        .filter(|d| !calendar.is_business_day(**d))
        .count();

    if missing.is_empty() && off_calendar == 0 {
        return Ok(series);
    }
    Err(ValidationError::CalendarGap {
        series: series.name().to_string(),
        missing_count: missing.len(),
        sample: missing.into_iter().take(GAP_SAMPLE_SIZE).collect(),
        off_calendar,
    })
}

/// Canonical business dates within the series' own span that it lacks.
pub fn missing_business_dates(series: &Series, calendar: &HolidayCalendar) -> Vec<NaiveDate> {
    let Some((start, end)) = series.span() else {
        return Vec::new();
    };
    let present: HashSet<NaiveDate> = series.dates().iter().copied().collect();
    calendar
        .business_days(start, end)
        .filter(|d| !present.contains(d))
        .collect()
}

/// Dates on which any column is missing, in row order.
pub fn missing_value_dates(series: &Series) -> Vec<NaiveDate> {
    (0..series.len())
        .filter(|&i| series.columns().any(|(_, values)| values[i].is_none()))
        .map(|i| series.dates()[i])
        .collect()
}

pub(crate) fn first_duplicate(dates: &[NaiveDate]) -> Option<NaiveDate> {
    let mut seen = HashSet::with_capacity(dates.len());
    dates.iter().copied().find(|d| !seen.insert(*d))
}
