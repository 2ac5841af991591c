//! Reindexing onto a canonical business-day axis.
//!
//! Given a series and a target axis, produce a new series whose index is
//! exactly that axis. Dates the series lacks become all-missing rows; no value
//! is invented (filling is a separate stage).

use crate::calendar::HolidayCalendar;
use crate::domain::Series;
use crate::validate::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What to do with input dates outside the target axis' span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRange {
    /// Fail with [`ValidationError::OutOfRangeSample`] (catches future-dated garbage rows).
    #[default]
    Reject,
    /// Silently leave them out of the output.
    Discard,
}

/// The canonical business-day axis for `[start, end]`.
pub fn canonical_axis(calendar: &HolidayCalendar, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    calendar.business_days(start, end).collect()
}

/// Project `series` onto `axis`, which must be strictly increasing.
///
/// Input dates inside the axis' span that are not on the axis (weekend or
/// holiday rows) cannot be represented and are dropped. Repeated input dates
/// are rejected, since they make the projection ambiguous.
pub fn reindex(
    series: &Series,
    axis: &[NaiveDate],
    out_of_range: OutOfRange,
) -> Result<Series, ValidationError> {
    let span = axis.first().copied().zip(axis.last().copied());
    reindex_within(series, axis, span, out_of_range)
}

/// Like [`reindex`], but range is judged against `span` rather than the axis
/// endpoints, so a weekend first row of an own-span reindex is off-axis, not
/// out of range.
fn reindex_within(
    series: &Series,
    axis: &[NaiveDate],
    span: Option<(NaiveDate, NaiveDate)>,
    out_of_range: OutOfRange,
) -> Result<Series, ValidationError> {
    debug_assert!(axis.windows(2).all(|w| w[0] < w[1]), "axis must be strictly increasing");

    let mut row_of: HashMap<NaiveDate, usize> = HashMap::with_capacity(series.len());
    for (i, date) in series.dates().iter().enumerate() {
        if row_of.insert(*date, i).is_some() {
            return Err(ValidationError::DuplicateKey {
                series: series.name().to_string(),
                date: *date,
            });
        }
    }

    let mut out_of_span = 0usize;
    let mut off_axis = 0usize;
    let on_axis: std::collections::HashSet<&NaiveDate> = axis.iter().collect();
    for date in series.dates() {
        let inside = span.is_some_and(|(start, end)| *date >= start && *date <= end);
        if !inside {
            if out_of_range == OutOfRange::Reject {
                let (start, end) = span.unwrap_or((*date, *date));
                return Err(ValidationError::OutOfRangeSample {
                    series: series.name().to_string(),
                    date: *date,
                    start,
                    end,
                });
            }
            out_of_span += 1;
        } else if !on_axis.contains(date) {
            off_axis += 1;
        }
    }

    let values: Vec<Vec<Option<f64>>> = series
        .values()
        .iter()
        .map(|column| {
            axis.iter()
                .map(|date| row_of.get(date).and_then(|&i| column[i]))
                .collect()
        })
        .collect();

    if out_of_span > 0 || off_axis > 0 {
        tracing::debug!(
            series = series.name(),
            out_of_span,
            off_axis,
            "reindex dropped rows not on the target axis"
        );
    }

    Ok(series.with_values(axis.to_vec(), values))
}

/// Reindex onto `calendar` over `span`, or over the series' own span when `span` is `None`.
pub fn reindex_to_calendar(
    series: &Series,
    calendar: &HolidayCalendar,
    span: Option<(NaiveDate, NaiveDate)>,
    out_of_range: OutOfRange,
) -> Result<Series, ValidationError> {
    match span.or_else(|| series.span()) {
        Some((start, end)) => reindex_within(
            series,
            &canonical_axis(calendar, start, end),
            Some((start, end)),
            out_of_range,
        ),
        None => Ok(series.clone()),
    }
}
