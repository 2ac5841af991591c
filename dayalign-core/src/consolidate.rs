//! Consolidation: many aligned series → one complete daily table.
//!
//! Steps, in order:
//! 1. reindex each input onto its calendar (own span, or the reference span) and
//!    forward-fill from its raw rows, so off-axis observations carry to the next axis date
//! 2. outer-join on date
//! 3. drop dates the reference series did not carry, and every date after its last row
//! 4. forward-fill the joined table
//! 5. drop every row that still has a missing cell
//!
//! Step 5 truncates the head of the table to the first date on which every
//! column is populated.

use crate::align::{reindex_to_calendar, OutOfRange};
use crate::calendar::HolidayCalendar;
use crate::domain::{Series, VALUE_COLUMN};
use crate::fill::forward_fill_values;
use crate::table::{ConsolidatedTable, TableError};
use crate::validate::ValidationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsolidateError {
    #[error("nothing to consolidate")]
    Empty,

    #[error("no input is marked as the reference series")]
    NoReference,

    #[error("more than one reference series: '{first}' and '{second}'")]
    MultipleReferences { first: String, second: String },

    #[error("reference series '{0}' has no rows")]
    EmptyReference(String),

    #[error("output column '{column}' is produced by both '{first}' and '{second}'")]
    DuplicateColumn {
        column: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Which span an input is reindexed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignTarget {
    /// The input's own first..last date.
    #[default]
    OwnSpan,
    /// The reference series' span. Rows outside it are discarded, though the
    /// latest one before the reference start still fills the first row.
    ReferenceSpan,
}

/// One series to consolidate, with the calendar it is expected to populate.
#[derive(Debug, Clone, Copy)]
pub struct ConsolidationInput<'a> {
    pub series: &'a Series,
    pub calendar: &'a HolidayCalendar,
    pub target: AlignTarget,
    pub reference: bool,
}

impl<'a> ConsolidationInput<'a> {
    pub fn new(series: &'a Series, calendar: &'a HolidayCalendar) -> Self {
        Self {
            series,
            calendar,
            target: AlignTarget::OwnSpan,
            reference: false,
        }
    }

    /// Mark this input as the reference series.
    pub fn reference(mut self) -> Self {
        self.reference = true;
        self
    }

    pub fn target(mut self, target: AlignTarget) -> Self {
        self.target = target;
        self
    }
}

/// Row counts at each consolidation step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationSummary {
    pub inputs: usize,
    pub joined_rows: usize,
    /// Dates the reference did not carry, including those after its last row.
    pub reference_dropped: usize,
    pub incomplete_dropped: usize,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct Consolidation {
    pub table: ConsolidatedTable,
    pub summary: ConsolidationSummary,
}

/// Output column name for `column` of `series`.
///
/// A lone `value` column takes the series name; anything else is suffixed
/// with it (`close_SPY`).
pub fn output_column_name(series: &Series, column: &str) -> String {
    if series.width() == 1 && column == VALUE_COLUMN {
        series.name().to_string()
    } else {
        format!("{column}_{}", series.name())
    }
}

pub fn consolidate(inputs: &[ConsolidationInput<'_>]) -> Result<Consolidation, ConsolidateError> {
    if inputs.is_empty() {
        return Err(ConsolidateError::Empty);
    }
    let reference = find_reference(inputs)?;
    let (ref_start, ref_end) = reference
        .series
        .span()
        .ok_or_else(|| ConsolidateError::EmptyReference(reference.series.name().to_string()))?;

    // Step 1
    let mut aligned = Vec::with_capacity(inputs.len());
    for input in inputs {
        let reindexed = match input.target {
            AlignTarget::OwnSpan => {
                reindex_to_calendar(input.series, input.calendar, None, OutOfRange::Reject)?
            }
            AlignTarget::ReferenceSpan => reindex_to_calendar(
                input.series,
                input.calendar,
                Some((ref_start, ref_end)),
                OutOfRange::Discard,
            )?,
        };
        aligned.push(fill_as_of(input.series, &reindexed));
    }

    // Step 2
    let dates: Vec<NaiveDate> = aligned
        .iter()
        .flat_map(|s| s.dates().iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut names: Vec<String> = Vec::new();
    let mut owner: HashMap<String, &str> = HashMap::new();
    let mut joined: Vec<Vec<Option<f64>>> = Vec::new();
    for series in &aligned {
        let row_of: HashMap<NaiveDate, usize> = series
            .dates()
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();
        for (column, values) in series.columns() {
            let name = output_column_name(series, column);
            if let Some(first) = owner.insert(name.clone(), series.name()) {
                return Err(ConsolidateError::DuplicateColumn {
                    column: name,
                    first: first.to_string(),
                    second: series.name().to_string(),
                });
            }
            joined.push(
                dates
                    .iter()
                    .map(|d| row_of.get(d).and_then(|&i| values[i]))
                    .collect(),
            );
            names.push(name);
        }
    }
    let joined_rows = dates.len();

    // Step 3
    let reference_dates: HashSet<NaiveDate> = reference.series.dates().iter().copied().collect();
    let keep: Vec<usize> = (0..dates.len())
        .filter(|&i| {
            let date = dates[i];
            date < ref_start || (date <= ref_end && reference_dates.contains(&date))
        })
        .collect();
    let reference_dropped = dates.len() - keep.len();
    let dates: Vec<NaiveDate> = keep.iter().map(|&i| dates[i]).collect();
    let joined: Vec<Vec<Option<f64>>> = joined
        .iter()
        .map(|col| keep.iter().map(|&i| col[i]).collect())
        .collect();

    // Step 4
    let filled: Vec<Vec<Option<f64>>> = joined.iter().map(|col| forward_fill_values(col)).collect();

    // Step 5
    let complete: Vec<usize> = (0..dates.len())
        .filter(|&i| filled.iter().all(|col| col[i].is_some()))
        .collect();
    let incomplete_dropped = dates.len() - complete.len();
    let out_dates: Vec<NaiveDate> = complete.iter().map(|&i| dates[i]).collect();
    let columns: Vec<(String, Vec<f64>)> = names
        .into_iter()
        .zip(filled)
        .map(|(name, col)| {
            let values = complete.iter().filter_map(|&i| col[i]).collect();
            (name, values)
        })
        .collect();

    let table = ConsolidatedTable::new(out_dates, columns)?;
    let summary = ConsolidationSummary {
        inputs: inputs.len(),
        joined_rows,
        reference_dropped,
        incomplete_dropped,
        rows: table.len(),
    };

    if table.is_empty() {
        tracing::warn!(
            reference = reference.series.name(),
            joined_rows,
            "consolidated table is empty: no date has every column populated"
        );
    } else {
        tracing::info!(
            reference = reference.series.name(),
            inputs = summary.inputs,
            joined_rows,
            reference_dropped,
            incomplete_dropped,
            rows = summary.rows,
            columns = table.width(),
            "consolidated"
        );
    }

    Ok(Consolidation { table, summary })
}

/// Forward-fill `reindexed` from every raw row of `series`, including rows the
/// reindex dropped: each missing cell takes the latest value observed on or
/// before its date. A monthly value dated on a holiday, or before the
/// reference start, still reaches the next axis date.
fn fill_as_of(series: &Series, reindexed: &Series) -> Series {
    let mut order: Vec<usize> = (0..series.len()).collect();
    order.sort_by_key(|&i| series.dates()[i]);

    let values = reindexed
        .values()
        .iter()
        .zip(series.values())
        .map(|(column, original)| {
            let mut pending = order.iter().peekable();
            let mut last = None;
            reindexed
                .dates()
                .iter()
                .zip(column)
                .map(|(date, value)| {
                    while let Some(&&i) = pending.peek() {
                        if series.dates()[i] > *date {
                            break;
                        }
                        if original[i].is_some() {
                            last = original[i];
                        }
                        pending.next();
                    }
                    value.or(last)
                })
                .collect()
        })
        .collect();
    reindexed.with_values(reindexed.dates().to_vec(), values)
}

fn find_reference<'a, 'b>(
    inputs: &'b [ConsolidationInput<'a>],
) -> Result<&'b ConsolidationInput<'a>, ConsolidateError> {
    let mut refs = inputs.iter().filter(|i| i.reference);
    match (refs.next(), refs.next()) {
        (None, _) => Err(ConsolidateError::NoReference),
        (Some(first), Some(second)) => Err(ConsolidateError::MultipleReferences {
            first: first.series.name().to_string(),
            second: second.series.name().to_string(),
        }),
        (Some(only), None) => Ok(only),
    }
}
