//! Series: a named, date-keyed set of observations.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Name of the single value column carried by macro and spread series.
pub const VALUE_COLUMN: &str = "value";

/// Decimal places kept after a percent-to-decimal conversion.
pub const PERCENT_DECIMALS: i32 = 7;

/// Sampling frequency of the source the series came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Intraday,
    Daily,
    IrregularMacro,
}

/// Which values are legal in a series.
///
/// Rates and prices are non-negative by definition; spreads (e.g. an inverted
/// yield curve) are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainPolicy {
    #[default]
    NonNegative,
    Unrestricted,
}

impl DomainPolicy {
    pub fn allows(self, value: f64) -> bool {
        match self {
            DomainPolicy::NonNegative => value >= 0.0,
            DomainPolicy::Unrestricted => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("series '{series}' has no value columns")]
    NoColumns { series: String },

    #[error("series '{series}' declares column '{column}' twice")]
    DuplicateColumn { series: String, column: String },

    #[error("series '{series}': column '{column}' has {actual} values, expected {expected}")]
    ColumnLength {
        series: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("series '{series}': row for {date} has {actual} values, expected {expected}")]
    RowWidth {
        series: String,
        date: NaiveDate,
        expected: usize,
        actual: usize,
    },
}

/// A date-keyed, column-major table of optional values.
///
/// `None` is the explicit missing marker. Dates are stored as received; the
/// validator and reindexer are responsible for rejecting duplicates, so raw
/// input can be represented faithfully before it is checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    frequency: Frequency,
    domain: DomainPolicy,
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl Series {
    /// An empty series with the given value columns.
    pub fn new(
        name: impl Into<String>,
        frequency: Frequency,
        columns: Vec<String>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();
        check_columns(&name, &columns)?;
        let values = vec![Vec::new(); columns.len()];
        Ok(Self {
            name,
            frequency,
            domain: DomainPolicy::default(),
            dates: Vec::new(),
            columns,
            values,
        })
    }

    /// A single-column series named [`VALUE_COLUMN`].
    pub fn single(
        name: impl Into<String>,
        frequency: Frequency,
        dates: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        Self::from_columns(name, frequency, dates, vec![(VALUE_COLUMN.to_string(), values)])
    }

    pub fn from_columns(
        name: impl Into<String>,
        frequency: Frequency,
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Vec<Option<f64>>)>,
    ) -> Result<Self, SeriesError> {
        let name = name.into();
        let (names, values): (Vec<String>, Vec<Vec<Option<f64>>>) = columns.into_iter().unzip();
        check_columns(&name, &names)?;
        for (column, col_values) in names.iter().zip(&values) {
            if col_values.len() != dates.len() {
                return Err(SeriesError::ColumnLength {
                    series: name,
                    column: column.clone(),
                    expected: dates.len(),
                    actual: col_values.len(),
                });
            }
        }
        Ok(Self {
            name,
            frequency,
            domain: DomainPolicy::default(),
            dates,
            columns: names,
            values,
        })
    }

    /// Append one row; `row` is in column order.
    pub fn push(&mut self, date: NaiveDate, row: Vec<Option<f64>>) -> Result<(), SeriesError> {
        if row.len() != self.columns.len() {
            return Err(SeriesError::RowWidth {
                series: self.name.clone(),
                date,
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.dates.push(date);
        for (column, value) in self.values.iter_mut().zip(row) {
            column.push(value);
        }
        Ok(())
    }

    pub fn with_domain(mut self, domain: DomainPolicy) -> Self {
        self.domain = domain;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn domain(&self) -> DomainPolicy {
        self.domain
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// `(column name, values)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Values of row `index` in column order.
    pub fn row(&self, index: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|col| col[index]).collect()
    }

    /// `(min date, max date)`, regardless of row order.
    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.dates.iter().min()?;
        let max = self.dates.iter().max()?;
        Some((*min, *max))
    }

    /// Number of missing cells across all columns.
    pub fn missing_count(&self) -> usize {
        self.values
            .iter()
            .map(|col| col.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// A copy with rows stably sorted by date.
    pub fn sorted_by_date(&self) -> Series {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&i| self.dates[i]);
        self.select_rows(&order)
    }

    /// A copy holding only the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Series {
        Series {
            name: self.name.clone(),
            frequency: self.frequency,
            domain: self.domain,
            dates: indices.iter().map(|&i| self.dates[i]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|col| indices.iter().map(|&i| col[i]).collect())
                .collect(),
        }
    }

    /// A copy with every value transformed by `f`; missing cells stay missing.
    pub fn map_values(&self, f: impl Fn(f64) -> f64) -> Series {
        Series {
            values: self
                .values
                .iter()
                .map(|col| col.iter().map(|v| v.map(&f)).collect())
                .collect(),
            ..self.clone()
        }
    }

    /// A copy with the given columns replaced, keeping dates and metadata.
    pub(crate) fn with_values(&self, dates: Vec<NaiveDate>, values: Vec<Vec<Option<f64>>>) -> Series {
        debug_assert_eq!(values.len(), self.columns.len());
        debug_assert!(values.iter().all(|c| c.len() == dates.len()));
        Series {
            name: self.name.clone(),
            frequency: self.frequency,
            domain: self.domain,
            dates,
            columns: self.columns.clone(),
            values,
        }
    }

    pub(crate) fn values(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }

    /// Percentage points to decimal fraction, rounded to [`PERCENT_DECIMALS`] places.
    pub fn percent_to_decimal(&self) -> Series {
        self.map_values(|v| round_to(v / 100.0, PERCENT_DECIMALS))
    }
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn check_columns(series: &str, columns: &[String]) -> Result<(), SeriesError> {
    if columns.is_empty() {
        return Err(SeriesError::NoColumns {
            series: series.to_string(),
        });
    }
    let mut seen = HashSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            return Err(SeriesError::DuplicateColumn {
                series: series.to_string(),
                column: column.clone(),
            });
        }
    }
    Ok(())
}
