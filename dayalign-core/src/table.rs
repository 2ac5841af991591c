//! The consolidated output table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("dates must be strictly increasing: {date} follows {previous}")]
    NotIncreasing { previous: NaiveDate, date: NaiveDate },

    #[error("column '{column}' has a non-finite value ({value}) on {date}")]
    NonFinite {
        column: String,
        date: NaiveDate,
        value: f64,
    },

    #[error("column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("column '{column}' has {actual} values, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },
}

/// A date-indexed table with no missing cells.
///
/// Guarantees, checked on construction: dates are strictly increasing (hence
/// unique), column names are unique, and every cell is a finite `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl ConsolidatedTable {
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<(String, Vec<f64>)>) -> Result<Self, TableError> {
        if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(TableError::NotIncreasing {
                previous: w[0],
                date: w[1],
            });
        }

        let mut seen = HashSet::new();
        for (name, values) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
            if values.len() != dates.len() {
                return Err(TableError::ColumnLength {
                    column: name.clone(),
                    expected: dates.len(),
                    actual: values.len(),
                });
            }
            if let Some((date, value)) = dates.iter().zip(values).find(|(_, v)| !v.is_finite()) {
                return Err(TableError::NonFinite {
                    column: name.clone(),
                    date: *date,
                    value: *value,
                });
            }
        }

        let (columns, values) = columns.into_iter().unzip();
        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// `(column name, values)` pairs in column order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Values of row `index` in column order.
    pub fn row(&self, index: usize) -> Vec<f64> {
        self.values.iter().map(|col| col[index]).collect()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.dates.first()?, *self.dates.last()?))
    }

    pub fn info(&self) -> TableInfo {
        TableInfo {
            rows: self.len(),
            columns: self.columns.clone(),
            start: self.dates.first().copied(),
            end: self.dates.last().copied(),
        }
    }
}

/// Shape and date range of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub rows: usize,
    pub columns: Vec<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn valid_table() {
        let t = ConsolidatedTable::new(
            vec![d(2), d(3)],
            vec![("SPY".into(), vec![470.0, 468.5]), ("VIX".into(), vec![13.2, 14.0])],
        )
        .unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.width(), 2);
        assert_eq!(t.column("VIX").unwrap(), &[13.2, 14.0]);
        assert_eq!(t.row(1), vec![468.5, 14.0]);
        assert_eq!(t.span(), Some((d(2), d(3))));
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = ConsolidatedTable::new(vec![d(3), d(2)], vec![("a".into(), vec![1.0, 2.0])])
            .unwrap_err();
        assert_eq!(err, TableError::NotIncreasing { previous: d(3), date: d(2) });
    }

    #[test]
    fn rejects_repeated_dates() {
        let err = ConsolidatedTable::new(vec![d(2), d(2)], vec![("a".into(), vec![1.0, 2.0])])
            .unwrap_err();
        assert!(matches!(err, TableError::NotIncreasing { .. }));
    }

    #[test]
    fn rejects_nan() {
        let err = ConsolidatedTable::new(vec![d(2)], vec![("a".into(), vec![f64::NAN])]).unwrap_err();
        assert!(matches!(err, TableError::NonFinite { .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = ConsolidatedTable::new(
            vec![d(2)],
            vec![("a".into(), vec![1.0]), ("a".into(), vec![2.0])],
        )
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("a".into()));
    }

    #[test]
    fn info_of_empty_table() {
        let t = ConsolidatedTable::new(vec![], vec![("a".into(), vec![])]).unwrap();
        let info = t.info();
        assert_eq!(info.rows, 0);
        assert_eq!(info.start, None);
        assert_eq!(info.columns, vec!["a".to_string()]);
    }
}
