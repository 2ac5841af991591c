//! Raw CSV ingest.
//!
//! Turns a source file into either a daily [`Series`] or a list of
//! [`IntradayBar`]s. Header names are matched case-insensitively; the date
//! column may be called `date`, `caldt`, `timestamp` or `datetime`.

use crate::domain::{Frequency, IntradayBar, Series, SeriesError, VALUE_COLUMN};
use crate::resample::OHLCV_COLUMNS;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Accepted names for the date column, lowercase.
pub const DATE_ALIASES: [&str; 4] = ["date", "caldt", "timestamp", "datetime"];

/// Cell contents treated as missing, lowercase.
pub const MISSING_MARKERS: [&str; 5] = ["", ".", "na", "nan", "null"];

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%z"];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no date column (expected one of: {})", DATE_ALIASES.join(", "))]
    MissingDateColumn,

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("no value columns besides the date")]
    NoValueColumns,

    #[error("line {line}: unparseable date '{value}'")]
    BadDate { line: usize, value: String },

    #[error("line {line}: column '{column}' has non-numeric value '{value}'")]
    BadNumber {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: intraday field '{column}' is missing")]
    IncompleteBar { line: usize, column: String },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// CSV reader for source series.
#[derive(Debug, Clone, Default)]
pub struct DataIngestor {
    columns: Option<Vec<String>>,
}

impl DataIngestor {
    /// Read every non-date column.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read only the named value columns, in this order.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns: Some(columns),
        }
    }

    /// Parse a daily or macro series.
    ///
    /// A file with exactly one value column yields a [`VALUE_COLUMN`] series,
    /// whatever the header called it. Rows are kept in file order, duplicates
    /// included, so the validator can see them.
    pub fn read_series<R: Read>(
        &self,
        name: &str,
        frequency: Frequency,
        reader: R,
    ) -> Result<Series, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let header_map = build_header_map(&headers);
        let date_idx = find_date_column(&header_map)?;

        let selected: Vec<(String, usize)> = match &self.columns {
            Some(columns) => columns
                .iter()
                .map(|c| {
                    header_map
                        .get(&normalize_header_name(c))
                        .map(|&i| (c.clone(), i))
                        .ok_or_else(|| IngestError::MissingColumn(c.clone()))
                })
                .collect::<Result<_, _>>()?,
            None => headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != date_idx)
                .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_string(), i))
                .collect(),
        };
        if selected.is_empty() {
            return Err(IngestError::NoValueColumns);
        }

        let names: Vec<String> = if selected.len() == 1 {
            vec![VALUE_COLUMN.to_string()]
        } else {
            selected.iter().map(|(n, _)| n.clone()).collect()
        };
        let mut series = Series::new(name, frequency, names)?;

        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = result?;
            let date = parse_date(field(&record, date_idx), line)?;
            let row = selected
                .iter()
                .map(|(column, i)| parse_value(field(&record, *i), column, line))
                .collect::<Result<Vec<_>, _>>()?;
            series.push(date, row)?;
        }

        tracing::debug!(
            series = name,
            rows = series.len(),
            columns = series.width(),
            missing = series.missing_count(),
            "ingested series"
        );
        Ok(series)
    }

    pub fn read_series_file(
        &self,
        name: &str,
        frequency: Frequency,
        path: &Path,
    ) -> Result<Series, IngestError> {
        self.read_series(name, frequency, open(path)?)
    }

    /// Parse sub-daily OHLCV observations, in file order.
    pub fn read_intraday<R: Read>(&self, reader: R) -> Result<Vec<IntradayBar>, IngestError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let header_map = build_header_map(&headers);
        let date_idx = find_date_column(&header_map)?;

        let mut idx = [0usize; 5];
        for (slot, column) in idx.iter_mut().zip(OHLCV_COLUMNS) {
            *slot = *header_map
                .get(column)
                .ok_or_else(|| IngestError::MissingColumn(column.to_string()))?;
        }

        let mut bars = Vec::new();
        for (row, result) in reader.records().enumerate() {
            let line = row + 2;
            let record = result?;
            let raw = field(&record, date_idx);
            let timestamp = parse_timestamp(raw).ok_or_else(|| IngestError::BadDate {
                line,
                value: raw.to_string(),
            })?;
            let mut values = [0f64; 5];
            for ((value, i), column) in values.iter_mut().zip(idx).zip(OHLCV_COLUMNS) {
                *value = parse_value(field(&record, i), column, line)?.ok_or_else(|| {
                    IngestError::IncompleteBar {
                        line,
                        column: column.to_string(),
                    }
                })?;
            }
            let [open, high, low, close, volume] = values;
            bars.push(IntradayBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        tracing::debug!(observations = bars.len(), "ingested intraday observations");
        Ok(bars)
    }

    pub fn read_intraday_file(&self, path: &Path) -> Result<Vec<IntradayBar>, IngestError> {
        self.read_intraday(open(path)?)
    }
}

fn open(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

// Spreadsheet exports sometimes carry a BOM on the first header.
fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn find_date_column(header_map: &HashMap<String, usize>) -> Result<usize, IngestError> {
    DATE_ALIASES
        .iter()
        .find_map(|alias| header_map.get(*alias).copied())
        .ok_or(IngestError::MissingDateColumn)
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

/// Parse a timestamp, keeping its wall-clock reading.
///
/// Offsets are parsed but not applied: `2024-01-02T09:30:00-05:00` is
/// 09:30 on 2024-01-02. Bare dates become midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_local());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_date(s: &str, line: usize) -> Result<NaiveDate, IngestError> {
    parse_timestamp(s)
        .map(|ts| ts.date())
        .ok_or_else(|| IngestError::BadDate {
            line,
            value: s.to_string(),
        })
}

/// Parse one numeric cell; missing markers and NaN become `None`.
pub fn parse_value(s: &str, column: &str, line: usize) -> Result<Option<f64>, IngestError> {
    if MISSING_MARKERS.contains(&s.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => Ok(None),
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(IngestError::BadNumber {
            line,
            column: column.to_string(),
            value: s.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[test]
    fn fred_style_series_with_missing_marker() {
        let csv = "date,DGS10\n2024-01-02,3.95\n2024-01-03,.\n2024-01-04,3.99\n";
        let s = DataIngestor::new()
            .read_series("DGS10", Frequency::Daily, csv.as_bytes())
            .unwrap();
        assert_eq!(s.dates(), &[d(1, 2), d(1, 3), d(1, 4)]);
        assert_eq!(s.column(VALUE_COLUMN).unwrap(), &[Some(3.95), None, Some(3.99)]);
    }

    #[test]
    fn caldt_alias_and_multi_column() {
        let csv = "caldt,Open,Close\n2024-01-02,1.5,2\n2024-01-03,NA,3\n";
        let s = DataIngestor::new()
            .read_series("VIX", Frequency::Daily, csv.as_bytes())
            .unwrap();
        assert_eq!(s.column_names(), &["Open".to_string(), "Close".to_string()]);
        assert_eq!(s.column("Open").unwrap(), &[Some(1.5), None]);
    }

    #[test]
    fn selected_columns_are_case_insensitive() {
        let csv = "Date,symbol,close\n2024-01-02,VIX,13.2\n";
        let s = DataIngestor::with_columns(vec!["Close".into()])
            .read_series("VIX", Frequency::Daily, csv.as_bytes())
            .unwrap();
        assert_eq!(s.column(VALUE_COLUMN).unwrap(), &[Some(13.2)]);
    }

    #[test]
    fn text_column_is_rejected_unless_deselected() {
        let csv = "date,symbol,close\n2024-01-02,VIX,13.2\n";
        let err = DataIngestor::new()
            .read_series("VIX", Frequency::Daily, csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, IngestError::BadNumber { line: 2, .. }));
    }

    #[test]
    fn missing_date_column() {
        let csv = "when,value\n2024-01-02,1\n";
        let err = DataIngestor::new()
            .read_series("X", Frequency::Daily, csv.as_bytes())
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingDateColumn));
    }

    #[test]
    fn duplicate_rows_are_kept() {
        let csv = "date,value\n2024-01-02,1\n2024-01-02,1\n";
        let s = DataIngestor::new()
            .read_series("X", Frequency::Daily, csv.as_bytes())
            .unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn timestamp_formats_keep_wall_clock() {
        let expected = d(1, 2).and_hms_opt(9, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02 09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 09:30"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T09:30:00-05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 09:30:00-05:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02"),
            Some(d(1, 2).and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("02/01/2024 9am"), None);
    }

    #[test]
    fn intraday_bars() {
        let csv = "caldt,open,high,low,close,volume\n\
                   2024-01-02 09:30:00,1,2,0,2,100\n\
                   2024-01-02 16:00:00,2,3,1,3,200\n";
        let bars = DataIngestor::new().read_intraday(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 3.0);
        assert_eq!(bars[0].date(), d(1, 2));
    }

    #[test]
    fn intraday_requires_every_field() {
        let missing_col = "date,open,high,low,close\n2024-01-02 09:30,1,2,0,2\n";
        let err = DataIngestor::new().read_intraday(missing_col.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn(c) if c == "volume"));

        let empty_cell = "date,open,high,low,close,volume\n2024-01-02 09:30,1,,0,2,5\n";
        let err = DataIngestor::new().read_intraday(empty_cell.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::IncompleteBar { line: 2, .. }));
    }
}
