//! Table encodings: CSV text and Parquet columnar.
//!
//! Both round-trip a [`ConsolidatedTable`] exactly. CSV values are written in
//! Rust's shortest round-trip `f64` form, so reading them back yields the same
//! bits. Parquet writes are atomic (write to `.tmp`, rename into place).

use super::schema::{SchemaError, TableSchema, DATE_COLUMN};
use crate::table::{ConsolidatedTable, TableError};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// `num_days_from_ce` of 1970-01-01; Parquet dates are days since the epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Date format of the CSV encoding.
pub const CSV_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(String),

    #[error("first CSV column must be 'date', found '{0}'")]
    MissingDateHeader(String),

    #[error("line {line}: bad date '{value}'")]
    BadDate { line: usize, value: String },

    #[error("line {line}: column '{column}' has bad value '{value}'")]
    BadValue {
        line: usize,
        column: String,
        value: String,
    },

    #[error("date out of range: {0} days since epoch")]
    DateOutOfRange(i64),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Table(#[from] TableError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> EncodeError + '_ {
    move |source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ── CSV ──────────────────────────────────────────────────────────────

/// Write `table` as CSV: a `date` header plus one column per value column.
pub fn write_csv<W: Write>(table: &ConsolidatedTable, writer: W) -> Result<(), EncodeError> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec![DATE_COLUMN.to_string()];
    header.extend(table.column_names().iter().cloned());
    wtr.write_record(&header)?;

    for (i, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(table.width() + 1);
        record.push(date.format(CSV_DATE_FORMAT).to_string());
        record.extend(table.row(i).iter().map(f64::to_string));
        wtr.write_record(&record)?;
    }

    wtr.flush().map_err(|e| EncodeError::Csv(e.into()))?;
    Ok(())
}

pub fn table_to_csv_string(table: &ConsolidatedTable) -> Result<String, EncodeError> {
    let mut buf = Vec::new();
    write_csv(table, &mut buf)?;
    // csv only emits what we gave it, which is UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Read a table written by [`write_csv`].
pub fn read_csv<R: Read>(reader: R) -> Result<ConsolidatedTable, EncodeError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr.headers()?.clone();
    let first = headers.get(0).unwrap_or("");
    if first != DATE_COLUMN {
        return Err(EncodeError::MissingDateHeader(first.to_string()));
    }
    let names: Vec<String> = headers.iter().skip(1).map(String::from).collect();

    let mut dates = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); names.len()];
    for (idx, result) in rdr.records().enumerate() {
        let line = idx + 2;
        let record = result?;
        let raw = record.get(0).unwrap_or("");
        let date = NaiveDate::parse_from_str(raw, CSV_DATE_FORMAT).map_err(|_| {
            EncodeError::BadDate {
                line,
                value: raw.to_string(),
            }
        })?;
        dates.push(date);
        for (j, (name, column)) in names.iter().zip(values.iter_mut()).enumerate() {
            let cell = record.get(j + 1).unwrap_or("");
            let v = cell.parse::<f64>().map_err(|_| EncodeError::BadValue {
                line,
                column: name.clone(),
                value: cell.to_string(),
            })?;
            column.push(v);
        }
    }

    Ok(ConsolidatedTable::new(dates, names.into_iter().zip(values).collect())?)
}

pub fn write_csv_file(table: &ConsolidatedTable, path: &Path) -> Result<(), EncodeError> {
    let file = fs::File::create(path).map_err(io_err(path))?;
    write_csv(table, std::io::BufWriter::new(file))
}

pub fn read_csv_file(path: &Path) -> Result<ConsolidatedTable, EncodeError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    read_csv(file)
}

// ── Parquet ──────────────────────────────────────────────────────────

/// Convert a table to a DataFrame with a Date column and Float64 value columns.
pub fn table_to_dataframe(table: &ConsolidatedTable) -> Result<DataFrame, EncodeError> {
    let days: Vec<i32> = table
        .dates()
        .iter()
        .map(|d| d.num_days_from_ce() - EPOCH_DAYS_FROM_CE)
        .collect();

    let mut columns = Vec::with_capacity(table.width() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(|e| EncodeError::Parquet(format!("date cast: {e}")))?,
    );
    for (name, values) in table.columns() {
        columns.push(Column::new(name.into(), values.to_vec()));
    }

    DataFrame::new(columns).map_err(|e| EncodeError::Parquet(format!("dataframe creation: {e}")))
}

/// Convert a DataFrame back to a table, validating its schema first.
pub fn dataframe_to_table(df: &DataFrame) -> Result<ConsolidatedTable, EncodeError> {
    let names = TableSchema::validate(df)?;
    let col_err = |e: PolarsError| EncodeError::Parquet(format!("column read: {e}"));

    let date_ca = df.column(DATE_COLUMN).map_err(col_err)?.date().map_err(col_err)?;
    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| EncodeError::Parquet(format!("null date at row {i}")))?;
        let date = days
            .checked_add(EPOCH_DAYS_FROM_CE)
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or(EncodeError::DateOutOfRange(days as i64))?;
        dates.push(date);
    }

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let ca = df.column(&name).map_err(col_err)?.f64().map_err(col_err)?;
        let values: Vec<f64> = (0..ca.len()).map(|i| ca.get(i).unwrap_or(f64::NAN)).collect();
        columns.push((name, values));
    }

    Ok(ConsolidatedTable::new(dates, columns)?)
}

/// Write `table` to `path` as Parquet, atomically.
pub fn write_parquet(table: &ConsolidatedTable, path: &Path) -> Result<(), EncodeError> {
    let mut df = table_to_dataframe(table)?;
    let tmp_path = path.with_extension("parquet.tmp");

    let file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
    ParquetWriter::new(file)
        .finish(&mut df)
        .map_err(|e| EncodeError::Parquet(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        io_err(path)(e)
    })?;
    Ok(())
}

pub fn read_parquet(path: &Path) -> Result<ConsolidatedTable, EncodeError> {
    let file = fs::File::open(path).map_err(io_err(path))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| EncodeError::Parquet(format!("read: {e}")))?;
    dataframe_to_table(&df)
}
