use polars::prelude::*;

/// Name of the date column in every encoded table.
pub const DATE_COLUMN: &str = "date";

/// Expected columnar layout of a consolidated table: a `date` Date column
/// followed by any number of Float64 value columns.
pub struct TableSchema;

impl TableSchema {
    /// Validate a DataFrame, returning its value column names in order.
    pub fn validate(df: &DataFrame) -> Result<Vec<String>, SchemaError> {
        let date = df
            .column(DATE_COLUMN)
            .map_err(|_| SchemaError::MissingColumn(DATE_COLUMN.to_string()))?;
        if date.dtype() != &DataType::Date {
            return Err(SchemaError::TypeMismatch {
                column: DATE_COLUMN.to_string(),
                expected: DataType::Date,
                actual: date.dtype().clone(),
            });
        }

        let mut values = Vec::new();
        for column in df.get_columns() {
            let name = column.name().as_str();
            if name == DATE_COLUMN {
                continue;
            }
            if column.dtype() != &DataType::Float64 {
                return Err(SchemaError::TypeMismatch {
                    column: name.to_string(),
                    expected: DataType::Float64,
                    actual: column.dtype().clone(),
                });
            }
            if column.null_count() > 0 {
                return Err(SchemaError::NullValues(name.to_string()));
            }
            values.push(name.to_string());
        }
        Ok(values)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Type mismatch in column {column}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        column: String,
        expected: DataType,
        actual: DataType,
    },

    #[error("Column {0} contains nulls")]
    NullValues(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_column(days: &[i32]) -> Column {
        Column::new(DATE_COLUMN.into(), days.to_vec())
            .cast(&DataType::Date)
            .unwrap()
    }

    #[test]
    fn test_validate_accepts_valid_dataframe() {
        let df = DataFrame::new(vec![
            date_column(&[19724, 19725]),
            Column::new("SPY".into(), vec![470.0, 471.0]),
            Column::new("VIX".into(), vec![13.0, 12.0]),
        ])
        .unwrap();

        let columns = TableSchema::validate(&df).unwrap();
        assert_eq!(columns, vec!["SPY".to_string(), "VIX".to_string()]);
    }

    #[test]
    fn test_validate_rejects_missing_date() {
        let df = DataFrame::new(vec![Column::new("SPY".into(), vec![470.0])]).unwrap();
        assert!(matches!(
            TableSchema::validate(&df).unwrap_err(),
            SchemaError::MissingColumn(_)
        ));
    }

    #[test]
    fn test_validate_rejects_wrong_type() {
        let df = DataFrame::new(vec![
            date_column(&[19724]),
            Column::new("symbol".into(), vec!["SPY"]),
        ])
        .unwrap();
        assert!(matches!(
            TableSchema::validate(&df).unwrap_err(),
            SchemaError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_validate_rejects_nulls() {
        let df = DataFrame::new(vec![
            date_column(&[19724, 19725]),
            Column::new("SPY".into(), vec![Some(470.0), None]),
        ])
        .unwrap();
        assert!(matches!(
            TableSchema::validate(&df).unwrap_err(),
            SchemaError::NullValues(c) if c == "SPY"
        ));
    }
}
