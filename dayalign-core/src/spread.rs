//! Derived spreads: `left - right` over the outer join of two single-column series.

use crate::domain::{DomainPolicy, Series, SeriesError};
use crate::validate::{first_duplicate, ValidationError};
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpreadError {
    #[error("spread '{spread}': input '{series}' has {width} value columns, expected 1")]
    NotSingleColumn {
        spread: String,
        series: String,
        width: usize,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Element-wise `left - right` after an outer join on date.
///
/// A date present on only one side yields a missing value, as does a date
/// where either side is missing. The result may legitimately be negative
/// (an inverted curve), so it carries [`DomainPolicy::Unrestricted`]; its
/// frequency is the left input's.
pub fn derive_spread(name: &str, left: &Series, right: &Series) -> Result<Series, SpreadError> {
    let l = single_column(name, left)?;
    let r = single_column(name, right)?;

    let dates: BTreeSet<NaiveDate> = l.keys().chain(r.keys()).copied().collect();
    let values: Vec<Option<f64>> = dates
        .iter()
        .map(|date| match (l.get(date), r.get(date)) {
            (Some(Some(a)), Some(Some(b))) => Some(a - b),
            _ => None,
        })
        .collect();

    let spread = Series::single(name, left.frequency(), dates.into_iter().collect(), values)?
        .with_domain(DomainPolicy::Unrestricted);
    tracing::debug!(
        spread = name,
        left = left.name(),
        right = right.name(),
        rows = spread.len(),
        missing = spread.missing_count(),
        "derived spread"
    );
    Ok(spread)
}

fn single_column(spread: &str, series: &Series) -> Result<HashMap<NaiveDate, Option<f64>>, SpreadError> {
    let mut columns = series.columns();
    let (Some((_, values)), None) = (columns.next(), columns.next()) else {
        return Err(SpreadError::NotSingleColumn {
            spread: spread.to_string(),
            series: series.name().to_string(),
            width: series.width(),
        });
    };
    if let Some(date) = first_duplicate(series.dates()) {
        return Err(ValidationError::DuplicateKey {
            series: series.name().to_string(),
            date,
        }
        .into());
    }
    Ok(series.dates().iter().copied().zip(values.iter().copied()).collect())
}
