//! Intraday → daily OHLCV resampling.
//!
//! Observations are grouped by the calendar date of their wall-clock
//! timestamp. Within a group, "first" and "last" follow row order as
//! received: the caller must supply time-ordered input, nothing is re-sorted.

use crate::domain::{Frequency, IntradayBar, OhlcvBar, Series, SeriesError};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use thiserror::Error;

/// Column order of a resampled series.
pub const OHLCV_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("non-finite {field} at {timestamp} in '{series}'")]
    NonFinite {
        series: String,
        timestamp: NaiveDateTime,
        field: &'static str,
    },

    #[error(transparent)]
    Series(#[from] SeriesError),
}

struct DayAccumulator {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl DayAccumulator {
    fn start(bar: &IntradayBar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }

    fn absorb(&mut self, bar: &IntradayBar) {
        self.high = self.high.max(bar.high);
        self.low = self.low.min(bar.low);
        self.close = bar.close;
        self.volume += bar.volume;
    }
}

/// Collapse intraday observations into one bar per distinct date, date ascending.
pub fn resample_bars(series: &str, bars: &[IntradayBar]) -> Result<Vec<OhlcvBar>, ResampleError> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
    for bar in bars {
        if let Some(field) = bar.non_finite_field() {
            return Err(ResampleError::NonFinite {
                series: series.to_string(),
                timestamp: bar.timestamp,
                field,
            });
        }
        days.entry(bar.date())
            .and_modify(|acc| acc.absorb(bar))
            .or_insert_with(|| DayAccumulator::start(bar));
    }

    Ok(days
        .into_iter()
        .map(|(date, acc)| OhlcvBar {
            date,
            open: acc.open,
            high: acc.high,
            low: acc.low,
            close: acc.close,
            volume: acc.volume,
        })
        .collect())
}

/// Five-column daily series (`open, high, low, close, volume`) from daily bars.
pub fn bars_to_series(name: &str, bars: &[OhlcvBar]) -> Result<Series, SeriesError> {
    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    let column = |f: fn(&OhlcvBar) -> f64| -> Vec<Option<f64>> {
        bars.iter().map(|b| Some(f(b))).collect()
    };
    Series::from_columns(
        name,
        Frequency::Daily,
        dates,
        vec![
            (OHLCV_COLUMNS[0].to_string(), column(|b| b.open)),
            (OHLCV_COLUMNS[1].to_string(), column(|b| b.high)),
            (OHLCV_COLUMNS[2].to_string(), column(|b| b.low)),
            (OHLCV_COLUMNS[3].to_string(), column(|b| b.close)),
            (OHLCV_COLUMNS[4].to_string(), column(|b| b.volume)),
        ],
    )
}

/// Resample intraday observations into a daily OHLCV [`Series`].
pub fn resample_daily(name: &str, bars: &[IntradayBar]) -> Result<Series, ResampleError> {
    let daily = resample_bars(name, bars)?;
    tracing::debug!(
        series = name,
        observations = bars.len(),
        days = daily.len(),
        "resampled intraday series"
    );
    Ok(bars_to_series(name, &daily)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, time: &str, o: f64, h: f64, l: f64, c: f64, v: f64) -> IntradayBar {
        IntradayBar {
            timestamp: NaiveDateTime::parse_from_str(
                &format!("{date} {time}"),
                "%Y-%m-%d %H:%M",
            )
            .unwrap(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }

    #[test]
    fn two_observations_collapse_into_one_bar() {
        let bars = vec![
            bar("2020-01-01", "09:30", 1.0, 2.0, 0.0, 2.0, 100.0),
            bar("2020-01-01", "16:00", 2.0, 3.0, 1.0, 3.0, 200.0),
        ];
        let daily = resample_bars("SPY", &bars).unwrap();
        assert_eq!(
            daily,
            vec![OhlcvBar {
                date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                open: 1.0,
                high: 3.0,
                low: 0.0,
                close: 3.0,
                volume: 300.0,
            }]
        );
    }

    #[test]
    fn first_and_last_follow_row_order() {
        // Deliberately out of time order: row order wins.
        let bars = vec![
            bar("2020-01-02", "15:59", 10.0, 11.0, 9.0, 10.5, 1.0),
            bar("2020-01-02", "09:30", 20.0, 21.0, 19.0, 20.5, 1.0),
        ];
        let daily = resample_bars("SPY", &bars).unwrap();
        assert_eq!(daily[0].open, 10.0);
        assert_eq!(daily[0].close, 20.5);
    }

    #[test]
    fn one_row_per_date_in_date_order() {
        let bars = vec![
            bar("2020-01-03", "09:30", 5.0, 6.0, 4.0, 5.5, 10.0),
            bar("2020-01-02", "09:30", 1.0, 2.0, 0.5, 1.5, 10.0),
            bar("2020-01-03", "10:00", 5.5, 7.0, 5.0, 6.0, 5.0),
        ];
        let series = resample_daily("SPY", &bars).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.column_names(), &OHLCV_COLUMNS.map(String::from));
        assert_eq!(series.column("high").unwrap(), &[Some(2.0), Some(7.0)]);
        assert_eq!(series.column("volume").unwrap(), &[Some(10.0), Some(15.0)]);
        assert_eq!(series.frequency(), Frequency::Daily);
    }

    #[test]
    fn nan_input_is_rejected() {
        let bars = vec![bar("2020-01-02", "09:30", 1.0, f64::NAN, 0.5, 1.5, 10.0)];
        let err = resample_bars("SPY", &bars).unwrap_err();
        assert!(matches!(err, ResampleError::NonFinite { field: "high", .. }));
    }

    #[test]
    fn empty_input_yields_empty_series() {
        let series = resample_daily("SPY", &[]).unwrap();
        assert!(series.is_empty());
    }
}
