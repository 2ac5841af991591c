//! Bars: raw intraday observations and the daily OHLCV bars built from them.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One sub-daily OHLCV observation, timestamped in the source's wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntradayBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl IntradayBar {
    /// Calendar date the observation is grouped under.
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Name of the first non-finite field, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// Daily OHLCV bar aggregated from intraday observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> IntradayBar {
        IntradayBar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
            volume: 50_000.0,
        }
    }

    #[test]
    fn date_drops_time_of_day() {
        assert_eq!(
            sample_bar().date(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
        );
    }

    #[test]
    fn non_finite_field_detected() {
        assert_eq!(sample_bar().non_finite_field(), None);
        let mut bar = sample_bar();
        bar.low = f64::NAN;
        assert_eq!(bar.non_finite_field(), Some("low"));
    }
}
