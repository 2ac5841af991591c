//! Domain types: series, intraday observations, daily bars.

pub mod bar;
pub mod series;

pub use bar::{IntradayBar, OhlcvBar};
pub use series::{
    round_to, DomainPolicy, Frequency, Series, SeriesError, PERCENT_DECIMALS, VALUE_COLUMN,
};
