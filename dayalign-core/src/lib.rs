//! dayalign core: calendars, series model, validation, resampling,
//! reindexing, forward fill, spreads, and consolidation.
//!
//! Every stage is a pure transform: it borrows its input and returns a new
//! value. The holiday calendar is passed in explicitly, never looked up from
//! global state.
//!
//! Per-series flow: raw → [`resample`] (intraday only) → [`validate`] →
//! [`align`] → [`fill`] → [`consolidate`].

pub mod align;
pub mod calendar;
pub mod consolidate;
pub mod data;
pub mod domain;
pub mod fill;
pub mod resample;
pub mod spread;
pub mod table;
pub mod validate;

pub use align::{canonical_axis, reindex, reindex_to_calendar, OutOfRange};
pub use calendar::{CalendarKind, HolidayCalendar};
pub use consolidate::{
    consolidate, AlignTarget, ConsolidateError, Consolidation, ConsolidationInput,
    ConsolidationSummary,
};
pub use domain::{DomainPolicy, Frequency, IntradayBar, OhlcvBar, Series, SeriesError};
pub use fill::forward_fill;
pub use resample::{resample_daily, ResampleError};
pub use spread::{derive_spread, SpreadError};
pub use table::{ConsolidatedTable, TableError, TableInfo};
pub use validate::{check_anomalies, check_time_gaps, AnomalyKind, ValidationError};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the runner moves across rayon workers is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Series>();
        require_sync::<Series>();
        require_send::<HolidayCalendar>();
        require_sync::<HolidayCalendar>();
        require_send::<ConsolidatedTable>();
        require_sync::<ConsolidatedTable>();
        require_send::<ConsolidationInput<'static>>();
        require_sync::<ConsolidationInput<'static>>();

        require_send::<ValidationError>();
        require_sync::<ValidationError>();
        require_send::<ConsolidateError>();
        require_sync::<ConsolidateError>();
        require_send::<data::IngestError>();
        require_sync::<data::IngestError>();
        require_send::<data::EncodeError>();
        require_sync::<data::EncodeError>();
    }
}
