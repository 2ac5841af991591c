//! Integrity report: which raw sources are missing which weekdays.
//!
//! Every weekday inside a source's own span that the source lacks, and every
//! date on which it carries an empty cell, becomes one entry. Entries are
//! merged by date so a market-wide closure shows up once with all affected
//! sources. The source's calendar names the holiday when there is one; a
//! date no calendar explains is flagged for review.

use chrono::NaiveDate;
use dayalign_core::validate::missing_value_dates;
use dayalign_core::{HolidayCalendar, Series};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// One source as it was read, before any fill.
#[derive(Debug, Clone, Copy)]
pub struct RawSource<'a> {
    pub series: &'a Series,
    pub calendar: &'a HolidayCalendar,
}

/// Why a source lacks a value on a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Absence {
    /// No row at all for the weekday.
    NoRow,
    /// A row exists but a cell is empty.
    EmptyValue,
}

/// All sources missing one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityEntry {
    pub missing_date: NaiveDate,
    /// Sorted, deduplicated source names.
    pub datasets: Vec<String>,
    /// Holiday names from the affected sources' calendars.
    pub reasons: Vec<String>,
    pub absence: Absence,
    /// Every affected source's calendar treats the date as closed.
    pub explained: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub entries: Vec<IntegrityEntry>,
}

#[derive(Default)]
struct Accumulator {
    datasets: BTreeSet<String>,
    reasons: BTreeSet<String>,
    absence: Option<Absence>,
    explained: bool,
}

impl IntegrityReport {
    pub fn build(sources: &[RawSource<'_>]) -> Self {
        let weekdays = HolidayCalendar::weekdays();
        let mut by_date: BTreeMap<NaiveDate, Accumulator> = BTreeMap::new();

        for source in sources {
            let name = source.series.name();
            let present: BTreeSet<NaiveDate> = source.series.dates().iter().copied().collect();
            let no_row = source
                .series
                .span()
                .into_iter()
                .flat_map(|(start, end)| weekdays.business_days(start, end))
                .filter(|d| !present.contains(d))
                .map(|d| (d, Absence::NoRow));
            let empty = missing_value_dates(source.series)
                .into_iter()
                .map(|d| (d, Absence::EmptyValue));

            for (date, absence) in no_row.chain(empty) {
                let acc = by_date.entry(date).or_insert_with(|| Accumulator {
                    explained: true,
                    ..Accumulator::default()
                });
                acc.datasets.insert(name.to_string());
                match source.calendar.holiday_name(date) {
                    Some(holiday) => {
                        acc.reasons.insert(holiday.to_string());
                    }
                    None => acc.explained = false,
                }
                // A missing row outranks an empty cell on the same date.
                acc.absence = Some(acc.absence.map_or(absence, |a| a.min(absence)));
            }
        }

        let entries = by_date
            .into_iter()
            .map(|(missing_date, acc)| IntegrityEntry {
                missing_date,
                datasets: acc.datasets.into_iter().collect(),
                reasons: acc.reasons.into_iter().collect(),
                absence: acc.absence.unwrap_or(Absence::NoRow),
                explained: acc.explained,
            })
            .collect();
        IntegrityReport { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries no calendar accounts for.
    pub fn unexplained(&self) -> impl Iterator<Item = &IntegrityEntry> {
        self.entries.iter().filter(|e| !e.explained)
    }

    /// Columns: missing_date, datasets, absence, reason, explained.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(["missing_date", "datasets", "absence", "reason", "explained"])?;
        for entry in &self.entries {
            let absence = match entry.absence {
                Absence::NoRow => "no_row",
                Absence::EmptyValue => "empty_value",
            };
            wtr.write_record([
                entry.missing_date.to_string(),
                entry.datasets.join(", "),
                absence.to_string(),
                entry.reasons.join("; "),
                entry.explained.to_string(),
            ])?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dayalign_core::Frequency;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn series(name: &str, dates: &[NaiveDate], values: Vec<Option<f64>>) -> Series {
        Series::single(name, Frequency::Daily, dates.to_vec(), values).unwrap()
    }

    #[test]
    fn good_friday_is_explained_for_equity_only() {
        let equity = HolidayCalendar::us_equity();
        let federal = HolidayCalendar::us_federal();
        let spy = series("SPY", &[d(3, 28), d(4, 1)], vec![Some(1.0); 2]);
        let vix = series("VIX", &[d(3, 28), d(4, 1)], vec![Some(1.0); 2]);

        let report = IntegrityReport::build(&[
            RawSource { series: &spy, calendar: &equity },
            RawSource { series: &vix, calendar: &federal },
        ]);
        assert_eq!(report.len(), 1);
        let entry = &report.entries[0];
        assert_eq!(entry.missing_date, d(3, 29));
        assert_eq!(entry.datasets, vec!["SPY", "VIX"]);
        assert_eq!(entry.reasons, vec!["Good Friday"]);
        assert_eq!(entry.absence, Absence::NoRow);
        assert!(!entry.explained);
        assert_eq!(report.unexplained().count(), 1);
    }

    #[test]
    fn empty_cells_are_reported() {
        let federal = HolidayCalendar::us_federal();
        let curve = series("curve", &[d(1, 8), d(1, 9), d(1, 10)], vec![Some(0.1), None, Some(0.2)]);
        let report = IntegrityReport::build(&[RawSource { series: &curve, calendar: &federal }]);

        assert_eq!(report.len(), 1);
        assert_eq!(report.entries[0].missing_date, d(1, 9));
        assert_eq!(report.entries[0].absence, Absence::EmptyValue);
        assert!(report.entries[0].reasons.is_empty());
    }

    #[test]
    fn complete_source_yields_empty_report() {
        let federal = HolidayCalendar::us_federal();
        let s = series("DGS10", &[d(1, 2), d(1, 3), d(1, 4)], vec![Some(4.0); 3]);
        assert!(IntegrityReport::build(&[RawSource { series: &s, calendar: &federal }]).is_empty());
    }

    #[test]
    fn csv_layout() {
        let equity = HolidayCalendar::us_equity();
        let spy = series("SPY", &[d(3, 28), d(4, 1)], vec![Some(1.0); 2]);
        let report = IntegrityReport::build(&[RawSource { series: &spy, calendar: &equity }]);

        let mut buf = Vec::new();
        report.write_csv(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "missing_date,datasets,absence,reason,explained\n\
             2024-03-29,SPY,no_row,Good Friday,true\n"
        );
    }
}
