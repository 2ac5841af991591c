//! Business-day calendars.
//!
//! A [`HolidayCalendar`] is an immutable description of which weekdays are
//! closed. It is passed explicitly to every stage that needs a canonical date
//! axis, so alternate markets (or test calendars) can be swapped in per series.
//!
//! The canonical axis itself is never stored: [`HolidayCalendar::business_days`]
//! derives it lazily from a `[start, end]` span on every call.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::iter::FusedIterator;

/// How a fixed-date holiday moves when it lands on a weekend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observance {
    /// Never shifted; a weekend holiday simply has no weekday effect.
    None,
    /// Saturday → preceding Friday, Sunday → following Monday.
    NearestWorkday,
    /// Sunday → following Monday; Saturday is not observed.
    SundayToMonday,
}

/// One recurring holiday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolidayRule {
    Fixed {
        name: String,
        month: u32,
        day: u32,
        observance: Observance,
        since: Option<i32>,
    },
    NthWeekday {
        name: String,
        month: u32,
        weekday: Weekday,
        nth: u8,
        since: Option<i32>,
    },
    LastWeekday {
        name: String,
        month: u32,
        weekday: Weekday,
    },
    /// Two days before Western Easter.
    GoodFriday,
}

impl HolidayRule {
    pub fn fixed(name: &str, month: u32, day: u32, observance: Observance) -> Self {
        Self::Fixed {
            name: name.to_string(),
            month,
            day,
            observance,
            since: None,
        }
    }

    pub fn nth_weekday(name: &str, month: u32, weekday: Weekday, nth: u8) -> Self {
        Self::NthWeekday {
            name: name.to_string(),
            month,
            weekday,
            nth,
            since: None,
        }
    }

    pub fn last_weekday(name: &str, month: u32, weekday: Weekday) -> Self {
        Self::LastWeekday {
            name: name.to_string(),
            month,
            weekday,
        }
    }

    /// Restrict the rule to years `>= year`.
    pub fn since(self, year: i32) -> Self {
        match self {
            Self::Fixed {
                name,
                month,
                day,
                observance,
                ..
            } => Self::Fixed {
                name,
                month,
                day,
                observance,
                since: Some(year),
            },
            Self::NthWeekday {
                name,
                month,
                weekday,
                nth,
                ..
            } => Self::NthWeekday {
                name,
                month,
                weekday,
                nth,
                since: Some(year),
            },
            other => other,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Fixed { name, .. }
            | Self::NthWeekday { name, .. }
            | Self::LastWeekday { name, .. } => name,
            Self::GoodFriday => "Good Friday",
        }
    }

    /// The observed closure date for `year`, if the rule produces one.
    ///
    /// A `NearestWorkday` holiday on January 1st that falls on a Saturday is
    /// observed on December 31st of the previous year.
    pub fn observed_in(&self, year: i32) -> Option<NaiveDate> {
        match self {
            Self::Fixed {
                month,
                day,
                observance,
                since,
                ..
            } => {
                if since.is_some_and(|s| year < s) {
                    return None;
                }
                let date = NaiveDate::from_ymd_opt(year, *month, *day)?;
                observe(date, *observance)
            }
            Self::NthWeekday {
                month,
                weekday,
                nth,
                since,
                ..
            } => {
                if since.is_some_and(|s| year < s) {
                    return None;
                }
                NaiveDate::from_weekday_of_month_opt(year, *month, *weekday, *nth)
            }
            Self::LastWeekday { month, weekday, .. } => {
                let next_month = if *month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)?
                };
                let mut date = next_month.pred_opt()?;
                while date.weekday() != *weekday {
                    date = date.pred_opt()?;
                }
                Some(date)
            }
            Self::GoodFriday => Some(easter_sunday(year)? - Duration::days(2)),
        }
    }
}

fn observe(date: NaiveDate, observance: Observance) -> Option<NaiveDate> {
    match (observance, date.weekday()) {
        (_, wd) if !is_weekend(wd) => Some(date),
        (Observance::None, _) => None,
        (Observance::NearestWorkday, Weekday::Sat) => date.pred_opt(),
        (Observance::NearestWorkday, _) | (Observance::SundayToMonday, Weekday::Sun) => {
            date.succ_opt()
        }
        (Observance::SundayToMonday, _) => None,
    }
}

fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}

/// Western (Gregorian) Easter Sunday, anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Named calendar presets selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    /// U.S. federal holidays (bond and macro data publication calendar).
    #[default]
    UsFederal,
    /// U.S. equity exchange sessions (includes Good Friday, no Columbus/Veterans Day).
    UsEquity,
    /// Monday to Friday, no holidays.
    Weekdays,
}

impl CalendarKind {
    pub fn calendar(self) -> HolidayCalendar {
        match self {
            CalendarKind::UsFederal => HolidayCalendar::us_federal(),
            CalendarKind::UsEquity => HolidayCalendar::us_equity(),
            CalendarKind::Weekdays => HolidayCalendar::weekdays(),
        }
    }
}

/// Immutable holiday configuration from which canonical date axes are derived.
#[derive(Debug, Clone, PartialEq)]
pub struct HolidayCalendar {
    name: String,
    rules: Vec<HolidayRule>,
    closures: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(name: impl Into<String>, rules: Vec<HolidayRule>) -> Self {
        Self {
            name: name.into(),
            rules,
            closures: BTreeSet::new(),
        }
    }

    /// Saturdays and Sundays only.
    pub fn weekdays() -> Self {
        Self::new("weekdays", Vec::new())
    }

    /// The U.S. federal holiday schedule, weekend dates shifted to the nearest workday.
    ///
    /// Good Friday is deliberately absent: it is not a federal holiday even
    /// though exchanges close on it.
    pub fn us_federal() -> Self {
        use Observance::NearestWorkday;
        Self::new(
            "us_federal",
            vec![
                HolidayRule::fixed("New Year's Day", 1, 1, NearestWorkday),
                HolidayRule::nth_weekday("Martin Luther King Jr. Day", 1, Weekday::Mon, 3)
                    .since(1986),
                HolidayRule::nth_weekday("Presidents Day", 2, Weekday::Mon, 3),
                HolidayRule::last_weekday("Memorial Day", 5, Weekday::Mon),
                HolidayRule::fixed("Juneteenth", 6, 19, NearestWorkday).since(2021),
                HolidayRule::fixed("Independence Day", 7, 4, NearestWorkday),
                HolidayRule::nth_weekday("Labor Day", 9, Weekday::Mon, 1),
                HolidayRule::nth_weekday("Columbus Day", 10, Weekday::Mon, 2),
                HolidayRule::fixed("Veterans Day", 11, 11, NearestWorkday),
                HolidayRule::nth_weekday("Thanksgiving", 11, Weekday::Thu, 4),
                HolidayRule::fixed("Christmas Day", 12, 25, NearestWorkday),
            ],
        )
    }

    /// U.S. equity exchange full-day closures.
    pub fn us_equity() -> Self {
        use Observance::{NearestWorkday, SundayToMonday};
        Self::new(
            "us_equity",
            vec![
                HolidayRule::fixed("New Year's Day", 1, 1, SundayToMonday),
                HolidayRule::nth_weekday("Martin Luther King Jr. Day", 1, Weekday::Mon, 3)
                    .since(1998),
                HolidayRule::nth_weekday("Presidents Day", 2, Weekday::Mon, 3),
                HolidayRule::GoodFriday,
                HolidayRule::last_weekday("Memorial Day", 5, Weekday::Mon),
                HolidayRule::fixed("Juneteenth", 6, 19, NearestWorkday).since(2022),
                HolidayRule::fixed("Independence Day", 7, 4, NearestWorkday),
                HolidayRule::nth_weekday("Labor Day", 9, Weekday::Mon, 1),
                HolidayRule::nth_weekday("Thanksgiving", 11, Weekday::Thu, 4),
                HolidayRule::fixed("Christmas Day", 12, 25, NearestWorkday),
            ],
        )
    }

    /// Add one-off closures (e.g. a national day of mourning).
    pub fn with_closures(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.closures.extend(dates);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the holiday observed on `date`, if any.
    pub fn holiday_name(&self, date: NaiveDate) -> Option<&str> {
        if self.closures.contains(&date) {
            return Some("Special closure");
        }
        // Dec 31 can carry the next year's observed New Year's Day.
        [date.year(), date.year() + 1].into_iter().find_map(|year| {
            self.rules
                .iter()
                .find(|rule| rule.observed_in(year) == Some(date))
                .map(|rule| rule.name())
        })
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_name(date).is_some()
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date.weekday()) && !self.is_holiday(date)
    }

    /// Weekday holidays observed within `[start, end]`, date ascending.
    pub fn holidays_between(&self, start: NaiveDate, end: NaiveDate) -> BTreeMap<NaiveDate, String> {
        let mut out = BTreeMap::new();
        if start > end {
            return out;
        }
        for year in (start.year() - 1)..=(end.year() + 1) {
            for rule in &self.rules {
                if let Some(date) = rule.observed_in(year) {
                    if date >= start && date <= end && !is_weekend(date.weekday()) {
                        out.entry(date).or_insert_with(|| rule.name().to_string());
                    }
                }
            }
        }
        for date in self.closures.range(start..=end) {
            if !is_weekend(date.weekday()) {
                out.entry(*date)
                    .or_insert_with(|| "Special closure".to_string());
            }
        }
        out
    }

    /// Lazy iterator over business days in `[start, end]` inclusive.
    ///
    /// Empty when `start > end`. A clone taken before consuming replays the
    /// same span.
    pub fn business_days(&self, start: NaiveDate, end: NaiveDate) -> BusinessDays {
        BusinessDays {
            holidays: self.holidays_between(start, end).into_keys().collect(),
            next: Some(start),
            end,
        }
    }

    /// Count of business days in `[start, end]`.
    pub fn count_business_days(&self, start: NaiveDate, end: NaiveDate) -> usize {
        self.business_days(start, end).count()
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::us_federal()
    }
}

/// Iterator produced by [`HolidayCalendar::business_days`].
#[derive(Debug, Clone)]
pub struct BusinessDays {
    holidays: BTreeSet<NaiveDate>,
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for BusinessDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while let Some(date) = self.next {
            if date > self.end {
                self.next = None;
                break;
            }
            self.next = date.succ_opt();
            if !is_weekend(date.weekday()) && !self.holidays.contains(&date) {
                return Some(date);
            }
        }
        None
    }
}

impl FusedIterator for BusinessDays {}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn easter_known_years() {
        assert_eq!(easter_sunday(2024), Some(d(2024, 3, 31)));
        assert_eq!(easter_sunday(2025), Some(d(2025, 4, 20)));
        assert_eq!(easter_sunday(2026), Some(d(2026, 4, 5)));
    }

    #[test]
    fn federal_holidays_2024() {
        let cal = HolidayCalendar::us_federal();
        let got: Vec<NaiveDate> = cal
            .holidays_between(d(2024, 1, 1), d(2024, 12, 31))
            .into_keys()
            .collect();
        assert_eq!(
            got,
            vec![
                d(2024, 1, 1),
                d(2024, 1, 15),
                d(2024, 2, 19),
                d(2024, 5, 27),
                d(2024, 6, 19),
                d(2024, 7, 4),
                d(2024, 9, 2),
                d(2024, 10, 14),
                d(2024, 11, 11),
                d(2024, 11, 28),
                d(2024, 12, 25),
            ]
        );
    }

    #[test]
    fn equity_holidays_2025() {
        let cal = HolidayCalendar::us_equity();
        let got: Vec<NaiveDate> = cal
            .holidays_between(d(2025, 1, 1), d(2025, 12, 31))
            .into_keys()
            .collect();
        assert_eq!(
            got,
            vec![
                d(2025, 1, 1),
                d(2025, 1, 20),
                d(2025, 2, 17),
                d(2025, 4, 18),
                d(2025, 5, 26),
                d(2025, 6, 19),
                d(2025, 7, 4),
                d(2025, 9, 1),
                d(2025, 11, 27),
                d(2025, 12, 25),
            ]
        );
    }

    #[test]
    fn federal_holidays_2025_count() {
        let cal = HolidayCalendar::us_federal();
        let got = cal.holidays_between(d(2025, 1, 1), d(2025, 12, 31));
        assert_eq!(got.len(), 11);
        assert_eq!(got.get(&d(2025, 10, 13)).map(String::as_str), Some("Columbus Day"));
        assert_eq!(got.get(&d(2025, 11, 11)).map(String::as_str), Some("Veterans Day"));
    }

    #[test]
    fn federal_calendar_keeps_good_friday() {
        let cal = HolidayCalendar::us_federal();
        assert!(cal.is_business_day(d(2024, 3, 29)));
        assert!(cal.is_business_day(d(2025, 4, 18)));
    }

    #[test]
    fn equity_calendar_closes_good_friday_but_not_columbus_day() {
        let cal = HolidayCalendar::us_equity();
        assert!(!cal.is_business_day(d(2024, 3, 29)));
        assert_eq!(cal.holiday_name(d(2025, 4, 18)), Some("Good Friday"));
        assert!(cal.is_business_day(d(2024, 10, 14)));
        assert!(cal.is_business_day(d(2024, 11, 11)));
    }

    #[test]
    fn saturday_new_year_observed_previous_friday() {
        let federal = HolidayCalendar::us_federal();
        assert_eq!(federal.holiday_name(d(2021, 12, 31)), Some("New Year's Day"));
        // Exchanges do not close the Friday before a Saturday New Year.
        assert!(HolidayCalendar::us_equity().is_business_day(d(2021, 12, 31)));
    }

    #[test]
    fn weekend_fixed_holidays_shift() {
        let cal = HolidayCalendar::us_federal();
        // 2026-07-04 is a Saturday.
        assert!(!cal.is_business_day(d(2026, 7, 3)));
        // 2022-12-25 is a Sunday.
        assert!(!cal.is_business_day(d(2022, 12, 26)));
    }

    #[test]
    fn juneteenth_starts_2021() {
        let cal = HolidayCalendar::us_federal();
        assert!(cal.is_business_day(d(2020, 6, 19)));
        // 2021-06-19 is a Saturday, observed Friday.
        assert!(!cal.is_business_day(d(2021, 6, 18)));
    }

    #[test]
    fn business_days_january_2024() {
        let cal = HolidayCalendar::us_federal();
        assert_eq!(cal.count_business_days(d(2024, 1, 1), d(2024, 1, 31)), 21);
        let first = cal.business_days(d(2024, 1, 1), d(2024, 1, 31)).next();
        assert_eq!(first, Some(d(2024, 1, 2)));
    }

    #[test]
    fn business_days_is_restartable_and_empty_for_inverted_span() {
        let cal = HolidayCalendar::weekdays();
        let days = cal.business_days(d(2024, 1, 1), d(2024, 1, 7));
        let a: Vec<_> = days.clone().collect();
        let b: Vec<_> = days.collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(cal.business_days(d(2024, 1, 5), d(2024, 1, 1)).count(), 0);
    }

    #[test]
    fn special_closures_are_excluded() {
        let cal = HolidayCalendar::us_equity().with_closures([d(2025, 1, 9)]);
        assert!(!cal.is_business_day(d(2025, 1, 9)));
        assert_eq!(cal.holiday_name(d(2025, 1, 9)), Some("Special closure"));
    }

    #[test]
    fn calendar_kind_deserializes_snake_case() {
        let kind: CalendarKind = serde_json::from_str("\"us_equity\"").unwrap();
        assert_eq!(kind, CalendarKind::UsEquity);
        assert_eq!(kind.calendar().name(), "us_equity");
    }
}
