//! End-to-end tests through the public API: raw CSV → prepared series →
//! consolidated table → encodings.

use chrono::NaiveDate;
use dayalign_core::data::{read_csv, read_parquet, table_to_csv_string, write_parquet, DataIngestor};
use dayalign_core::domain::{Frequency, Series};
use dayalign_core::{
    check_anomalies, check_time_gaps, consolidate, derive_spread, forward_fill, resample_daily,
    AlignTarget, ConsolidationInput, HolidayCalendar,
};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

// ── Helpers ──────────────────────────────────────────────────────────

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = env::temp_dir().join(format!("dayalign_it_{}_{id}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn d(m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, day).unwrap()
}

fn daily(name: &str, csv: &str) -> Series {
    DataIngestor::new()
        .read_series(name, Frequency::Daily, csv.as_bytes())
        .unwrap()
}

// ── Two-series example ───────────────────────────────────────────────

#[test]
fn gap_in_secondary_series_is_forward_filled() {
    let cal = HolidayCalendar::weekdays();
    let secondary = daily("DGS2", "date,value\n2020-01-01,1.58\n2020-01-02,.\n2020-01-03,1.53\n");
    let reference = daily(
        "SPY",
        "date,value\n2020-01-01,321.86\n2020-01-02,324.87\n2020-01-03,322.41\n",
    );

    let out = consolidate(&[
        ConsolidationInput::new(&secondary, &cal),
        ConsolidationInput::new(&reference, &cal).reference(),
    ])
    .unwrap();

    let t = &out.table;
    assert_eq!(t.len(), 3);
    assert_eq!(t.column("DGS2").unwrap(), &[1.58, 1.58, 1.53]);
    assert_eq!(t.column("SPY").unwrap(), &[321.86, 324.87, 322.41]);
}

// ── Realistic mixed pipeline ─────────────────────────────────────────

#[test]
fn intraday_daily_and_macro_sources_consolidate() {
    let equity = HolidayCalendar::us_equity();
    let federal = HolidayCalendar::us_federal();

    // Two sessions of minute bars around Good Friday 2024 (03-29).
    let intraday = "caldt,open,high,low,close,volume\n\
        2024-03-27 09:30:00,521.0,522.0,520.5,521.5,1000\n\
        2024-03-27 16:00:00,521.5,523.0,521.0,522.9,2000\n\
        2024-03-28 09:30:00,523.0,524.0,522.0,523.5,1500\n\
        2024-03-28 16:00:00,523.5,524.5,523.0,523.1,500\n\
        2024-04-01 09:30:00,523.8,524.0,520.0,521.0,800\n\
        2024-04-01 16:00:00,521.0,522.5,520.5,522.2,700\n";
    let bars = DataIngestor::new().read_intraday(intraday.as_bytes()).unwrap();
    let spy = resample_daily("SPY", &bars).unwrap();
    assert!(check_time_gaps(&spy, &equity).is_ok());

    // Bond yields publish on Good Friday (federal calendar), in percent.
    let dgs10 = daily(
        "DGS10",
        "date,DGS10\n2024-03-27,4.19\n2024-03-28,4.20\n2024-03-29,4.20\n2024-04-01,4.33\n",
    );
    let dgs2 = daily(
        "DGS2",
        "date,DGS2\n2024-03-27,4.57\n2024-03-28,4.59\n2024-03-29,.\n2024-04-01,4.72\n",
    );
    assert!(check_time_gaps(&dgs10, &federal).is_ok());

    let curve = derive_spread("curve_10y_2y", &dgs10, &dgs2).unwrap().percent_to_decimal();
    let curve = forward_fill(&curve);
    check_anomalies(&curve).unwrap();
    let dgs10 = dgs10.percent_to_decimal();
    check_anomalies(&dgs10).unwrap();

    let out = consolidate(&[
        ConsolidationInput::new(&spy, &equity).reference(),
        ConsolidationInput::new(&dgs10, &federal),
        ConsolidationInput::new(&curve, &federal).target(AlignTarget::ReferenceSpan),
    ])
    .unwrap();

    let t = &out.table;
    // Good Friday appears only in the bond data; equity sessions define the rows.
    assert_eq!(t.dates(), &[d(3, 27), d(3, 28), d(4, 1)]);
    assert_eq!(
        t.column_names(),
        &[
            "open_SPY", "high_SPY", "low_SPY", "close_SPY", "volume_SPY", "DGS10", "curve_10y_2y"
        ]
        .map(String::from)
    );
    assert_eq!(t.column("close_SPY").unwrap(), &[522.9, 523.1, 522.2]);
    assert_eq!(t.column("volume_SPY").unwrap(), &[3000.0, 2000.0, 1500.0]);
    assert_eq!(t.column("DGS10").unwrap(), &[0.0419, 0.042, 0.0433]);
    assert_eq!(t.column("curve_10y_2y").unwrap(), &[-0.0038, -0.0039, -0.0039]);
}

#[test]
fn monthly_credit_spread_fills_every_session() {
    let equity = HolidayCalendar::us_equity();
    let federal = HolidayCalendar::us_federal();

    let spy = daily(
        "SPY",
        "date,value\n2024-01-08,474.6\n2024-01-09,473.88\n2024-01-10,476.56\n",
    );
    // Monthly releases dated the 1st; 2024-01-01 is itself a holiday.
    let monthly = |name: &str, csv: &str| {
        DataIngestor::new()
            .read_series(name, Frequency::IrregularMacro, csv.as_bytes())
            .unwrap()
    };
    let baa = monthly("BAA", "date,value\n2024-01-01,5.50\n2024-02-01,5.65\n");
    let aaa = monthly("AAA", "date,value\n2024-01-01,4.70\n2024-02-01,4.75\n");
    assert!(check_time_gaps(&baa, &federal).is_err());

    let credit = derive_spread("credit", &baa, &aaa).unwrap().percent_to_decimal();
    assert_eq!(credit.frequency(), Frequency::IrregularMacro);
    let baa = baa.percent_to_decimal();

    let out = consolidate(&[
        ConsolidationInput::new(&spy, &equity).reference(),
        ConsolidationInput::new(&baa, &federal),
        ConsolidationInput::new(&credit, &federal),
    ])
    .unwrap();

    let t = &out.table;
    assert_eq!(t.dates(), &[d(1, 8), d(1, 9), d(1, 10)]);
    assert_eq!(t.column("BAA").unwrap(), &[0.055, 0.055, 0.055]);
    assert_eq!(t.column("credit").unwrap(), &[0.008, 0.008, 0.008]);
    // The February print lies past the reference's last session.
    assert!(out.summary.reference_dropped > 0);

    let pinned = consolidate(&[
        ConsolidationInput::new(&spy, &equity).reference(),
        ConsolidationInput::new(&credit, &federal).target(AlignTarget::ReferenceSpan),
    ])
    .unwrap();
    assert_eq!(pinned.table.column("credit").unwrap(), &[0.008, 0.008, 0.008]);
}

#[test]
fn negative_rate_is_rejected_before_consolidation() {
    let s = daily("DGS2", "date,value\n2024-01-02,-0.1\n");
    let err = check_anomalies(&s).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("domain violation"));
    assert!(message.contains("DGS2"));
}

// ── Encodings ────────────────────────────────────────────────────────

#[test]
fn consolidated_table_roundtrips_through_both_encodings() {
    let cal = HolidayCalendar::weekdays();
    let spy = daily("SPY", "date,value\n2024-01-02,472.65\n2024-01-03,468.79\n");
    let rate = daily("DGS10", "date,value\n2024-01-02,3.95\n2024-01-03,3.91\n").percent_to_decimal();
    let table = consolidate(&[
        ConsolidationInput::new(&spy, &cal).reference(),
        ConsolidationInput::new(&rate, &cal),
    ])
    .unwrap()
    .table;

    let text = table_to_csv_string(&table).unwrap();
    assert_eq!(read_csv(text.as_bytes()).unwrap(), table);

    let dir = temp_dir();
    let path = dir.join("consolidated.parquet");
    write_parquet(&table, &path).unwrap();
    assert_eq!(read_parquet(&path).unwrap(), table);
    let _ = fs::remove_dir_all(&dir);
}
