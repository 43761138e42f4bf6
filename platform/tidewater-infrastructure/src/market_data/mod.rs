pub mod csv_ohlcv;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tidewater_domain::services::ohlcv::DataQualityReport;
use tidewater_domain::value_objects::bar::Bar;

pub use csv_ohlcv::CsvMarketDataRepository;

/// Sorts raw rows by timestamp, keeps the last row per timestamp and fills
/// in the duplicate and gap counters of `report`.
pub(crate) fn canonicalize_bars(
    mut bars_raw: Vec<Bar>,
    expected_step_seconds: Option<i64>,
    report: &mut DataQualityReport,
) -> Vec<Bar> {
    report.duplicates = 0;
    report.gaps = 0;
    report.first_gap = None;
    report.first_duplicate = None;
    report.max_gap_seconds = None;

    // Stable sort keeps file order among equal timestamps, so the last row wins.
    bars_raw.sort_by_key(|bar| bar.timestamp);

    let mut bars: Vec<Bar> = Vec::with_capacity(bars_raw.len());
    for bar in bars_raw {
        if let Some(last) = bars.last_mut() {
            if bar.timestamp == last.timestamp {
                report.duplicates += 1;
                if report.first_duplicate.is_none() {
                    report.first_duplicate = Some(bar.timestamp);
                }
                *last = bar;
                continue;
            }
        }
        bars.push(bar);
    }

    report.bars = bars.len();
    report.first_timestamp = bars.first().map(|b| b.timestamp);
    report.last_timestamp = bars.last().map(|b| b.timestamp);

    let step = expected_step_seconds.unwrap_or(1).max(1);
    let mut max_gap: Option<i64> = None;
    for pair in bars.windows(2) {
        let diff = pair[1].timestamp - pair[0].timestamp;
        if diff > step {
            report.gaps += 1;
            if report.first_gap.is_none() {
                report.first_gap = Some(pair[1].timestamp);
            }
            max_gap = Some(max_gap.map_or(diff, |current| current.max(diff)));
        }
    }
    report.max_gap_seconds = max_gap;

    bars
}

pub(crate) fn record_out_of_order(
    report: &mut DataQualityReport,
    last_seen: &mut Option<i64>,
    ts: i64,
) {
    if let Some(prev) = *last_seen {
        if ts < prev {
            report.out_of_order += 1;
            if report.first_out_of_order.is_none() {
                report.first_out_of_order = Some(ts);
            }
        }
    }
    *last_seen = Some(ts);
}

pub(crate) fn record_invalid_close(report: &mut DataQualityReport, ts: i64) {
    report.invalid_close += 1;
    if report.first_invalid_close.is_none() {
        report.first_invalid_close = Some(ts);
    }
}

pub(crate) fn is_valid_close(close: f64) -> bool {
    close.is_finite() && close > 0.0
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS+ZZZZ`, naive datetimes and bare
/// dates; naive values are read as UTC.
pub fn parse_timestamp(value: &str) -> Result<i64, String> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        let dt: DateTime<Utc> = Utc.from_utc_datetime(&naive);
        return Ok(dt.timestamp());
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }
    if let Ok(seconds) = value.parse::<i64>() {
        return Ok(seconds);
    }

    Err(format!("unsupported timestamp format: {}", value))
}
