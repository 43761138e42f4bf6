use super::{
    canonicalize_bars, is_valid_close, parse_timestamp, record_invalid_close, record_out_of_order,
};
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tidewater_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tidewater_domain::services::ohlcv::DataQualityReport;
use tidewater_domain::value_objects::bar::{Bar, BarSeries};

#[derive(Debug, Deserialize)]
pub struct OhlcvRecord {
    pub timestamp_utc: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub returns: Option<f64>,
}

/// Reads `<dir>/<SYMBOL>.csv`, one file per symbol.
#[derive(Debug, Clone)]
pub struct CsvMarketDataRepository {
    dir: PathBuf,
}

impl CsvMarketDataRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }
}

impl MarketDataRepository for CsvMarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(BarSeries, DataQualityReport), String> {
        let path = self.path_for(&query.symbol);
        if !path.exists() {
            metrics::counter!("tidewater.infra.csv.load_ohlcv.calls_total", "result" => "err")
                .increment(1);
            return Err(format!(
                "no OHLCV file for {} at {}",
                query.symbol,
                path.display()
            ));
        }
        load_csv(&path, query)
    }
}

pub fn load_csv(
    path: &Path,
    query: &OhlcvQuery,
) -> Result<(BarSeries, DataQualityReport), String> {
    let overall_start = Instant::now();
    let _span = tracing::info_span!(
        "infra.csv.load_ohlcv",
        path = %path.display(),
        symbol = %query.symbol
    )
    .entered();

    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);
    let returns_supplied = reader
        .headers()
        .map_err(|err| format!("failed to read CSV header {}: {}", path.display(), err))?
        .iter()
        .any(|name| name.trim() == "returns");

    let mut bars_raw = Vec::new();
    let mut report = DataQualityReport::default();
    let mut last_seen_ts: Option<i64> = None;
    let mut rows = 0usize;

    for result in reader.deserialize::<OhlcvRecord>() {
        let record = result.map_err(|err| {
            format!("failed to parse CSV row in {}: {}", path.display(), err)
        })?;
        rows += 1;
        let timestamp = parse_timestamp(&record.timestamp_utc)?;
        if !query.contains(timestamp) {
            continue;
        }

        if !is_valid_close(record.close) {
            record_invalid_close(&mut report, timestamp);
            continue;
        }
        record_out_of_order(&mut report, &mut last_seen_ts, timestamp);

        bars_raw.push(Bar {
            symbol: query.symbol.clone(),
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
            period_return: record.returns.unwrap_or(0.0),
        });
    }

    let bars = canonicalize_bars(bars_raw, query.expected_step_seconds, &mut report);

    metrics::counter!("tidewater.infra.csv.load_ohlcv.calls_total", "result" => "ok")
        .increment(1);
    metrics::histogram!("tidewater.infra.csv.load_ohlcv_ms")
        .record(overall_start.elapsed().as_secs_f64() * 1000.0);
    metrics::counter!("tidewater.infra.csv.load_ohlcv.rows_read_total").increment(rows as u64);
    metrics::gauge!("tidewater.infra.csv.load_ohlcv.bars_loaded", "symbol" => query.symbol.clone())
        .set(bars.len() as f64);
    tracing::debug!(
        rows,
        bars = bars.len(),
        returns_supplied,
        invalid_close = report.invalid_close,
        duplicates = report.duplicates,
        gaps = report.gaps,
        out_of_order = report.out_of_order,
        "loaded OHLCV"
    );

    // Supplied returns are relative to the file's row order; once rows are
    // dropped, folded or reordered they no longer match the canonical bars.
    let returns_usable = returns_supplied
        && report.invalid_close == 0
        && report.duplicates == 0
        && report.out_of_order == 0;
    if returns_supplied && !returns_usable {
        tracing::warn!(
            symbol = %query.symbol,
            "returns column ignored after cleaning rows; returns will be recomputed"
        );
    }

    let series = BarSeries::new(query.symbol.clone(), bars);
    let series = if returns_usable {
        series.with_supplied_returns()
    } else {
        series
    };
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::CsvMarketDataRepository;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};
    use tidewater_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
    use tidewater_domain::services::data_feed::{DataFeed, FeedUpdate, HistoricalBarFeed};
    use tidewater_domain::value_objects::price_field::PriceField;

    fn unique_tmp_dir(name: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!(
            "tidewater_{name}_{}_{}",
            std::process::id(),
            now
        ));
        fs::create_dir_all(&dir).expect("create tmp dir");
        dir
    }

    #[test]
    fn load_detects_duplicates_out_of_order_and_invalid_closes() {
        let dir = unique_tmp_dir("csv_quality");
        let csv_data = "timestamp_utc,open,high,low,close,volume\n\
1970-01-02T00:00:00Z,1,1,1,1,10\n\
1970-01-04T00:00:00Z,3,3,3,3,10\n\
1970-01-03T00:00:00Z,2,2,2,0,10\n\
1970-01-02T00:00:00Z,5,5,5,5,10\n";
        fs::write(dir.join("AAPL.csv"), csv_data).expect("write csv");

        let repo = CsvMarketDataRepository::new(&dir);
        let mut query = OhlcvQuery::new("AAPL");
        query.expected_step_seconds = Some(86_400);
        let (series, report) = repo.load_ohlcv(&query).expect("load csv");

        assert_eq!(series.symbol, "AAPL");
        assert!(!series.returns_supplied);
        assert_eq!(series.bars.len(), 2);
        assert_eq!(series.bars[0].timestamp, 86_400);
        assert!((series.bars[0].close - 5.0).abs() < 1e-9);
        assert_eq!(report.invalid_close, 1);
        assert_eq!(report.first_invalid_close, Some(2 * 86_400));
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.out_of_order, 1);
        assert_eq!(report.gaps, 1);
    }

    #[test]
    fn load_filters_by_query_range_and_reads_returns_column() {
        let dir = unique_tmp_dir("csv_range");
        let csv_data = "timestamp_utc,open,high,low,close,volume,returns\n\
1970-01-01,1,1,1,10,1,0.0\n\
1970-01-02,1,1,1,11,1,0.1\n\
1970-01-03,1,1,1,12,1,0.0909\n";
        fs::write(dir.join("MSFT.csv"), csv_data).expect("write csv");

        let repo = CsvMarketDataRepository::new(&dir);
        let mut query = OhlcvQuery::new("MSFT");
        query.start = Some(86_400);
        let (series, report) = repo.load_ohlcv(&query).expect("load csv");

        assert!(series.returns_supplied);
        assert_eq!(series.bars.len(), 2);
        assert!((series.bars[0].period_return - 0.1).abs() < 1e-12);
        assert_eq!(report.first_timestamp, Some(86_400));
        assert!(report.is_clean());
    }

    #[test]
    fn supplied_returns_are_dropped_once_invalid_rows_are_removed() {
        let dir = unique_tmp_dir("csv_stale_returns");
        let csv_data = "timestamp_utc,open,high,low,close,volume,returns\n\
1970-01-01,10,10,10,10,1,0.0\n\
1970-01-02,0,0,0,0,1,-1.0\n\
1970-01-03,20,20,20,20,1,0.0\n";
        fs::write(dir.join("IBM.csv"), csv_data).expect("write csv");

        let repo = CsvMarketDataRepository::new(&dir);
        let (series, report) = repo.load_ohlcv(&OhlcvQuery::new("IBM")).expect("load csv");
        assert_eq!(report.invalid_close, 1);
        assert!(!series.returns_supplied);

        let mut feed = HistoricalBarFeed::new(vec![series], PriceField::Close).expect("feed");
        while feed.advance() != FeedUpdate::Exhausted {}
        let returns: Vec<f64> = feed
            .get_latest_bars("IBM", 2)
            .iter()
            .map(|bar| bar.period_return)
            .collect();
        assert_eq!(returns, vec![0.0, 1.0]);
    }

    #[test]
    fn missing_symbol_file_names_the_symbol() {
        let dir = unique_tmp_dir("csv_missing");
        let repo = CsvMarketDataRepository::new(&dir);
        let err = repo
            .load_ohlcv(&OhlcvQuery::new("GOOG"))
            .expect_err("missing file");
        assert!(err.contains("GOOG"));
    }
}
