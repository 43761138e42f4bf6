use crate::market_data::{
    canonicalize_bars, is_valid_close, record_invalid_close, record_out_of_order,
};
use chrono::{DateTime, Utc};
use postgres::types::ToSql;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use std::time::Instant;
use tidewater_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tidewater_domain::services::ohlcv::DataQualityReport;
use tidewater_domain::value_objects::bar::{Bar, BarSeries};

pub type PgPool = Pool<PostgresConnectionManager<NoTls>>;

#[derive(Debug, Clone)]
pub struct PostgresMarketDataRepository {
    pool: PgPool,
    pub ohlcv_table: String,
}

impl PostgresMarketDataRepository {
    pub fn new(db_url: &str, ohlcv_table: String, pool_max_size: u32) -> Result<Self, String> {
        if let Err(err) = validate_table_name(&ohlcv_table) {
            return Err(format!("invalid ohlcv_table '{}': {}", ohlcv_table, err));
        }

        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size.max(1))
            .build(manager)
            .map_err(|err| format!("failed to build postgres pool: {err}"))?;

        Ok(Self { pool, ohlcv_table })
    }
}

impl MarketDataRepository for PostgresMarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(BarSeries, DataQualityReport), String> {
        load_postgres(&self.pool, &self.ohlcv_table, query)
    }
}

fn select_sql(table: &str, query: &OhlcvQuery) -> String {
    let mut sql = format!(
        "SELECT timestamp_utc, open, high, low, close, volume FROM {} WHERE symbol=$1",
        table
    );
    let mut param = 1;
    if query.start.is_some() {
        param += 1;
        sql.push_str(&format!(" AND timestamp_utc >= ${param}"));
    }
    if query.end.is_some() {
        param += 1;
        sql.push_str(&format!(" AND timestamp_utc <= ${param}"));
    }
    sql.push_str(" ORDER BY timestamp_utc ASC");
    sql
}

fn to_datetime(ts: i64) -> Result<DateTime<Utc>, String> {
    DateTime::<Utc>::from_timestamp(ts, 0).ok_or_else(|| format!("timestamp out of range: {ts}"))
}

fn record_error(stage: &'static str) {
    metrics::counter!("tidewater.infra.postgres.load_ohlcv.calls_total", "result" => "err")
        .increment(1);
    metrics::counter!("tidewater.infra.postgres.load_ohlcv.errors_total", "stage" => stage)
        .increment(1);
}

pub fn load_postgres(
    pool: &PgPool,
    table: &str,
    query: &OhlcvQuery,
) -> Result<(BarSeries, DataQualityReport), String> {
    let overall_start = Instant::now();
    let _span = tracing::info_span!(
        "infra.postgres.load_ohlcv",
        table = %table,
        symbol = %query.symbol
    )
    .entered();

    if let Err(err) = validate_table_name(table) {
        record_error("validate_table");
        tracing::warn!(error = %err, "invalid table name");
        return Err(err);
    }

    let start = query.start.map(to_datetime).transpose()?;
    let end = query.end.map(to_datetime).transpose()?;
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&query.symbol];
    if let Some(start) = start.as_ref() {
        params.push(start);
    }
    if let Some(end) = end.as_ref() {
        params.push(end);
    }

    let get_start = Instant::now();
    let mut client = match pool.get() {
        Ok(client) => client,
        Err(err) => {
            record_error("pool_get");
            tracing::error!(error = %err, "failed to checkout postgres connection");
            return Err(format!("failed to checkout postgres connection: {err}"));
        }
    };
    metrics::histogram!("tidewater.infra.postgres.pool.get_ms")
        .record(get_start.elapsed().as_secs_f64() * 1000.0);

    let sql = select_sql(table, query);
    let query_start = Instant::now();
    let rows = match client.query(sql.as_str(), &params) {
        Ok(rows) => rows,
        Err(err) => {
            record_error("query");
            tracing::error!(error = %err, "failed to query OHLCV");
            return Err(format!("failed to query OHLCV for {}: {err}", query.symbol));
        }
    };
    metrics::histogram!("tidewater.infra.postgres.query_ms")
        .record(query_start.elapsed().as_secs_f64() * 1000.0);

    let rows_len = rows.len();
    let mut bars_raw = Vec::with_capacity(rows_len);
    let mut report = DataQualityReport::default();
    let mut last_seen_ts: Option<i64> = None;

    for row in rows {
        let timestamp: DateTime<Utc> = row
            .try_get(0)
            .map_err(|err| format!("failed to decode timestamp_utc: {err}"))?;
        let ts = timestamp.timestamp();
        let close: f64 = row
            .try_get(4)
            .map_err(|err| format!("failed to decode close: {err}"))?;
        if !is_valid_close(close) {
            record_invalid_close(&mut report, ts);
            continue;
        }
        record_out_of_order(&mut report, &mut last_seen_ts, ts);

        let decode = |idx: usize, name: &str| -> Result<f64, String> {
            row.try_get(idx)
                .map_err(|err| format!("failed to decode {name}: {err}"))
        };
        bars_raw.push(Bar {
            symbol: query.symbol.clone(),
            timestamp: ts,
            open: decode(1, "open")?,
            high: decode(2, "high")?,
            low: decode(3, "low")?,
            close,
            volume: decode(5, "volume")?,
            period_return: 0.0,
        });
    }

    let bars = canonicalize_bars(bars_raw, query.expected_step_seconds, &mut report);

    metrics::counter!("tidewater.infra.postgres.load_ohlcv.calls_total", "result" => "ok")
        .increment(1);
    metrics::histogram!("tidewater.infra.postgres.load_ohlcv_ms")
        .record(overall_start.elapsed().as_secs_f64() * 1000.0);
    metrics::counter!("tidewater.infra.postgres.load_ohlcv.rows_returned_total")
        .increment(rows_len as u64);
    metrics::gauge!("tidewater.infra.postgres.load_ohlcv.bars_loaded", "symbol" => query.symbol.clone())
        .set(bars.len() as f64);
    metrics::gauge!("tidewater.infra.postgres.load_ohlcv.invalid_close")
        .set(report.invalid_close as f64);

    tracing::debug!(
        rows = rows_len,
        bars = bars.len(),
        invalid_close = report.invalid_close,
        duplicates = report.duplicates,
        gaps = report.gaps,
        out_of_order = report.out_of_order,
        "loaded OHLCV"
    );
    Ok((BarSeries::new(query.symbol.clone(), bars), report))
}

fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 {
        return Err(format!("invalid table name: {table}"));
    }
    for part in parts {
        let mut chars = part.chars();
        let valid_first = matches!(chars.next(), Some(ch) if ch.is_ascii_alphabetic() || ch == '_');
        if !valid_first || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
            return Err(format!("invalid table name: {table}"));
        }
    }
    Ok(())
}
