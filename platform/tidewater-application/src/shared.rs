use crate::config::{Config, StrategyName};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::time::Instant;
use tidewater_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use tidewater_domain::services::audit::AuditEvent;
use tidewater_domain::services::fees::PerShareCommission;
use tidewater_domain::services::ohlcv::DataQualityReport;
use tidewater_domain::services::performance::{
    excess_return_sharpe, historical_parametric_var, market_neutral_sharpe,
};
use tidewater_domain::services::strategy::{
    BuyAndHold, HoldStrategy, MovingAverageCross, StrategyKind,
};
use tidewater_domain::value_objects::bar::BarSeries;
use tidewater_domain::value_objects::equity_point::EquityPoint;
use tidewater_domain::value_objects::timeframe::Timeframe;

pub const DEFAULT_SHORT_WINDOW: usize = 100;
pub const DEFAULT_LONG_WINDOW: usize = 400;
pub const DEFAULT_RISK_FREE_RATE: f64 = 0.05;
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

pub fn parse_start_date(value: &str) -> Result<i64, String> {
    let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("invalid run.start_date {value}: {err}"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| format!("invalid run.start_date {value}"))
}

pub fn resolve_ma_windows(config: &Config) -> (usize, usize) {
    (
        config.strategy.short_window.unwrap_or(DEFAULT_SHORT_WINDOW),
        config.strategy.long_window.unwrap_or(DEFAULT_LONG_WINDOW),
    )
}

pub fn resolve_periods_per_year(config: &Config) -> Result<f64, String> {
    if let Some(periods) = config.metrics.as_ref().and_then(|m| m.periods_per_year) {
        return Ok(periods);
    }
    Timeframe::parse(&config.run.timeframe).map(|tf| tf.periods_per_year())
}

pub fn build_strategy(config: &Config) -> StrategyKind {
    match config.strategy.kind {
        StrategyName::MovingAverageCross => {
            let (short, long) = resolve_ma_windows(config);
            StrategyKind::MovingAverageCross(MovingAverageCross::new(
                short,
                long,
                config.run.price_field,
            ))
        }
        StrategyName::BuyAndHold => StrategyKind::BuyAndHold(BuyAndHold::new()),
        StrategyName::Hold => StrategyKind::Hold(HoldStrategy),
    }
}

pub fn build_fee_schedule(config: &Config) -> PerShareCommission {
    PerShareCommission::new(
        config.costs.commission_per_share,
        config.costs.commission_max_quantity,
        config.costs.commission_cap,
    )
}

pub struct LoadedSeries {
    pub series: BarSeries,
    pub report: DataQualityReport,
    pub load_ms: u64,
}

/// Loads every configured symbol from `start_date` on.
pub fn load_symbols(
    config: &Config,
    market_data: &dyn MarketDataRepository,
    metric_name: &'static str,
) -> Result<Vec<LoadedSeries>, String> {
    let start = parse_start_date(&config.run.start_date)?;
    let step = Timeframe::parse(&config.run.timeframe)?.step_seconds;

    let mut loaded = Vec::with_capacity(config.run.symbols.len());
    for symbol in &config.run.symbols {
        let stage_start = Instant::now();
        let (series, report) = market_data
            .load_ohlcv(&OhlcvQuery {
                symbol: symbol.clone(),
                start: Some(start),
                end: None,
                expected_step_seconds: Some(step),
            })
            .map_err(|err| format!("failed to load {symbol}: {err}"))?;
        let elapsed = stage_start.elapsed();
        metrics::histogram!(metric_name).record(elapsed.as_millis() as f64);

        if !report.is_clean() {
            tracing::warn!(
                symbol = %symbol,
                duplicates = report.duplicates,
                out_of_order = report.out_of_order,
                invalid_close = report.invalid_close,
                "data quality issues detected"
            );
        }

        loaded.push(LoadedSeries {
            series,
            report,
            load_ms: elapsed.as_millis() as u64,
        });
    }
    Ok(loaded)
}

pub fn data_quality_json(report: &DataQualityReport) -> serde_json::Value {
    serde_json::json!({
        "bars": report.bars,
        "duplicates": report.duplicates,
        "gaps": report.gaps,
        "out_of_order": report.out_of_order,
        "invalid_close": report.invalid_close,
        "first_timestamp": report.first_timestamp,
        "last_timestamp": report.last_timestamp,
        "first_gap": report.first_gap,
        "first_duplicate": report.first_duplicate,
        "first_out_of_order": report.first_out_of_order,
        "first_invalid_close": report.first_invalid_close,
        "max_gap_seconds": report.max_gap_seconds,
    })
}

pub fn summary_meta_json_from_equity(
    config: &Config,
    equity: &[EquityPoint],
) -> Option<serde_json::Value> {
    let start = equity.first()?.timestamp;
    let end = equity.last()?.timestamp;
    Some(serde_json::json!({
        "run_id": config.run.run_id,
        "symbols": config.run.symbols,
        "timeframe": config.run.timeframe,
        "strategy": config.strategy.kind,
        "equity_basis": config.portfolio.equity_basis.as_str(),
        "start": start,
        "end": end,
    }))
}

/// Risk figures for the summary meta: excess-return Sharpe, parametric VaR
/// of the final equity, and per-symbol market-neutral Sharpe against the
/// configured benchmark. `prices` holds `(timestamp, price)` per symbol.
pub fn risk_meta_json(
    config: &Config,
    equity: &[EquityPoint],
    prices: &BTreeMap<String, Vec<(i64, f64)>>,
    periods_per_year: f64,
) -> serde_json::Value {
    let metrics = config.metrics.as_ref();
    let risk_free_rate = metrics
        .and_then(|m| m.risk_free_rate)
        .unwrap_or(DEFAULT_RISK_FREE_RATE);
    let confidence = metrics
        .and_then(|m| m.var_confidence)
        .unwrap_or(DEFAULT_VAR_CONFIDENCE);

    let returns: Vec<f64> = equity.iter().skip(1).map(|point| point.returns).collect();
    let final_value = equity.last().map(|point| point.total).unwrap_or(0.0);

    let mut risk = serde_json::json!({
        "risk_free_rate": risk_free_rate,
        "excess_sharpe_ratio": excess_return_sharpe(&returns, risk_free_rate, periods_per_year),
        "var_confidence": confidence,
        "value_at_risk": historical_parametric_var(final_value, confidence, &returns),
    });

    let benchmark = metrics.and_then(|m| m.benchmark_symbol.as_deref());
    if let (Some(benchmark), serde_json::Value::Object(map)) = (benchmark, &mut risk) {
        let bench_prices = prices.get(benchmark).map(Vec::as_slice).unwrap_or(&[]);
        let neutral: BTreeMap<&str, f64> = prices
            .iter()
            .filter(|(symbol, _)| symbol.as_str() != benchmark)
            .map(|(symbol, series)| {
                (
                    symbol.as_str(),
                    market_neutral_sharpe(series, bench_prices, periods_per_year),
                )
            })
            .collect();
        map.insert("benchmark_symbol".to_string(), serde_json::json!(benchmark));
        map.insert(
            "market_neutral_sharpe".to_string(),
            serde_json::json!(neutral),
        );
    }
    risk
}

pub fn timing_event(
    run_id: &str,
    symbol: Option<&str>,
    action: &str,
    duration_ms: u64,
    details: serde_json::Value,
) -> AuditEvent {
    AuditEvent {
        run_id: run_id.to_string(),
        timestamp: 0,
        stage: "timing".to_string(),
        symbol: symbol.map(|s| s.to_string()),
        action: action.to_string(),
        error: None,
        details: serde_json::json!({
            "duration_ms": duration_ms,
            "details": details,
        }),
    }
}

pub fn sort_audit_events(events: &mut [AuditEvent]) {
    events.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.stage.cmp(&b.stage))
            .then_with(|| a.action.cmp(&b.action))
    });
}
