use crate::config::{validate_config, Config};
use crate::shared::{
    build_fee_schedule, build_strategy, load_symbols, parse_start_date, resolve_periods_per_year,
    risk_meta_json, sort_audit_events, summary_meta_json_from_equity, timing_event,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tidewater_domain::entities::portfolio::Portfolio;
use tidewater_domain::repositories::artifacts::ArtifactWriter;
use tidewater_domain::repositories::market_data::MarketDataRepository;
use tidewater_domain::services::audit::AuditEvent;
use tidewater_domain::services::backtest::{Backtest, BacktestResults, BacktestStats};
use tidewater_domain::services::data_feed::HistoricalBarFeed;
use tidewater_domain::services::execution::SimulatedExecutionHandler;
use tidewater_domain::services::performance::PerformanceSummary;
use tracing::info_span;

pub const SIMULATED_EXCHANGE: &str = "ARCA";

#[derive(Debug)]
pub struct BacktestReport {
    pub run_dir: PathBuf,
    pub summary: PerformanceSummary,
    pub stats: BacktestStats,
}

pub fn run_backtest(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    market_data: &dyn MarketDataRepository,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestReport, String> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        symbols = %config.run.symbols.join(","),
        timeframe = %config.run.timeframe
    )
    .entered();

    validate_config(config)?;
    let start_timestamp = parse_start_date(&config.run.start_date)?;
    let periods_per_year = resolve_periods_per_year(config)?;
    let mut audit_extras: Vec<AuditEvent> = Vec::new();

    let loaded = load_symbols(config, market_data, "tidewater.backtest.load_ohlcv_ms")?;
    for item in &loaded {
        audit_extras.push(timing_event(
            &config.run.run_id,
            Some(&item.series.symbol),
            "load_ohlcv",
            item.load_ms,
            serde_json::json!({
                "rows": item.series.bars.len(),
                "returns_supplied": item.series.returns_supplied,
                "duplicates": item.report.duplicates,
                "gaps": item.report.gaps,
                "out_of_order": item.report.out_of_order,
                "invalid_close": item.report.invalid_close,
            }),
        ));
    }

    let prices: BTreeMap<String, Vec<(i64, f64)>> = loaded
        .iter()
        .map(|item| {
            let series = &item.series;
            let points = series
                .bars
                .iter()
                .map(|bar| (bar.timestamp, bar.price(config.run.price_field)))
                .collect();
            (series.symbol.clone(), points)
        })
        .collect();

    let feed = HistoricalBarFeed::new(
        loaded.into_iter().map(|item| item.series).collect(),
        config.run.price_field,
    )
    .map_err(|err| err.to_string())?;
    for (symbol, dropped) in feed.dropped_bars() {
        if *dropped > 0 {
            tracing::info!(symbol = %symbol, dropped, "bars outside the common timeline were dropped");
        }
    }
    audit_extras.push(AuditEvent {
        run_id: config.run.run_id.clone(),
        timestamp: 0,
        stage: "data".to_string(),
        symbol: None,
        action: "align".to_string(),
        error: None,
        details: serde_json::json!({
            "ticks": feed.len(),
            "dropped_bars": feed.dropped_bars(),
        }),
    });

    let portfolio = Portfolio::new(
        &config.run.symbols,
        start_timestamp,
        config.run.initial_capital,
    )
    .with_order_quantity(config.portfolio.order_quantity)
    .with_price_field(config.run.price_field)
    .with_equity_basis(config.portfolio.equity_basis);
    let execution = SimulatedExecutionHandler::new(
        SIMULATED_EXCHANGE,
        config.run.price_field,
        Box::new(build_fee_schedule(config)),
    );

    let stage_start = Instant::now();
    let results = Backtest::new(
        config.run.run_id.clone(),
        feed,
        build_strategy(config),
        execution,
        portfolio,
    )
    .with_heartbeat(Duration::from_millis(config.run.heartbeat_ms))
    .run();
    let engine_ms = stage_start.elapsed().as_millis() as f64;

    metrics::histogram!("tidewater.backtest.engine_ms").record(engine_ms);
    metrics::gauge!("tidewater.backtest.ticks").set(results.stats.ticks as f64);
    metrics::counter!("tidewater.backtest.signals").increment(results.stats.signals);
    metrics::counter!("tidewater.backtest.orders").increment(results.stats.orders);
    metrics::counter!("tidewater.backtest.fills").increment(results.stats.fills);
    metrics::counter!("tidewater.backtest.ignored_signals")
        .increment(results.stats.ignored_signals);
    metrics::counter!("tidewater.backtest.duplicate_fills")
        .increment(results.stats.duplicate_fills);
    metrics::counter!("tidewater.backtest.untracked_fills")
        .increment(results.stats.untracked_fills);
    metrics::gauge!("tidewater.backtest.ticks_per_sec").set(if engine_ms > 0.0 {
        results.stats.ticks as f64 / (engine_ms / 1000.0)
    } else {
        0.0
    });
    audit_extras.push(timing_event(
        &config.run.run_id,
        None,
        "run_engine",
        engine_ms as u64,
        serde_json::json!({ "ticks": results.stats.ticks }),
    ));

    tracing::info!(
        ticks = results.stats.ticks,
        signals = results.stats.signals,
        orders = results.stats.orders,
        fills = results.stats.fills,
        "backtest finished"
    );

    write_outputs(
        config,
        config_toml,
        out,
        results,
        periods_per_year,
        &prices,
        artifacts,
        audit_extras,
    )
}

#[allow(clippy::too_many_arguments)]
fn write_outputs(
    config: &Config,
    config_toml: &str,
    out: Option<PathBuf>,
    results: BacktestResults,
    periods_per_year: f64,
    prices: &BTreeMap<String, Vec<(i64, f64)>>,
    artifacts: &dyn ArtifactWriter,
    mut audit_extras: Vec<AuditEvent>,
) -> Result<BacktestReport, String> {
    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;

    let equity = results.equity_curve();
    let summary = results.summary(periods_per_year);

    artifacts.write_equity_csv(run_dir.join("equity.csv").as_path(), &equity)?;
    artifacts.write_fills_csv(run_dir.join("fills.csv").as_path(), &results.fills)?;

    let mut meta = summary_meta_json_from_equity(config, &equity);
    if let Some(serde_json::Value::Object(map)) = meta.as_mut() {
        map.insert(
            "periods_per_year".to_string(),
            serde_json::json!(periods_per_year),
        );
        map.insert(
            "stats".to_string(),
            serde_json::to_value(results.stats).unwrap_or(serde_json::Value::Null),
        );
        map.insert(
            "final_positions".to_string(),
            serde_json::json!(results.portfolio.current_positions()),
        );
        map.insert(
            "final_cash".to_string(),
            serde_json::json!(results.portfolio.cash()),
        );
        map.insert(
            "risk".to_string(),
            risk_meta_json(config, &equity, prices, periods_per_year),
        );
    }
    artifacts.write_summary_json(run_dir.join("summary.json").as_path(), &summary, meta.as_ref())?;

    let mut audit_events = results.audit_events;
    audit_events.append(&mut audit_extras);
    sort_audit_events(&mut audit_events);
    artifacts.write_audit_jsonl(run_dir.join("audit.jsonl").as_path(), &audit_events)?;

    artifacts
        .write_config_snapshot_toml(run_dir.join("config_snapshot.toml").as_path(), config_toml)?;

    Ok(BacktestReport {
        run_dir,
        summary,
        stats: results.stats,
    })
}
