use crate::config::{validate_config, Config};
use crate::shared::{data_quality_json, load_symbols, resolve_periods_per_year};
use std::time::Instant;
use tidewater_domain::repositories::market_data::MarketDataRepository;
use tidewater_domain::services::data_feed::HistoricalBarFeed;
use tracing::info_span;

/// Checks the config, then that every symbol has data and the symbols share
/// a timeline. `strict` additionally fails on any data quality issue.
pub fn validate(
    config: &Config,
    strict: bool,
    market_data: &dyn MarketDataRepository,
) -> Result<serde_json::Value, String> {
    let _span = info_span!(
        "validate",
        strict = strict,
        run_id = %config.run.run_id,
        symbols = %config.run.symbols.join(","),
        timeframe = %config.run.timeframe
    )
    .entered();

    let stage_start = Instant::now();
    validate_config(config)?;
    let periods_per_year = resolve_periods_per_year(config)?;

    let loaded = load_symbols(config, market_data, "tidewater.validate.load_ohlcv_ms")?;

    let mut per_symbol = serde_json::Map::new();
    let mut dirty = Vec::new();
    for item in &loaded {
        let symbol = &item.series.symbol;
        if item.series.is_empty() {
            return Err(format!("no bars available for {symbol} from {}", config.run.start_date));
        }
        if !item.report.is_clean() {
            dirty.push(symbol.clone());
        }
        metrics::gauge!("tidewater.validate.ohlcv.duplicates", "symbol" => symbol.clone())
            .set(item.report.duplicates as f64);
        metrics::gauge!("tidewater.validate.ohlcv.gaps", "symbol" => symbol.clone())
            .set(item.report.gaps as f64);
        metrics::gauge!("tidewater.validate.ohlcv.invalid_close", "symbol" => symbol.clone())
            .set(item.report.invalid_close as f64);
        per_symbol.insert(symbol.clone(), data_quality_json(&item.report));
    }

    if strict && !dirty.is_empty() {
        return Err(format!(
            "strict validation failed: data quality issues for {}",
            dirty.join(",")
        ));
    }

    let feed = HistoricalBarFeed::new(
        loaded.into_iter().map(|item| item.series).collect(),
        config.run.price_field,
    )
    .map_err(|err| err.to_string())?;

    metrics::histogram!("tidewater.validate.total_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    Ok(serde_json::json!({
        "run_id": config.run.run_id,
        "symbols": config.run.symbols,
        "strict": strict,
        "periods_per_year": periods_per_year,
        "ticks": feed.len(),
        "dropped_bars": feed.dropped_bars(),
        "ohlcv": per_symbol,
    }))
}
