use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tidewater_domain::entities::portfolio::{EquityBasis, DEFAULT_ORDER_QUANTITY};
use tidewater_domain::value_objects::price_field::PriceField;
use tidewater_domain::value_objects::timeframe::Timeframe;

pub const DB_URL_ENV: &str = "TIDEWATER_DB_URL";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Csv,
    Postgres,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyName {
    MovingAverageCross,
    BuyAndHold,
    Hold,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub costs: CostsConfig,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
    pub strategy: StrategyConfig,
    pub metrics: Option<MetricsConfig>,
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub symbols: Vec<String>,
    /// `YYYY-MM-DD`, UTC midnight.
    pub start_date: String,
    pub initial_capital: f64,
    #[serde(default)]
    pub price_field: PriceField,
    #[serde(default)]
    pub heartbeat_ms: u64,
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub source: DataSource,
    pub csv_dir: Option<String>,
    pub db_url: Option<String>,
    pub ohlcv_table: Option<String>,
    pub pool_max_size: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct CostsConfig {
    pub commission_per_share: f64,
    pub commission_max_quantity: u64,
    pub commission_cap: Option<f64>,
}

impl Default for CostsConfig {
    fn default() -> Self {
        Self {
            commission_per_share: 0.01,
            commission_max_quantity: 300_000,
            commission_cap: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct PortfolioConfig {
    pub order_quantity: u64,
    pub equity_basis: EquityBasis,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            order_quantity: DEFAULT_ORDER_QUANTITY,
            equity_basis: EquityBasis::Total,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub kind: StrategyName,
    pub short_window: Option<usize>,
    pub long_window: Option<usize>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub periods_per_year: Option<f64>,
    /// Annual rate subtracted from period returns for the excess-return Sharpe.
    pub risk_free_rate: Option<f64>,
    /// Run symbol used as the short leg of the market-neutral Sharpe.
    pub benchmark_symbol: Option<String>,
    pub var_confidence: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub out_dir: String,
}

fn default_timeframe() -> String {
    "1d".to_string()
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let config = parse_config(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    Ok((config, contents))
}

pub fn parse_config(contents: &str) -> Result<Config, String> {
    toml::from_str(contents).map_err(|err| err.to_string())
}

pub fn to_toml_pretty(config: &Config) -> Result<String, String> {
    toml::to_string_pretty(config)
        .map_err(|err| format!("failed to serialize config as TOML: {err}"))
}

/// Static checks that need no data access.
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.run.run_id.trim().is_empty() {
        return Err("run.run_id must not be empty".to_string());
    }
    if config.run.symbols.is_empty() {
        return Err("run.symbols must list at least one symbol".to_string());
    }
    for (idx, symbol) in config.run.symbols.iter().enumerate() {
        if symbol.trim().is_empty() {
            return Err("run.symbols must not contain empty names".to_string());
        }
        if config.run.symbols[..idx].contains(symbol) {
            return Err(format!("run.symbols lists {symbol} more than once"));
        }
    }
    if !config.run.initial_capital.is_finite() || config.run.initial_capital <= 0.0 {
        return Err("run.initial_capital must be finite and > 0".to_string());
    }
    crate::shared::parse_start_date(&config.run.start_date)?;
    Timeframe::parse(&config.run.timeframe)?;

    match config.data.source {
        DataSource::Csv => {
            if config.data.csv_dir.as_deref().unwrap_or("").trim().is_empty() {
                return Err("data.csv_dir is required when data.source = \"csv\"".to_string());
            }
        }
        DataSource::Postgres => {
            if config.data.ohlcv_table.as_deref().unwrap_or("").trim().is_empty() {
                return Err(
                    "data.ohlcv_table is required when data.source = \"postgres\"".to_string(),
                );
            }
        }
    }

    let costs = &config.costs;
    if !costs.commission_per_share.is_finite() || costs.commission_per_share < 0.0 {
        return Err("costs.commission_per_share must be finite and >= 0".to_string());
    }
    if let Some(cap) = costs.commission_cap {
        if !cap.is_finite() || cap < 0.0 {
            return Err("costs.commission_cap must be finite and >= 0".to_string());
        }
    }

    if config.portfolio.order_quantity == 0 {
        return Err("portfolio.order_quantity must be > 0".to_string());
    }

    if config.strategy.kind == StrategyName::MovingAverageCross {
        let (short, long) = crate::shared::resolve_ma_windows(config);
        if short == 0 {
            return Err("strategy.short_window must be > 0".to_string());
        }
        if short >= long {
            return Err(format!(
                "strategy.short_window ({short}) must be smaller than strategy.long_window ({long})"
            ));
        }
    }

    if let Some(periods) = config.metrics.as_ref().and_then(|m| m.periods_per_year) {
        if !periods.is_finite() || periods <= 0.0 {
            return Err("metrics.periods_per_year must be finite and > 0".to_string());
        }
    }
    if let Some(metrics) = config.metrics.as_ref() {
        if let Some(rate) = metrics.risk_free_rate {
            if !rate.is_finite() {
                return Err("metrics.risk_free_rate must be finite".to_string());
            }
        }
        if let Some(confidence) = metrics.var_confidence {
            if !(confidence > 0.0 && confidence < 1.0) {
                return Err("metrics.var_confidence must be in (0, 1)".to_string());
            }
        }
        if let Some(benchmark) = metrics.benchmark_symbol.as_deref() {
            if !config.run.symbols.iter().any(|s| s == benchmark) {
                return Err(format!(
                    "metrics.benchmark_symbol {benchmark} is not one of run.symbols"
                ));
            }
        }
    }

    if config.paths.out_dir.trim().is_empty() {
        return Err("paths.out_dir must not be empty".to_string());
    }

    Ok(())
}
