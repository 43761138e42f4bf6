use tidewater_application::config::{Config, DataSource, DB_URL_ENV};
use tidewater_domain::repositories::market_data::MarketDataRepository;
use tidewater_infrastructure::market_data::CsvMarketDataRepository;
use tidewater_infrastructure::persistence::PostgresMarketDataRepository;

const DEFAULT_POOL_MAX_SIZE: u32 = 4;

fn resolve_db_url(config: &Config) -> Result<String, String> {
    match config.data.db_url.as_deref() {
        Some(url) if !url.trim().is_empty() => Ok(url.to_string()),
        _ => std::env::var(DB_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| format!("missing data.db_url in config and env {DB_URL_ENV} is not set")),
    }
}

pub fn build_market_data_repo(config: &Config) -> Result<Box<dyn MarketDataRepository>, String> {
    match config.data.source {
        DataSource::Csv => {
            let dir = config
                .data
                .csv_dir
                .as_deref()
                .ok_or_else(|| "data.csv_dir is required for the csv source".to_string())?;
            Ok(Box::new(CsvMarketDataRepository::new(dir)))
        }
        DataSource::Postgres => {
            let db_url = resolve_db_url(config)?;
            let table = config
                .data
                .ohlcv_table
                .clone()
                .ok_or_else(|| "data.ohlcv_table is required for the postgres source".to_string())?;
            let repo = PostgresMarketDataRepository::new(
                &db_url,
                table,
                config.data.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE),
            )?;
            Ok(Box::new(repo))
        }
    }
}
