pub mod postgres_ohlcv;

pub use postgres_ohlcv::PostgresMarketDataRepository;
