pub mod audit;
pub mod backtest;
pub mod data_feed;
pub mod event_queue;
pub mod execution;
pub mod fees;
pub mod ohlcv;
pub mod performance;
pub mod strategy;
