pub mod backtesting;
pub mod config;
pub mod reporting;
mod shared;
pub mod validation;
