use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Setup-time failures. Runtime policy outcomes (short lookback windows,
/// ignored signals, feed exhaustion) are not errors and never surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("no historical data available for symbol {symbol}")]
    DataUnavailable { symbol: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("data source error: {message}")]
    DataSource { message: String },
}

impl EngineError {
    pub fn data_unavailable(symbol: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn data_source(message: impl Into<String>) -> Self {
        Self::DataSource {
            message: message.into(),
        }
    }
}
