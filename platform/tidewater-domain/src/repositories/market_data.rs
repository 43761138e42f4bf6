use crate::services::ohlcv::DataQualityReport;
use crate::value_objects::bar::BarSeries;

#[derive(Debug, Clone)]
pub struct OhlcvQuery {
    pub symbol: String,
    /// Inclusive lower bound, unix seconds.
    pub start: Option<i64>,
    /// Inclusive upper bound, unix seconds.
    pub end: Option<i64>,
    pub expected_step_seconds: Option<i64>,
}

impl OhlcvQuery {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            start: None,
            end: None,
            expected_step_seconds: None,
        }
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        self.start.map_or(true, |start| timestamp >= start)
            && self.end.map_or(true, |end| timestamp <= end)
    }
}

pub trait MarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(BarSeries, DataQualityReport), String>;
}
