use crate::value_objects::price_field::PriceField;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Fractional change of the traded price field versus the previous bar.
    pub period_return: f64,
}

impl Bar {
    pub fn price(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::High => self.high,
            PriceField::Low => self.low,
            PriceField::Close => self.close,
        }
    }
}

/// One symbol's full history as delivered by a market data repository.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSeries {
    pub symbol: String,
    pub bars: Vec<Bar>,
    /// True when `period_return` came from the source rather than a placeholder.
    pub returns_supplied: bool,
}

impl BarSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
            returns_supplied: false,
        }
    }

    pub fn with_supplied_returns(mut self) -> Self {
        self.returns_supplied = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// `pct_change` over a price series: first value 0, never NaN.
pub fn pct_change(values: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx == 0 {
            out.push(0.0);
            continue;
        }
        let prev = values[idx - 1];
        if prev == 0.0 || !prev.is_finite() || !value.is_finite() {
            out.push(0.0);
        } else {
            out.push(value / prev - 1.0);
        }
    }
    out
}
