use crate::error::{EngineError, Result};
use crate::value_objects::bar::{pct_change, Bar, BarSeries};
use crate::value_objects::price_field::PriceField;
use std::collections::{BTreeMap, BTreeSet};

/// The bars revealed by one `advance()` call, one per tracked symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct BarSet {
    pub timestamp: i64,
    pub bars: Vec<Bar>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Bars(BarSet),
    Exhausted,
}

/// Incremental view over market data. Implementations must only ever expose
/// bars up to the most recent `advance()`.
pub trait DataFeed {
    fn symbols(&self) -> &[String];

    /// Last `n` visible bars, fewer during warm-up, empty for unknown symbols.
    fn get_latest_bars(&self, symbol: &str, n: usize) -> &[Bar];

    /// Timestamps of the last `n` visible ticks, oldest first.
    fn get_latest_bars_datetime(&self, n: usize) -> Vec<i64>;

    fn advance(&mut self) -> FeedUpdate;

    fn is_exhausted(&self) -> bool;

    fn get_latest_bar(&self, symbol: &str) -> Option<&Bar> {
        self.get_latest_bars(symbol, 1).last()
    }

    fn latest_price(&self, symbol: &str, field: PriceField) -> Option<f64> {
        self.get_latest_bar(symbol).map(|bar| bar.price(field))
    }
}

/// Replays an eagerly loaded history, synchronized across symbols on the
/// timestamps they all share.
#[derive(Debug)]
pub struct HistoricalBarFeed {
    symbols: Vec<String>,
    series: BTreeMap<String, Vec<Bar>>,
    timeline: Vec<i64>,
    cursor: usize,
    exhausted: bool,
    dropped_bars: BTreeMap<String, usize>,
}

impl HistoricalBarFeed {
    pub fn new(inputs: Vec<BarSeries>, price_field: PriceField) -> Result<Self> {
        if inputs.is_empty() {
            return Err(EngineError::invalid_config("no symbols to replay"));
        }

        let mut symbols = Vec::with_capacity(inputs.len());
        for input in &inputs {
            if symbols.contains(&input.symbol) {
                return Err(EngineError::invalid_config(format!(
                    "symbol {} listed more than once",
                    input.symbol
                )));
            }
            if input.is_empty() {
                return Err(EngineError::data_unavailable(input.symbol.clone()));
            }
            symbols.push(input.symbol.clone());
        }

        let mut common: Option<BTreeSet<i64>> = None;
        for input in &inputs {
            let stamps: BTreeSet<i64> = input.bars.iter().map(|bar| bar.timestamp).collect();
            common = Some(match common {
                None => stamps,
                Some(current) => current.intersection(&stamps).copied().collect(),
            });
        }
        let timeline: Vec<i64> = common.unwrap_or_default().into_iter().collect();
        if timeline.is_empty() {
            return Err(EngineError::data_unavailable(symbols.join(",")));
        }
        let on_timeline: BTreeSet<i64> = timeline.iter().copied().collect();

        let mut series = BTreeMap::new();
        let mut dropped_bars = BTreeMap::new();
        for input in inputs {
            let raw_len = input.bars.len();
            let mut by_ts: BTreeMap<i64, Bar> = BTreeMap::new();
            for mut bar in input.bars {
                if on_timeline.contains(&bar.timestamp) {
                    bar.symbol = input.symbol.clone();
                    by_ts.insert(bar.timestamp, bar);
                }
            }
            let mut aligned: Vec<Bar> = by_ts.into_values().collect();
            let dropped = raw_len - aligned.len();
            if let Some(bad) = aligned
                .iter()
                .find(|bar| !bar.price(price_field).is_finite())
            {
                return Err(EngineError::data_source(format!(
                    "{} has a non-finite {} price at {}",
                    input.symbol,
                    price_field.as_str(),
                    bad.timestamp
                )));
            }

            if !input.returns_supplied || dropped > 0 {
                let prices: Vec<f64> = aligned.iter().map(|bar| bar.price(price_field)).collect();
                for (bar, ret) in aligned.iter_mut().zip(pct_change(&prices)) {
                    bar.period_return = ret;
                }
            } else if let Some(first) = aligned.first_mut() {
                first.period_return = 0.0;
            }

            dropped_bars.insert(input.symbol.clone(), dropped);
            series.insert(input.symbol, aligned);
        }

        Ok(Self {
            symbols,
            series,
            timeline,
            cursor: 0,
            exhausted: false,
            dropped_bars,
        })
    }

    /// Total number of ticks the feed will produce.
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    /// Ticks already revealed.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bars discarded per symbol because the other symbols had no bar at that timestamp.
    pub fn dropped_bars(&self) -> &BTreeMap<String, usize> {
        &self.dropped_bars
    }
}

impl DataFeed for HistoricalBarFeed {
    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn get_latest_bars(&self, symbol: &str, n: usize) -> &[Bar] {
        match self.series.get(symbol) {
            Some(bars) => {
                let visible = &bars[..self.cursor];
                &visible[visible.len().saturating_sub(n)..]
            }
            None => &[],
        }
    }

    fn get_latest_bars_datetime(&self, n: usize) -> Vec<i64> {
        let visible = &self.timeline[..self.cursor];
        visible[visible.len().saturating_sub(n)..].to_vec()
    }

    fn advance(&mut self) -> FeedUpdate {
        if self.cursor >= self.timeline.len() {
            self.exhausted = true;
            return FeedUpdate::Exhausted;
        }

        let index = self.cursor;
        self.cursor += 1;
        let bars = self
            .symbols
            .iter()
            .filter_map(|symbol| self.series.get(symbol).and_then(|bars| bars.get(index)))
            .cloned()
            .collect();

        FeedUpdate::Bars(BarSet {
            timestamp: self.timeline[index],
            bars,
        })
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
