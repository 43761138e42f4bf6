use crate::events::{MarketEvent, SignalEvent};
use crate::services::data_feed::DataFeed;
use crate::value_objects::bar::Bar;
use crate::value_objects::price_field::PriceField;
use crate::value_objects::signal_direction::SignalDirection;
use std::collections::BTreeSet;

/// Turns newly visible market data into advisory signals. Strategies see the
/// feed read-only and never touch the portfolio.
pub trait Strategy {
    fn name(&self) -> &str;

    fn calculate_signals(&mut self, market: &MarketEvent, feed: &dyn DataFeed)
        -> Vec<SignalEvent>;
}

#[derive(Debug, Default)]
pub struct BuyAndHold {
    entered: BTreeSet<String>,
}

impl BuyAndHold {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn calculate_signals(
        &mut self,
        _market: &MarketEvent,
        feed: &dyn DataFeed,
    ) -> Vec<SignalEvent> {
        let mut signals = Vec::new();
        for symbol in feed.symbols() {
            if self.entered.contains(symbol) {
                continue;
            }
            if let Some(bar) = feed.get_latest_bar(symbol) {
                self.entered.insert(symbol.clone());
                signals.push(SignalEvent::new(
                    self.name(),
                    symbol.clone(),
                    bar.timestamp,
                    SignalDirection::Long,
                    1.0,
                ));
            }
        }
        signals
    }
}

/// Long when the short SMA crosses above the long SMA, flat again when it
/// falls back below.
#[derive(Debug)]
pub struct MovingAverageCross {
    short_window: usize,
    long_window: usize,
    price_field: PriceField,
    invested: BTreeSet<String>,
}

impl MovingAverageCross {
    pub fn new(short_window: usize, long_window: usize, price_field: PriceField) -> Self {
        Self {
            short_window,
            long_window,
            price_field,
            invested: BTreeSet::new(),
        }
    }

    fn sma(&self, bars: &[Bar], window: usize) -> Option<f64> {
        if window == 0 || bars.len() < window {
            return None;
        }
        let slice = &bars[bars.len() - window..];
        Some(slice.iter().map(|bar| bar.price(self.price_field)).sum::<f64>() / window as f64)
    }
}

impl Strategy for MovingAverageCross {
    fn name(&self) -> &str {
        "moving_average_cross"
    }

    fn calculate_signals(
        &mut self,
        _market: &MarketEvent,
        feed: &dyn DataFeed,
    ) -> Vec<SignalEvent> {
        let mut signals = Vec::new();
        for symbol in feed.symbols() {
            let bars = feed.get_latest_bars(symbol, self.long_window);
            if bars.len() < self.long_window {
                continue;
            }
            let (Some(short), Some(long)) = (
                self.sma(bars, self.short_window),
                self.sma(bars, self.long_window),
            ) else {
                continue;
            };
            let Some(timestamp) = bars.last().map(|bar| bar.timestamp) else {
                continue;
            };

            let invested = self.invested.contains(symbol);
            if short > long && !invested {
                self.invested.insert(symbol.clone());
                signals.push(SignalEvent::new(
                    self.name(),
                    symbol.clone(),
                    timestamp,
                    SignalDirection::Long,
                    1.0,
                ));
            } else if short < long && invested {
                self.invested.remove(symbol);
                signals.push(SignalEvent::new(
                    self.name(),
                    symbol.clone(),
                    timestamp,
                    SignalDirection::Exit,
                    1.0,
                ));
            }
        }
        signals
    }
}

#[derive(Debug, Default)]
pub struct HoldStrategy;

impl Strategy for HoldStrategy {
    fn name(&self) -> &str {
        "hold"
    }

    fn calculate_signals(
        &mut self,
        _market: &MarketEvent,
        _feed: &dyn DataFeed,
    ) -> Vec<SignalEvent> {
        Vec::new()
    }
}

#[derive(Debug)]
pub enum StrategyKind {
    BuyAndHold(BuyAndHold),
    MovingAverageCross(MovingAverageCross),
    Hold(HoldStrategy),
}

impl Strategy for StrategyKind {
    fn name(&self) -> &str {
        match self {
            StrategyKind::BuyAndHold(strategy) => strategy.name(),
            StrategyKind::MovingAverageCross(strategy) => strategy.name(),
            StrategyKind::Hold(strategy) => strategy.name(),
        }
    }

    fn calculate_signals(
        &mut self,
        market: &MarketEvent,
        feed: &dyn DataFeed,
    ) -> Vec<SignalEvent> {
        match self {
            StrategyKind::BuyAndHold(strategy) => strategy.calculate_signals(market, feed),
            StrategyKind::MovingAverageCross(strategy) => strategy.calculate_signals(market, feed),
            StrategyKind::Hold(strategy) => strategy.calculate_signals(market, feed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BuyAndHold, HoldStrategy, MovingAverageCross, Strategy, StrategyKind};
    use crate::events::MarketEvent;
    use crate::services::data_feed::{DataFeed, FeedUpdate, HistoricalBarFeed};
    use crate::value_objects::bar::{Bar, BarSeries};
    use crate::value_objects::price_field::PriceField;
    use crate::value_objects::signal_direction::SignalDirection;

    fn feed(closes: &[f64]) -> HistoricalBarFeed {
        let bars = closes
            .iter()
            .enumerate()
            .map(|(idx, close)| Bar {
                symbol: "AAPL".to_string(),
                timestamp: idx as i64 * 60,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1.0,
                period_return: 0.0,
            })
            .collect();
        HistoricalBarFeed::new(vec![BarSeries::new("AAPL", bars)], PriceField::Close)
            .expect("feed")
    }

    fn replay<S: Strategy>(strategy: &mut S, closes: &[f64]) -> Vec<(u64, SignalDirection)> {
        let mut feed = feed(closes);
        let mut out = Vec::new();
        let mut tick = 0;
        while let FeedUpdate::Bars(set) = feed.advance() {
            let market = MarketEvent {
                tick,
                timestamp: set.timestamp,
            };
            for signal in strategy.calculate_signals(&market, &feed) {
                out.push((tick, signal.direction));
            }
            tick += 1;
        }
        out
    }

    #[test]
    fn buy_and_hold_enters_once() {
        let mut strategy = BuyAndHold::new();
        assert_eq!(
            replay(&mut strategy, &[1.0, 2.0, 3.0]),
            vec![(0, SignalDirection::Long)]
        );
    }

    #[test]
    fn hold_never_signals() {
        let mut strategy = StrategyKind::Hold(HoldStrategy);
        assert!(replay(&mut strategy, &[1.0, 2.0]).is_empty());
        assert_eq!(strategy.name(), "hold");
    }

    #[test]
    fn crossover_waits_for_long_window_and_uses_recent_bars() {
        let mut strategy = MovingAverageCross::new(2, 3, PriceField::Close);
        let signals = replay(&mut strategy, &[10.0, 10.0, 10.0, 12.0, 13.0, 9.0, 8.0]);
        assert_eq!(
            signals,
            vec![(3, SignalDirection::Long), (5, SignalDirection::Exit)]
        );
    }

    #[test]
    fn crossover_is_silent_on_flat_prices() {
        let mut strategy = MovingAverageCross::new(2, 4, PriceField::Close);
        assert!(replay(&mut strategy, &[5.0; 8]).is_empty());
    }
}
