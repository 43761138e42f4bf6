use std::collections::BTreeMap;
use tidewater_domain::entities::portfolio::Portfolio;
use tidewater_domain::events::{FillEvent, MarketEvent, OrderEvent, SignalEvent};
use tidewater_domain::services::backtest::{Backtest, BacktestResults};
use tidewater_domain::services::data_feed::{DataFeed, FeedUpdate, HistoricalBarFeed};
use tidewater_domain::services::execution::{ExecutionHandler, SimulatedExecutionHandler};
use tidewater_domain::services::fees::PerShareCommission;
use tidewater_domain::services::strategy::{HoldStrategy, Strategy};
use tidewater_domain::value_objects::bar::{Bar, BarSeries};
use tidewater_domain::value_objects::price_field::PriceField;
use tidewater_domain::value_objects::signal_direction::SignalDirection;

const CAPITAL: f64 = 100_000.0;

fn feed(closes: &[f64]) -> HistoricalBarFeed {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(idx, close)| Bar {
            symbol: "AAPL".to_string(),
            timestamp: 1_000 + idx as i64 * 60,
            open: *close,
            high: *close,
            low: *close,
            close: *close,
            volume: 1_000.0,
            period_return: 0.0,
        })
        .collect();
    HistoricalBarFeed::new(vec![BarSeries::new("AAPL", bars)], PriceField::Close).expect("feed")
}

fn portfolio() -> Portfolio {
    Portfolio::new(&["AAPL".to_string()], 0, CAPITAL)
}

/// Emits a fixed list of directions on chosen ticks.
struct Scripted {
    plan: BTreeMap<u64, Vec<SignalDirection>>,
}

impl Scripted {
    fn new(plan: &[(u64, SignalDirection)]) -> Self {
        let mut by_tick: BTreeMap<u64, Vec<SignalDirection>> = BTreeMap::new();
        for (tick, direction) in plan {
            by_tick.entry(*tick).or_default().push(*direction);
        }
        Self { plan: by_tick }
    }
}

impl Strategy for Scripted {
    fn name(&self) -> &str {
        "scripted"
    }

    fn calculate_signals(&mut self, market: &MarketEvent, _feed: &dyn DataFeed) -> Vec<SignalEvent> {
        self.plan
            .get(&market.tick)
            .map(|directions| {
                directions
                    .iter()
                    .map(|direction| {
                        SignalEvent::new("scripted", "AAPL", market.timestamp, *direction, 1.0)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Checks that the feed never shows more than the current tick.
#[derive(Default)]
struct LookAheadWatch {
    violations: Vec<u64>,
}

impl Strategy for LookAheadWatch {
    fn name(&self) -> &str {
        "look_ahead_watch"
    }

    fn calculate_signals(&mut self, market: &MarketEvent, feed: &dyn DataFeed) -> Vec<SignalEvent> {
        let visible = feed.get_latest_bars("AAPL", usize::MAX);
        let newest = visible.last().map(|bar| bar.timestamp);
        if visible.len() as u64 != market.tick + 1 || newest != Some(market.timestamp) {
            self.violations.push(market.tick);
        }
        Vec::new()
    }
}

/// A venue that echoes every execution report under the same fill id.
struct ReplayingVenue {
    inner: SimulatedExecutionHandler,
}

impl ExecutionHandler for ReplayingVenue {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn DataFeed) -> Option<FillEvent> {
        let mut fill = self.inner.execute(order, feed)?;
        fill.id = 1;
        Some(fill)
    }
}

/// A venue that books every execution under another symbol.
struct MisroutingVenue {
    inner: SimulatedExecutionHandler,
}

impl ExecutionHandler for MisroutingVenue {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn DataFeed) -> Option<FillEvent> {
        let mut fill = self.inner.execute(order, feed)?;
        fill.symbol = "MSFT".to_string();
        Some(fill)
    }
}

fn run<S: Strategy>(closes: &[f64], strategy: S) -> BacktestResults {
    Backtest::new(
        "scenario",
        feed(closes),
        strategy,
        SimulatedExecutionHandler::default(),
        portfolio(),
    )
    .run()
}

#[test]
fn round_trip_at_twelve_costs_two_commissions() {
    let strategy = Scripted::new(&[(3, SignalDirection::Long), (4, SignalDirection::Exit)]);
    let results = run(&[10.0, 10.0, 10.0, 12.0, 12.0], strategy);

    assert_eq!(results.stats.ticks, 5);
    assert_eq!(results.stats.signals, 2);
    assert_eq!(results.stats.orders, 2);
    assert_eq!(results.stats.fills, 2);
    assert_eq!(results.fills.len(), 2);
    assert!(results.fills.iter().all(|fill| fill.fill_cost == 12.0));
    assert!(results
        .fills
        .iter()
        .all(|fill| (fill.commission - 1.0).abs() < 1e-12));

    let portfolio = &results.portfolio;
    assert!((portfolio.cash() - 99_998.0).abs() < 1e-9);
    assert!((portfolio.commission() - 2.0).abs() < 1e-12);
    assert_eq!(portfolio.position("AAPL"), 0);

    let holdings = portfolio.holdings_history();
    assert_eq!(holdings.len(), 6);
    let quantities: Vec<i64> = portfolio
        .positions_history()
        .iter()
        .map(|snapshot| snapshot.quantities["AAPL"])
        .collect();
    assert_eq!(quantities, vec![0, 0, 0, 0, 0, 100]);

    let last = holdings.last().expect("last snapshot");
    assert!((last.market_values["AAPL"] - 1_200.0).abs() < 1e-9);
    assert!((last.total - 99_999.0).abs() < 1e-9);
}

#[test]
fn idle_run_keeps_cash_untouched() {
    let closes = [10.0, 11.0, 9.0, 12.0, 8.0, 10.5, 11.0];
    let results = run(&closes, HoldStrategy);

    let holdings = results.portfolio.holdings_history();
    assert_eq!(holdings.len(), closes.len() + 1);
    assert!(holdings.iter().all(|row| row.cash == CAPITAL && row.total == CAPITAL));

    let summary = results.summary(252.0);
    assert_eq!(summary.total_return, 0.0);
    assert!(summary.sharpe_ratio.is_nan());
    assert_eq!(summary.max_drawdown, 0.0);
    assert_eq!(summary.periods, closes.len() + 1);
}

#[test]
fn strategies_only_see_the_current_prefix() {
    let mut watch = LookAheadWatch::default();
    let mut feed = feed(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    let mut tick = 0;
    while let FeedUpdate::Bars(set) = feed.advance() {
        watch.calculate_signals(
            &MarketEvent {
                tick,
                timestamp: set.timestamp,
            },
            &feed,
        );
        tick += 1;
    }
    assert_eq!(tick, 6);
    assert!(watch.violations.is_empty());
}

#[test]
fn repeated_long_and_exit_when_flat_are_ignored() {
    let strategy = Scripted::new(&[
        (0, SignalDirection::Exit),
        (1, SignalDirection::Long),
        (2, SignalDirection::Long),
        (3, SignalDirection::Short),
    ]);
    let results = run(&[10.0, 10.0, 10.0, 10.0, 10.0], strategy);

    assert_eq!(results.stats.signals, 4);
    assert_eq!(results.stats.orders, 1);
    assert_eq!(results.stats.ignored_signals, 3);
    assert_eq!(results.portfolio.position("AAPL"), 100);

    let ignored = results
        .audit_events
        .iter()
        .filter(|event| event.stage == "signal" && event.action == "ignored")
        .count();
    assert_eq!(ignored, 3);
}

#[test]
fn replayed_fill_ids_are_applied_once() {
    let strategy = Scripted::new(&[(0, SignalDirection::Long), (1, SignalDirection::Exit)]);
    let venue = ReplayingVenue {
        inner: SimulatedExecutionHandler::new(
            "SIM",
            PriceField::Close,
            Box::new(PerShareCommission::default()),
        ),
    };
    let results = Backtest::new("replay", feed(&[10.0, 11.0, 12.0]), strategy, venue, portfolio()).run();

    assert_eq!(results.stats.orders, 2);
    assert_eq!(results.stats.fills, 1);
    assert_eq!(results.stats.duplicate_fills, 1);
    assert_eq!(results.portfolio.position("AAPL"), 100);
    assert!((results.portfolio.cash() - (CAPITAL - 1_001.0)).abs() < 1e-9);
    assert!(results
        .audit_events
        .iter()
        .any(|event| event.stage == "fill" && event.action == "duplicate"));
}

#[test]
fn fills_for_untracked_symbols_leave_the_ledger_alone() {
    let strategy = Scripted::new(&[(0, SignalDirection::Long)]);
    let venue = MisroutingVenue {
        inner: SimulatedExecutionHandler::default(),
    };
    let results =
        Backtest::new("misrouted", feed(&[10.0, 11.0, 12.0]), strategy, venue, portfolio()).run();

    assert_eq!(results.stats.orders, 1);
    assert_eq!(results.stats.fills, 0);
    assert_eq!(results.stats.untracked_fills, 1);
    assert!(results.fills.is_empty());
    assert!(!results.portfolio.current_positions().contains_key("MSFT"));
    assert_eq!(results.portfolio.cash(), CAPITAL);
    assert!(results
        .equity_curve()
        .iter()
        .all(|point| point.total == CAPITAL));
    assert!(results
        .audit_events
        .iter()
        .any(|event| event.stage == "fill" && event.action == "untracked"));
}

#[test]
fn equity_curve_follows_the_total_column() {
    let strategy = Scripted::new(&[(0, SignalDirection::Long)]);
    let results = run(&[10.0, 12.0, 9.0], strategy);
    let curve = results.equity_curve();

    assert_eq!(curve.len(), 4);
    assert_eq!(curve[0].returns, 0.0);
    assert_eq!(curve[0].equity_curve, 1.0);
    for point in &curve {
        assert!(point.drawdown >= 0.0);
        assert!(point.equity_curve.is_finite());
    }
    // Bought 100 at 10 on the first tick: valued at 12 then 9 afterwards.
    assert!((curve[2].total - (CAPITAL - 1_001.0 + 1_200.0)).abs() < 1e-9);
    assert!((curve[3].total - (CAPITAL - 1_001.0 + 900.0)).abs() < 1e-9);
    assert!(curve[3].drawdown > 0.0);
}
