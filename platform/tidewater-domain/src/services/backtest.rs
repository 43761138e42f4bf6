use crate::entities::portfolio::{FillOutcome, Portfolio};
use crate::events::{Event, FillEvent, MarketEvent, OrderEvent, SignalEvent};
use crate::services::audit::AuditEvent;
use crate::services::data_feed::{DataFeed, FeedUpdate};
use crate::services::event_queue::EventQueue;
use crate::services::execution::ExecutionHandler;
use crate::services::performance::PerformanceSummary;
use crate::services::strategy::Strategy;
use crate::value_objects::equity_point::EquityPoint;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BacktestStats {
    pub ticks: u64,
    pub signals: u64,
    pub orders: u64,
    pub fills: u64,
    pub ignored_signals: u64,
    pub unfilled_orders: u64,
    pub duplicate_fills: u64,
    pub untracked_fills: u64,
}

#[derive(Debug)]
pub struct BacktestResults {
    pub run_id: String,
    pub strategy: String,
    pub stats: BacktestStats,
    pub portfolio: Portfolio,
    pub fills: Vec<FillEvent>,
    pub audit_events: Vec<AuditEvent>,
}

impl BacktestResults {
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        self.portfolio.equity_curve()
    }

    pub fn summary(&self, periods_per_year: f64) -> PerformanceSummary {
        self.portfolio.summary_stats(periods_per_year)
    }
}

/// Drives one simulation: one `Market` event per tick, then every event the
/// tick caused is drained before the feed advances again.
pub struct Backtest<F, S, E>
where
    F: DataFeed,
    S: Strategy,
    E: ExecutionHandler,
{
    run_id: String,
    feed: F,
    strategy: S,
    execution: E,
    portfolio: Portfolio,
    queue: EventQueue,
    heartbeat: Duration,
    stats: BacktestStats,
    fills: Vec<FillEvent>,
    audit_events: Vec<AuditEvent>,
}

impl<F, S, E> Backtest<F, S, E>
where
    F: DataFeed,
    S: Strategy,
    E: ExecutionHandler,
{
    pub fn new(
        run_id: impl Into<String>,
        feed: F,
        strategy: S,
        execution: E,
        portfolio: Portfolio,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            feed,
            strategy,
            execution,
            portfolio,
            queue: EventQueue::new(),
            heartbeat: Duration::ZERO,
            stats: BacktestStats::default(),
            fills: Vec::new(),
            audit_events: Vec::new(),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn run(mut self) -> BacktestResults {
        self.audit(
            0,
            "engine",
            None,
            "start",
            json!({
                "strategy": self.strategy.name(),
                "symbols": self.feed.symbols(),
                "initial_capital": self.portfolio.initial_capital(),
            }),
        );

        loop {
            if !self.feed.is_exhausted() {
                if let FeedUpdate::Bars(set) = self.feed.advance() {
                    self.queue.push(Event::Market(MarketEvent {
                        tick: self.stats.ticks,
                        timestamp: set.timestamp,
                    }));
                    self.stats.ticks += 1;
                }
            }

            while let Some(event) = self.queue.pop() {
                self.dispatch(event);
            }

            if self.feed.is_exhausted() && self.queue.is_empty() {
                break;
            }
            if !self.heartbeat.is_zero() {
                std::thread::sleep(self.heartbeat);
            }
        }

        let last_timestamp = self
            .portfolio
            .holdings_history()
            .last()
            .map(|row| row.timestamp)
            .unwrap_or(0);
        self.audit(
            last_timestamp,
            "engine",
            None,
            "complete",
            json!({
                "ticks": self.stats.ticks,
                "signals": self.stats.signals,
                "orders": self.stats.orders,
                "fills": self.stats.fills,
                "ignored_signals": self.stats.ignored_signals,
                "duplicate_fills": self.stats.duplicate_fills,
                "untracked_fills": self.stats.untracked_fills,
                "cash": self.portfolio.cash(),
            }),
        );

        BacktestResults {
            run_id: self.run_id,
            strategy: self.strategy.name().to_string(),
            stats: self.stats,
            portfolio: self.portfolio,
            fills: self.fills,
            audit_events: self.audit_events,
        }
    }

    fn dispatch(&mut self, event: Event) {
        match event {
            Event::Market(market) => self.on_market(&market),
            Event::Signal(signal) => self.on_signal(&signal),
            Event::Order(order) => self.on_order(&order),
            Event::Fill(fill) => self.on_fill(fill),
        }
    }

    fn on_market(&mut self, market: &MarketEvent) {
        let signals = self.strategy.calculate_signals(market, &self.feed);
        self.queue.extend(signals.into_iter().map(Event::Signal));
        self.portfolio.update_time(market, &self.feed);
    }

    fn on_signal(&mut self, signal: &SignalEvent) {
        self.stats.signals += 1;
        match self.portfolio.update_signal(signal) {
            Some(order) => self.queue.push(Event::Order(order)),
            None => {
                self.stats.ignored_signals += 1;
                self.audit(
                    signal.timestamp,
                    "signal",
                    Some(signal.symbol.as_str()),
                    "ignored",
                    json!({
                        "strategy_id": signal.strategy_id,
                        "direction": signal.direction.as_str(),
                        "strength": signal.strength,
                        "position": self.portfolio.position(&signal.symbol),
                    }),
                );
            }
        }
    }

    fn on_order(&mut self, order: &OrderEvent) {
        self.stats.orders += 1;
        self.audit(
            order.timestamp,
            "order",
            Some(order.symbol.as_str()),
            "submit",
            json!({
                "order_id": order.id,
                "side": order.side.as_str(),
                "quantity": order.quantity,
                "order_type": order.order_type.as_str(),
            }),
        );

        match self.execution.execute(order, &self.feed) {
            Some(fill) => self.queue.push(Event::Fill(fill)),
            None => {
                self.stats.unfilled_orders += 1;
                self.audit(
                    order.timestamp,
                    "order",
                    Some(order.symbol.as_str()),
                    "unfilled",
                    json!({ "order_id": order.id }),
                );
            }
        }
    }

    fn on_fill(&mut self, fill: FillEvent) {
        match self.portfolio.update_fill(&fill) {
            FillOutcome::Applied => {
                self.stats.fills += 1;
                self.audit(
                    fill.timestamp,
                    "fill",
                    Some(fill.symbol.as_str()),
                    "apply",
                    json!({
                        "fill_id": fill.id,
                        "order_id": fill.order_id,
                        "side": fill.side.as_str(),
                        "quantity": fill.quantity,
                        "price": fill.fill_cost,
                        "commission": fill.commission,
                        "exchange": fill.exchange,
                    }),
                );
                self.fills.push(fill);
            }
            FillOutcome::Duplicate => {
                self.stats.duplicate_fills += 1;
                self.audit(
                    fill.timestamp,
                    "fill",
                    Some(fill.symbol.as_str()),
                    "duplicate",
                    json!({ "fill_id": fill.id, "order_id": fill.order_id }),
                );
            }
            FillOutcome::UntrackedSymbol => {
                self.stats.untracked_fills += 1;
                self.audit(
                    fill.timestamp,
                    "fill",
                    Some(fill.symbol.as_str()),
                    "untracked",
                    json!({ "fill_id": fill.id, "order_id": fill.order_id }),
                );
            }
        }
    }

    fn audit(
        &mut self,
        timestamp: i64,
        stage: &str,
        symbol: Option<&str>,
        action: &str,
        details: serde_json::Value,
    ) {
        self.audit_events.push(AuditEvent {
            run_id: self.run_id.clone(),
            timestamp,
            stage: stage.to_string(),
            symbol: symbol.map(str::to_string),
            action: action.to_string(),
            error: None,
            details,
        });
    }
}
