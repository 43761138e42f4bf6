use crate::events::{FillEvent, MarketEvent, OrderEvent, SignalEvent};
use crate::services::data_feed::DataFeed;
use crate::services::performance::{self, PerformanceSummary};
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::order_type::OrderType;
use crate::value_objects::price_field::PriceField;
use crate::value_objects::side::Side;
use crate::value_objects::signal_direction::SignalDirection;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_ORDER_QUANTITY: u64 = 100;

/// Ledger column the equity curve is computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquityBasis {
    #[default]
    Total,
    Cash,
}

impl EquityBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquityBasis::Total => "total",
            EquityBasis::Cash => "cash",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub timestamp: i64,
    pub quantities: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingsSnapshot {
    pub timestamp: i64,
    pub cash: f64,
    /// Cumulative commission paid so far.
    pub commission: f64,
    pub market_values: BTreeMap<String, f64>,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    Applied,
    Duplicate,
    /// The fill names a symbol outside the portfolio's universe; nothing changed.
    UntrackedSymbol,
}

/// Position and cash accounting for a single strategy run.
///
/// Quantities change only through `update_fill`; `update_time` only records
/// what the ledger looks like at the latest visible prices.
#[derive(Debug)]
pub struct Portfolio {
    symbols: Vec<String>,
    initial_capital: f64,
    order_quantity: u64,
    price_field: PriceField,
    equity_basis: EquityBasis,
    current_positions: BTreeMap<String, i64>,
    cash: f64,
    commission: f64,
    last_prices: BTreeMap<String, f64>,
    positions_history: Vec<PositionSnapshot>,
    holdings_history: Vec<HoldingsSnapshot>,
    applied_fills: HashSet<u64>,
    next_order_id: u64,
}

impl Portfolio {
    pub fn new(symbols: &[String], start_timestamp: i64, initial_capital: f64) -> Self {
        let current_positions: BTreeMap<String, i64> =
            symbols.iter().map(|symbol| (symbol.clone(), 0)).collect();
        let market_values = symbols.iter().map(|symbol| (symbol.clone(), 0.0)).collect();

        Self {
            symbols: symbols.to_vec(),
            initial_capital,
            order_quantity: DEFAULT_ORDER_QUANTITY,
            price_field: PriceField::default(),
            equity_basis: EquityBasis::default(),
            positions_history: vec![PositionSnapshot {
                timestamp: start_timestamp,
                quantities: current_positions.clone(),
            }],
            holdings_history: vec![HoldingsSnapshot {
                timestamp: start_timestamp,
                cash: initial_capital,
                commission: 0.0,
                market_values,
                total: initial_capital,
            }],
            current_positions,
            cash: initial_capital,
            commission: 0.0,
            last_prices: BTreeMap::new(),
            applied_fills: HashSet::new(),
            next_order_id: 1,
        }
    }

    pub fn with_order_quantity(mut self, quantity: u64) -> Self {
        self.order_quantity = quantity;
        self
    }

    pub fn with_price_field(mut self, field: PriceField) -> Self {
        self.price_field = field;
        self
    }

    pub fn with_equity_basis(mut self, basis: EquityBasis) -> Self {
        self.equity_basis = basis;
        self
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn position(&self, symbol: &str) -> i64 {
        self.current_positions.get(symbol).copied().unwrap_or(0)
    }

    pub fn current_positions(&self) -> &BTreeMap<String, i64> {
        &self.current_positions
    }

    pub fn positions_history(&self) -> &[PositionSnapshot] {
        &self.positions_history
    }

    pub fn holdings_history(&self) -> &[HoldingsSnapshot] {
        &self.holdings_history
    }

    /// Records end-of-tick snapshots valued at the latest visible prices.
    /// Fills produced during this tick are applied after the snapshot.
    pub fn update_time(&mut self, market: &MarketEvent, feed: &dyn DataFeed) {
        for symbol in &self.symbols {
            if let Some(price) = feed.latest_price(symbol, self.price_field) {
                self.last_prices.insert(symbol.clone(), price);
            }
        }

        let mut market_values = BTreeMap::new();
        let mut total = self.cash;
        for (symbol, qty) in &self.current_positions {
            let price = self.last_prices.get(symbol).copied().unwrap_or(0.0);
            let value = *qty as f64 * price;
            total += value;
            market_values.insert(symbol.clone(), value);
        }

        self.positions_history.push(PositionSnapshot {
            timestamp: market.timestamp,
            quantities: self.current_positions.clone(),
        });
        self.holdings_history.push(HoldingsSnapshot {
            timestamp: market.timestamp,
            cash: self.cash,
            commission: self.commission,
            market_values,
            total,
        });
    }

    /// Fixed-lot policy: opens only from flat and exits close the whole position.
    pub fn update_signal(&mut self, signal: &SignalEvent) -> Option<OrderEvent> {
        if !self.symbols.iter().any(|symbol| symbol == &signal.symbol) {
            return None;
        }

        let current = self.position(&signal.symbol);
        let (side, quantity) = match (signal.direction, current) {
            (SignalDirection::Long, 0) => (Side::Buy, self.order_quantity),
            (SignalDirection::Short, 0) => (Side::Sell, self.order_quantity),
            (SignalDirection::Exit, qty) if qty > 0 => (Side::Sell, qty.unsigned_abs()),
            (SignalDirection::Exit, qty) if qty < 0 => (Side::Buy, qty.unsigned_abs()),
            _ => return None,
        };
        if quantity == 0 {
            return None;
        }

        let id = self.next_order_id;
        self.next_order_id += 1;
        Some(OrderEvent {
            id,
            symbol: signal.symbol.clone(),
            timestamp: signal.timestamp,
            order_type: OrderType::Market,
            quantity,
            side,
        })
    }

    pub fn update_fill(&mut self, fill: &FillEvent) -> FillOutcome {
        if !self.current_positions.contains_key(&fill.symbol) {
            return FillOutcome::UntrackedSymbol;
        }
        if !self.applied_fills.insert(fill.id) {
            return FillOutcome::Duplicate;
        }

        let signed_qty = fill.side.sign() * fill.quantity as i64;
        if let Some(position) = self.current_positions.get_mut(&fill.symbol) {
            *position += signed_qty;
        }
        self.cash -= fill.gross_cost() + fill.commission;
        self.commission += fill.commission;
        FillOutcome::Applied
    }

    fn basis_values(&self) -> Vec<f64> {
        self.holdings_history
            .iter()
            .map(|row| match self.equity_basis {
                EquityBasis::Total => row.total,
                EquityBasis::Cash => row.cash,
            })
            .collect()
    }

    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let (returns, curve) = performance::equity_curve(&self.basis_values());
        let dd = performance::drawdowns(&curve);

        self.holdings_history
            .iter()
            .enumerate()
            .map(|(idx, row)| EquityPoint {
                timestamp: row.timestamp,
                cash: row.cash,
                commission: row.commission,
                total: row.total,
                returns: returns[idx],
                equity_curve: curve[idx],
                drawdown: dd.series[idx],
            })
            .collect()
    }

    pub fn summary_stats(&self, periods_per_year: f64) -> PerformanceSummary {
        performance::summarize(&self.basis_values(), periods_per_year)
    }
}

#[cfg(test)]
mod tests {
    use super::{EquityBasis, FillOutcome, Portfolio};
    use crate::events::{FillEvent, SignalEvent};
    use crate::services::fees::ZeroCommission;
    use crate::value_objects::side::Side;
    use crate::value_objects::signal_direction::SignalDirection;

    fn portfolio() -> Portfolio {
        Portfolio::new(&["AAPL".to_string()], 0, 100_000.0)
    }

    fn signal(direction: SignalDirection) -> SignalEvent {
        SignalEvent::new("test", "AAPL", 1, direction, 1.0)
    }

    fn fill(id: u64, side: Side, qty: u64, price: f64, commission: f64) -> FillEvent {
        FillEvent::new(id, id, 1, "AAPL", "ARCA", qty, side, price, Some(commission), &ZeroCommission)
    }

    #[test]
    fn starts_with_one_snapshot_at_initial_capital() {
        let portfolio = portfolio();
        assert_eq!(portfolio.holdings_history().len(), 1);
        assert_eq!(portfolio.positions_history().len(), 1);
        assert_eq!(portfolio.holdings_history()[0].total, 100_000.0);
        assert_eq!(portfolio.position("AAPL"), 0);
    }

    #[test]
    fn opens_only_from_flat() {
        let mut portfolio = portfolio();
        let order = portfolio
            .update_signal(&signal(SignalDirection::Long))
            .expect("long from flat");
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.quantity, 100);
        assert!(portfolio.update_signal(&signal(SignalDirection::Exit)).is_none());

        portfolio.update_fill(&fill(1, Side::Buy, 100, 10.0, 1.0));
        assert!(portfolio.update_signal(&signal(SignalDirection::Long)).is_none());
        assert!(portfolio.update_signal(&signal(SignalDirection::Short)).is_none());

        let exit = portfolio
            .update_signal(&signal(SignalDirection::Exit))
            .expect("exit when long");
        assert_eq!(exit.side, Side::Sell);
        assert_eq!(exit.quantity, 100);
        assert!(exit.id > order.id);
    }

    #[test]
    fn exit_from_short_buys_back() {
        let mut portfolio = portfolio().with_order_quantity(25);
        let order = portfolio
            .update_signal(&signal(SignalDirection::Short))
            .expect("short");
        assert_eq!((order.side, order.quantity), (Side::Sell, 25));
        portfolio.update_fill(&fill(1, Side::Sell, 25, 10.0, 0.0));
        assert_eq!(portfolio.position("AAPL"), -25);
        assert!((portfolio.cash() - 100_250.0).abs() < 1e-9);

        let exit = portfolio
            .update_signal(&signal(SignalDirection::Exit))
            .expect("cover");
        assert_eq!((exit.side, exit.quantity), (Side::Buy, 25));
    }

    #[test]
    fn ignores_unknown_symbols() {
        let mut portfolio = portfolio();
        let other = SignalEvent::new("test", "MSFT", 1, SignalDirection::Long, 1.0);
        assert!(portfolio.update_signal(&other).is_none());

        let stray = FillEvent::new(
            9,
            9,
            1,
            "MSFT",
            "ARCA",
            50,
            Side::Buy,
            20.0,
            Some(1.0),
            &ZeroCommission,
        );
        assert_eq!(portfolio.update_fill(&stray), FillOutcome::UntrackedSymbol);
        assert_eq!(portfolio.position("MSFT"), 0);
        assert!(!portfolio.current_positions().contains_key("MSFT"));
        assert_eq!(portfolio.cash(), 100_000.0);
        assert_eq!(portfolio.commission(), 0.0);

        // the id was not consumed by the rejected fill
        let tracked = fill(9, Side::Buy, 100, 10.0, 1.0);
        assert_eq!(portfolio.update_fill(&tracked), FillOutcome::Applied);
    }

    #[test]
    fn applies_each_fill_once() {
        let mut portfolio = portfolio();
        let buy = fill(7, Side::Buy, 100, 12.0, 1.0);
        assert_eq!(portfolio.update_fill(&buy), FillOutcome::Applied);
        assert_eq!(portfolio.update_fill(&buy), FillOutcome::Duplicate);
        assert_eq!(portfolio.position("AAPL"), 100);
        assert!((portfolio.cash() - (100_000.0 - 1201.0)).abs() < 1e-9);
        assert!((portfolio.commission() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn cash_basis_curve_uses_cash_column() {
        let portfolio = portfolio().with_equity_basis(EquityBasis::Cash);
        let curve = portfolio.equity_curve();
        assert_eq!(curve.len(), 1);
        assert_eq!(curve[0].equity_curve, 1.0);
        assert_eq!(curve[0].drawdown, 0.0);
        assert_eq!(EquityBasis::Cash.as_str(), "cash");
    }
}
