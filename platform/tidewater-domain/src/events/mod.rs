use crate::services::fees::FeeSchedule;
use crate::value_objects::order_type::OrderType;
use crate::value_objects::side::Side;
use crate::value_objects::signal_direction::SignalDirection;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Market(MarketEvent),
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Market(_) => "MARKET",
            Event::Signal(_) => "SIGNAL",
            Event::Order(_) => "ORDER",
            Event::Fill(_) => "FILL",
        }
    }
}

/// A new bar-set is visible to every consumer for this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub tick: u64,
    pub timestamp: i64,
}

/// Advisory output of a strategy; the portfolio decides whether it becomes an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub strategy_id: String,
    pub symbol: String,
    pub timestamp: i64,
    pub direction: SignalDirection,
    pub strength: f64,
}

impl SignalEvent {
    pub fn new(
        strategy_id: impl Into<String>,
        symbol: impl Into<String>,
        timestamp: i64,
        direction: SignalDirection,
        strength: f64,
    ) -> Self {
        let strength = if strength.is_finite() {
            strength.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            timestamp,
            direction,
            strength,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: u64,
    pub symbol: String,
    pub timestamp: i64,
    pub order_type: OrderType,
    pub quantity: u64,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    /// Unique per run; the portfolio applies each id at most once.
    pub id: u64,
    pub order_id: u64,
    pub timestamp: i64,
    pub symbol: String,
    pub exchange: String,
    pub quantity: u64,
    pub side: Side,
    /// Price per unit.
    pub fill_cost: f64,
    pub commission: f64,
}

impl FillEvent {
    /// Builds a fill; when the venue reports no commission the fee schedule prices it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        order_id: u64,
        timestamp: i64,
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        quantity: u64,
        side: Side,
        fill_cost: f64,
        commission: Option<f64>,
        fees: &dyn FeeSchedule,
    ) -> Self {
        let commission = commission.unwrap_or_else(|| fees.commission(quantity));
        Self {
            id,
            order_id,
            timestamp,
            symbol: symbol.into(),
            exchange: exchange.into(),
            quantity,
            side,
            fill_cost,
            commission,
        }
    }

    /// Signed cash flow of the fill excluding commission (positive for buys).
    pub fn gross_cost(&self) -> f64 {
        self.side.sign() as f64 * self.quantity as f64 * self.fill_cost
    }
}
