use crate::events::{FillEvent, OrderEvent};
use crate::services::data_feed::DataFeed;
use crate::services::fees::{FeeSchedule, PerShareCommission};
use crate::value_objects::price_field::PriceField;

pub trait ExecutionHandler {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn DataFeed) -> Option<FillEvent>;
}

/// Fills every order in full at the current bar's price. No latency, no slippage.
pub struct SimulatedExecutionHandler {
    exchange: String,
    price_field: PriceField,
    fees: Box<dyn FeeSchedule>,
    next_fill_id: u64,
}

impl SimulatedExecutionHandler {
    pub fn new(exchange: impl Into<String>, price_field: PriceField, fees: Box<dyn FeeSchedule>) -> Self {
        Self {
            exchange: exchange.into(),
            price_field,
            fees,
            next_fill_id: 1,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

impl Default for SimulatedExecutionHandler {
    fn default() -> Self {
        Self::new("ARCA", PriceField::Close, Box::new(PerShareCommission::default()))
    }
}

impl ExecutionHandler for SimulatedExecutionHandler {
    fn execute(&mut self, order: &OrderEvent, feed: &dyn DataFeed) -> Option<FillEvent> {
        let bar = feed.get_latest_bar(&order.symbol)?;
        let price = bar.price(self.price_field);
        let id = self.next_fill_id;
        self.next_fill_id += 1;

        Some(FillEvent::new(
            id,
            order.id,
            bar.timestamp,
            order.symbol.clone(),
            self.exchange.clone(),
            order.quantity,
            order.side,
            price,
            None,
            self.fees.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionHandler, SimulatedExecutionHandler};
    use crate::events::OrderEvent;
    use crate::services::data_feed::{DataFeed, HistoricalBarFeed};
    use crate::services::fees::ZeroCommission;
    use crate::value_objects::bar::{Bar, BarSeries};
    use crate::value_objects::order_type::OrderType;
    use crate::value_objects::price_field::PriceField;
    use crate::value_objects::side::Side;

    fn feed() -> HistoricalBarFeed {
        let bars = vec![Bar {
            symbol: "AAPL".to_string(),
            timestamp: 60,
            open: 11.5,
            high: 12.5,
            low: 11.0,
            close: 12.0,
            volume: 1_000.0,
            period_return: 0.0,
        }];
        HistoricalBarFeed::new(vec![BarSeries::new("AAPL", bars)], PriceField::Close).expect("feed")
    }

    fn order(id: u64, symbol: &str) -> OrderEvent {
        OrderEvent {
            id,
            symbol: symbol.to_string(),
            timestamp: 60,
            order_type: OrderType::Market,
            quantity: 100,
            side: Side::Buy,
        }
    }

    #[test]
    fn fills_in_full_at_current_price() {
        let mut feed = feed();
        feed.advance();
        let mut handler = SimulatedExecutionHandler::default();

        let fill = handler.execute(&order(3, "AAPL"), &feed).expect("fill");
        assert_eq!(fill.order_id, 3);
        assert_eq!(fill.quantity, 100);
        assert_eq!(fill.fill_cost, 12.0);
        assert_eq!(fill.exchange, "ARCA");
        assert!((fill.commission - 1.0).abs() < 1e-12);

        let second = handler.execute(&order(4, "AAPL"), &feed).expect("fill");
        assert_ne!(fill.id, second.id);
    }

    #[test]
    fn honours_price_field_and_fee_schedule() {
        let mut feed = feed();
        feed.advance();
        let mut handler =
            SimulatedExecutionHandler::new("SIM", PriceField::Open, Box::new(ZeroCommission));
        let fill = handler.execute(&order(1, "AAPL"), &feed).expect("fill");
        assert_eq!(fill.fill_cost, 11.5);
        assert_eq!(fill.commission, 0.0);
        assert_eq!(handler.exchange(), "SIM");
    }

    #[test]
    fn no_fill_without_a_visible_price() {
        let mut feed = feed();
        let mut handler = SimulatedExecutionHandler::default();
        assert!(handler.execute(&order(1, "AAPL"), &feed).is_none());
        feed.advance();
        assert!(handler.execute(&order(1, "MSFT"), &feed).is_none());
    }
}
