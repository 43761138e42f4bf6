pub mod bar;
pub mod equity_point;
pub mod order_type;
pub mod price_field;
pub mod side;
pub mod signal_direction;
pub mod timeframe;
