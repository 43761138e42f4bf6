/// One row of the equity curve, projected from a holdings snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub cash: f64,
    pub commission: f64,
    pub total: f64,
    pub returns: f64,
    pub equity_curve: f64,
    pub drawdown: f64,
}
