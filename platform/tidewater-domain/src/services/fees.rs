pub trait FeeSchedule {
    fn commission(&self, quantity: u64) -> f64;
}

/// Per-share commission up to `max_quantity`, a flat `cap` beyond it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerShareCommission {
    pub rate: f64,
    pub max_quantity: u64,
    pub cap: f64,
}

impl PerShareCommission {
    pub fn new(rate: f64, max_quantity: u64, cap: Option<f64>) -> Self {
        Self {
            rate,
            max_quantity,
            cap: cap.unwrap_or(rate * max_quantity as f64),
        }
    }
}

impl Default for PerShareCommission {
    fn default() -> Self {
        Self::new(0.01, 300_000, None)
    }
}

impl FeeSchedule for PerShareCommission {
    fn commission(&self, quantity: u64) -> f64 {
        if quantity <= self.max_quantity {
            self.rate * quantity as f64
        } else {
            self.cap
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroCommission;

impl FeeSchedule for ZeroCommission {
    fn commission(&self, _quantity: u64) -> f64 {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::{FeeSchedule, PerShareCommission, ZeroCommission};

    #[test]
    fn per_share_up_to_threshold_then_flat() {
        let fees = PerShareCommission::default();
        assert!((fees.commission(100) - 1.0).abs() < 1e-12);
        assert!((fees.commission(300_000) - 3000.0).abs() < 1e-9);
        assert!((fees.commission(300_001) - 3000.0).abs() < 1e-9);

        let capped = PerShareCommission::new(0.01, 1000, Some(5.0));
        assert!((capped.commission(5000) - 5.0).abs() < 1e-12);
        assert_eq!(ZeroCommission.commission(1_000), 0.0);
    }
}
