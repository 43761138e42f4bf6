use crate::value_objects::bar::pct_change;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Drawdowns {
    pub series: Vec<f64>,
    pub durations: Vec<u64>,
    pub max_drawdown: f64,
    pub max_duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Fractional, 0.05 is +5%.
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub drawdown_duration: u64,
    pub periods: usize,
}

impl PerformanceSummary {
    pub fn report_rows(&self) -> Vec<(String, String)> {
        let sharpe = if self.sharpe_ratio.is_nan() {
            "NaN".to_string()
        } else {
            format!("{:.2}", self.sharpe_ratio)
        };
        vec![
            (
                "Total Return".to_string(),
                format!("{:.2}%", self.total_return * 100.0),
            ),
            ("Sharpe Ratio".to_string(), sharpe),
            (
                "Max Drawdown".to_string(),
                format!("{:.2}%", self.max_drawdown * 100.0),
            ),
            (
                "Drawdown Duration".to_string(),
                self.drawdown_duration.to_string(),
            ),
        ]
    }
}

/// Annualized Sharpe ratio with a zero benchmark. NaN when undefined.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns
        .iter()
        .map(|ret| {
            let diff = ret - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);

    // Rounding noise on a constant series is treated as zero dispersion.
    let std = var.sqrt();
    if !std.is_finite() || std <= f64::EPSILON * mean.abs().max(1.0) {
        return f64::NAN;
    }
    periods_per_year.sqrt() * mean / std
}

/// Sharpe ratio of returns in excess of an annual risk-free rate spread
/// evenly over `periods_per_year`.
pub fn excess_return_sharpe(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let per_period = risk_free_rate / periods_per_year;
    let excess: Vec<f64> = returns.iter().map(|ret| ret - per_period).collect();
    sharpe_ratio(&excess, periods_per_year)
}

/// Net period returns of an equal-capital long asset / short benchmark book.
/// Prices are `(timestamp, price)` pairs; only timestamps present in both
/// series are used, and the first joined row has no return.
pub fn market_neutral_returns(asset: &[(i64, f64)], benchmark: &[(i64, f64)]) -> Vec<f64> {
    let benchmark: BTreeMap<i64, f64> = benchmark.iter().copied().collect();
    let mut joined: BTreeMap<i64, (f64, f64)> = BTreeMap::new();
    for (ts, price) in asset {
        if let Some(bench) = benchmark.get(ts) {
            joined.insert(*ts, (*price, *bench));
        }
    }
    let asset_prices: Vec<f64> = joined.values().map(|(asset, _)| *asset).collect();
    let bench_prices: Vec<f64> = joined.values().map(|(_, bench)| *bench).collect();

    pct_change(&asset_prices)
        .into_iter()
        .zip(pct_change(&bench_prices))
        .skip(1)
        .map(|(asset_ret, bench_ret)| (asset_ret - bench_ret) / 2.0)
        .collect()
}

pub fn market_neutral_sharpe(
    asset: &[(i64, f64)],
    benchmark: &[(i64, f64)],
    periods_per_year: f64,
) -> f64 {
    sharpe_ratio(&market_neutral_returns(asset, benchmark), periods_per_year)
}

/// One-period parametric Value-at-Risk of a position worth `value`, for
/// normally distributed returns with mean `mu` and deviation `sigma`.
/// Positive numbers are losses.
pub fn parametric_var(value: f64, confidence: f64, mu: f64, sigma: f64) -> f64 {
    if !(confidence > 0.0 && confidence < 1.0) || !sigma.is_finite() || sigma < 0.0 {
        return f64::NAN;
    }
    let alpha = mu + sigma * inverse_normal_cdf(1.0 - confidence);
    -value * alpha
}

/// Parametric VaR using the sample mean and deviation of `returns`.
pub fn historical_parametric_var(value: f64, confidence: f64, returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return f64::NAN;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|ret| (ret - mean).powi(2)).sum::<f64>() / (n - 1.0);
    parametric_var(value, confidence, mean, var.sqrt())
}

/// Standard normal quantile (Acklam's rational approximation, |error| < 1.2e-9).
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
    ];
    const P_LOW: f64 = 0.024_25;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Drawdown from the running high-water mark of a cumulative series, and the
/// number of consecutive periods spent below it.
pub fn drawdowns(cumulative: &[f64]) -> Drawdowns {
    let mut series = Vec::with_capacity(cumulative.len());
    let mut durations = Vec::with_capacity(cumulative.len());
    let mut hwm = f64::NEG_INFINITY;
    let mut duration = 0u64;

    for value in cumulative {
        hwm = hwm.max(*value);
        let drawdown = hwm - value;
        duration = if drawdown == 0.0 { 0 } else { duration + 1 };
        series.push(drawdown);
        durations.push(duration);
    }

    let max_drawdown = series.iter().copied().fold(0.0, f64::max);
    let max_duration = durations.iter().copied().max().unwrap_or(0);

    Drawdowns {
        series,
        durations,
        max_drawdown,
        max_duration,
    }
}

/// Period returns and the compounded growth of one unit.
pub fn equity_curve(basis_values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let returns = pct_change(basis_values);
    let mut curve = Vec::with_capacity(returns.len());
    let mut growth = 1.0;
    for ret in &returns {
        growth *= 1.0 + ret;
        curve.push(growth);
    }
    (returns, curve)
}

pub fn summarize(basis_values: &[f64], periods_per_year: f64) -> PerformanceSummary {
    let (returns, curve) = equity_curve(basis_values);
    let total_return = curve.last().map(|value| value - 1.0).unwrap_or(0.0);
    let sharpe = if returns.len() > 1 {
        sharpe_ratio(&returns[1..], periods_per_year)
    } else {
        f64::NAN
    };
    let dd = drawdowns(&curve);

    PerformanceSummary {
        total_return,
        sharpe_ratio: sharpe,
        max_drawdown: dd.max_drawdown,
        drawdown_duration: dd.max_duration,
        periods: basis_values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        drawdowns, equity_curve, excess_return_sharpe, historical_parametric_var,
        inverse_normal_cdf, market_neutral_returns, market_neutral_sharpe, parametric_var,
        sharpe_ratio, summarize,
    };

    #[test]
    fn drawdown_tracks_high_water_mark() {
        let dd = drawdowns(&[1.0, 0.9, 0.85, 0.95, 1.1]);
        let expected = [0.0, 0.1, 0.15, 0.05, 0.0];
        for (got, want) in dd.series.iter().zip(expected) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert_eq!(dd.durations, vec![0, 1, 2, 3, 0]);
        assert!((dd.max_drawdown - 0.15).abs() < 1e-9);
        assert_eq!(dd.max_duration, 3);
    }

    #[test]
    fn sharpe_is_nan_without_dispersion() {
        assert!(sharpe_ratio(&[0.01, 0.01, 0.01], 252.0).is_nan());
        assert!(sharpe_ratio(&[0.01], 252.0).is_nan());
        assert!(sharpe_ratio(&[], 252.0).is_nan());
    }

    #[test]
    fn sharpe_uses_sample_deviation() {
        let returns: [f64; 3] = [0.01, -0.02, 0.03];
        let mean = 0.02 / 3.0;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = 252f64.sqrt() * mean / var.sqrt();
        assert!((sharpe_ratio(&returns, 252.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn equity_curve_compounds_returns() {
        let (returns, curve) = equity_curve(&[100.0, 110.0, 99.0]);
        assert_eq!(returns[0], 0.0);
        assert!((curve[1] - 1.1).abs() < 1e-12);
        assert!((curve[2] - 0.99).abs() < 1e-12);
    }

    #[test]
    fn summary_formats_report_rows() {
        let summary = summarize(&[100.0, 110.0, 99.0, 104.0], 252.0);
        assert_eq!(summary.periods, 4);
        assert!((summary.total_return - 0.04).abs() < 1e-12);
        assert!((summary.max_drawdown - 0.11).abs() < 1e-9);
        assert_eq!(summary.drawdown_duration, 2);

        let rows = summary.report_rows();
        assert_eq!(rows[0], ("Total Return".to_string(), "4.00%".to_string()));
        assert_eq!(rows[2], ("Max Drawdown".to_string(), "11.00%".to_string()));
        assert_eq!(rows[3], ("Drawdown Duration".to_string(), "2".to_string()));
    }

    #[test]
    fn flat_history_reports_nan_sharpe() {
        let summary = summarize(&[100.0, 100.0, 100.0], 252.0);
        assert_eq!(summary.total_return, 0.0);
        assert_eq!(summary.report_rows()[1].1, "NaN");
        assert_eq!(summary.drawdown_duration, 0);
    }

    #[test]
    fn excess_sharpe_subtracts_the_per_period_risk_free_rate() {
        let returns = [0.01, -0.02, 0.03, 0.005];
        let shifted: Vec<f64> = returns.iter().map(|r| r - 0.05 / 252.0).collect();
        let got = excess_return_sharpe(&returns, 0.05, 252.0);
        assert!((got - sharpe_ratio(&shifted, 252.0)).abs() < 1e-12);
        assert!(got < sharpe_ratio(&returns, 252.0));
        assert_eq!(excess_return_sharpe(&returns, 0.0, 252.0), sharpe_ratio(&returns, 252.0));
    }

    #[test]
    fn market_neutral_returns_use_shared_timestamps_only() {
        let asset = [(1, 10.0), (2, 11.0), (3, 12.1), (4, 13.0)];
        let benchmark = [(1, 100.0), (3, 110.0), (4, 110.0), (5, 120.0)];
        let net = market_neutral_returns(&asset, &benchmark);
        // joined rows: ts 1, 3, 4
        assert_eq!(net.len(), 2);
        assert!((net[0] - (0.21 - 0.1) / 2.0).abs() < 1e-12);
        assert!((net[1] - (13.0 / 12.1 - 1.0) / 2.0).abs() < 1e-12);

        let sharpe = market_neutral_sharpe(&asset, &benchmark, 252.0);
        assert!((sharpe - sharpe_ratio(&net, 252.0)).abs() < 1e-12);
        assert!(market_neutral_sharpe(&asset, &[(9, 1.0)], 252.0).is_nan());
    }

    #[test]
    fn inverse_normal_matches_known_quantiles() {
        assert!(inverse_normal_cdf(0.5).abs() < 1e-9);
        assert!((inverse_normal_cdf(0.05) + 1.644_853_626_951).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.01) + 2.326_347_874_041).abs() < 1e-8);
        assert!((inverse_normal_cdf(0.99) - 2.326_347_874_041).abs() < 1e-8);
    }

    #[test]
    fn parametric_var_is_a_positive_loss_at_high_confidence() {
        let var = parametric_var(1_000_000.0, 0.99, 0.0, 0.02);
        assert!((var - 1_000_000.0 * 0.02 * 2.326_347_874_041).abs() < 1e-2);
        assert!(parametric_var(100.0, 1.5, 0.0, 0.02).is_nan());
        assert!(parametric_var(100.0, 0.95, 0.0, -1.0).is_nan());

        let returns = [0.01, -0.01, 0.01, -0.01];
        let from_history = historical_parametric_var(100.0, 0.95, &returns);
        let sigma = (4.0 * 0.0001 / 3.0f64).sqrt();
        assert!((from_history - 100.0 * 1.644_853_626_951 * sigma).abs() < 1e-6);
        assert!(historical_parametric_var(100.0, 0.95, &[0.01]).is_nan());
    }
}
