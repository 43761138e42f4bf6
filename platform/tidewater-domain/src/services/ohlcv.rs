use crate::value_objects::bar::Bar;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DataQualityReport {
    pub bars: usize,
    pub duplicates: usize,
    pub gaps: usize,
    pub out_of_order: usize,
    pub invalid_close: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
    pub first_gap: Option<i64>,
    pub first_duplicate: Option<i64>,
    pub first_out_of_order: Option<i64>,
    pub first_invalid_close: Option<i64>,
    pub max_gap_seconds: Option<i64>,
}

impl DataQualityReport {
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0 && self.out_of_order == 0 && self.invalid_close == 0
    }
}

/// Scans bars that are already in the order they will be replayed.
pub fn data_quality_from_bars(
    bars: &[Bar],
    expected_step_seconds: Option<i64>,
) -> DataQualityReport {
    let mut report = DataQualityReport::default();
    if bars.is_empty() {
        return report;
    }

    let step = expected_step_seconds.unwrap_or(1).max(1);
    report.bars = bars.len();
    report.first_timestamp = Some(bars[0].timestamp);
    report.last_timestamp = Some(bars[bars.len() - 1].timestamp);

    let mut last_ts: Option<i64> = None;
    let mut max_gap: Option<i64> = None;

    for bar in bars {
        let ts = bar.timestamp;

        if !bar.close.is_finite() || bar.close <= 0.0 {
            report.invalid_close += 1;
            if report.first_invalid_close.is_none() {
                report.first_invalid_close = Some(ts);
            }
        }

        if let Some(prev) = last_ts {
            if ts == prev {
                report.duplicates += 1;
                if report.first_duplicate.is_none() {
                    report.first_duplicate = Some(ts);
                }
            } else if ts < prev {
                report.out_of_order += 1;
                if report.first_out_of_order.is_none() {
                    report.first_out_of_order = Some(ts);
                }
            } else {
                let diff = ts - prev;
                if diff > step {
                    report.gaps += 1;
                    if report.first_gap.is_none() {
                        report.first_gap = Some(ts);
                    }
                    max_gap = Some(max_gap.map_or(diff, |current| current.max(diff)));
                }
            }
        }

        last_ts = Some(ts);
    }

    report.max_gap_seconds = max_gap;
    report
}
