pub mod backtest;
pub mod report;
pub mod validate;

use tidewater_domain::services::performance::PerformanceSummary;

pub(crate) fn print_summary(summary: &PerformanceSummary) {
    let rows = summary.report_rows();
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    for (label, value) in rows {
        println!("{label:<width$}  {value}");
    }
}
