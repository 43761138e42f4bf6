use crate::config::{parse_config, Config};
use crate::shared::{resolve_periods_per_year, sort_audit_events, summary_meta_json_from_equity};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tidewater_domain::events::FillEvent;
use tidewater_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use tidewater_domain::services::audit::AuditEvent;
use tidewater_domain::services::performance::{summarize, PerformanceSummary};
use tidewater_domain::value_objects::equity_point::EquityPoint;
use tidewater_domain::value_objects::timeframe::Timeframe;
use tracing::info_span;

pub struct GenerateReportResult {
    pub input_dir: PathBuf,
    pub run_id: String,
    pub summary: PerformanceSummary,
    pub fills: usize,
}

/// Recomputes the summary of a finished run from its exported artifacts.
pub fn generate_report(
    input_dir: &Path,
    reader: &dyn ArtifactReader,
    writer: &dyn ArtifactWriter,
) -> Result<GenerateReportResult, String> {
    let _span = info_span!("generate_report", input_dir = %input_dir.display()).entered();

    let stage_start = Instant::now();
    let fills_path = input_dir.join("fills.csv");
    let equity_path = input_dir.join("equity.csv");
    let config_path = input_dir.join("config_snapshot.toml");

    if !reader.exists(&fills_path) || !reader.exists(&equity_path) {
        return Err(format!(
            "missing fills.csv or equity.csv in {}",
            input_dir.display()
        ));
    }

    let fills = reader.read_fills_csv(&fills_path)?;
    let equity = reader.read_equity_csv(&equity_path)?;
    if equity.is_empty() {
        return Err(format!("equity.csv in {} has no rows", input_dir.display()));
    }

    let config: Option<Config> = reader
        .read_config_snapshot_toml(&config_path)?
        .as_deref()
        .and_then(|raw| parse_config(raw).ok());
    let periods_per_year = match config.as_ref() {
        Some(config) => resolve_periods_per_year(config)?,
        None => Timeframe::parse("1d")?.periods_per_year(),
    };

    let curve: Vec<f64> = equity.iter().map(|point| point.equity_curve).collect();
    let summary = summarize(&curve, periods_per_year);
    metrics::histogram!("tidewater.report.generate_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    metrics::gauge!("tidewater.report.fills").set(fills.len() as f64);
    metrics::gauge!("tidewater.report.periods").set(summary.periods as f64);

    let (run_id, fresh_meta) = match config.as_ref() {
        Some(config) => (
            config.run.run_id.clone(),
            summary_meta_json_from_equity(config, &equity),
        ),
        None => ("unknown".to_string(), None),
    };

    let summary_path = input_dir.join("summary.json");
    let existing_meta = reader.read_summary_meta_json(&summary_path)?;
    let meta = merge_meta(existing_meta, fresh_meta);
    writer.write_summary_json(summary_path.as_path(), &summary, meta.as_ref())?;

    let events = build_report_events(&run_id, &fills, &summary, &equity, input_dir);
    writer.write_audit_jsonl(input_dir.join("report.jsonl").as_path(), &events)?;

    Ok(GenerateReportResult {
        input_dir: input_dir.to_path_buf(),
        run_id,
        summary,
        fills: fills.len(),
    })
}

/// Keys recomputed from the artifacts replace the stored ones; everything
/// else the run recorded (stats, final positions, risk) is kept.
fn merge_meta(
    existing: Option<serde_json::Value>,
    fresh: Option<serde_json::Value>,
) -> Option<serde_json::Value> {
    match (existing, fresh) {
        (Some(serde_json::Value::Object(mut stored)), Some(serde_json::Value::Object(fresh))) => {
            stored.extend(fresh);
            Some(serde_json::Value::Object(stored))
        }
        (existing, None) => existing,
        (_, fresh) => fresh,
    }
}

fn build_report_events(
    run_id: &str,
    fills: &[FillEvent],
    summary: &PerformanceSummary,
    equity: &[EquityPoint],
    input_dir: &Path,
) -> Vec<AuditEvent> {
    let end_ts = equity.last().map(|p| p.timestamp).unwrap_or(0);
    let mut events = Vec::with_capacity(fills.len() + 1);

    for fill in fills {
        events.push(AuditEvent {
            run_id: run_id.to_string(),
            timestamp: fill.timestamp,
            stage: "fill".to_string(),
            symbol: Some(fill.symbol.clone()),
            action: fill.side.as_str().to_string(),
            error: None,
            details: serde_json::json!({
                "fill_id": fill.id,
                "order_id": fill.order_id,
                "quantity": fill.quantity,
                "price": fill.fill_cost,
                "commission": fill.commission,
            }),
        });
    }

    let rows: serde_json::Map<String, serde_json::Value> = summary
        .report_rows()
        .into_iter()
        .map(|(label, value)| (label, serde_json::Value::String(value)))
        .collect();
    events.push(AuditEvent {
        run_id: run_id.to_string(),
        timestamp: end_ts,
        stage: "report".to_string(),
        symbol: None,
        action: "recompute".to_string(),
        error: None,
        details: serde_json::json!({
            "input_dir": input_dir.display().to_string(),
            "fills": fills.len(),
            "periods": summary.periods,
            "rows": rows,
        }),
    });

    sort_audit_events(&mut events);
    events
}
