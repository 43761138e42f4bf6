use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tidewater_domain::events::FillEvent;
use tidewater_domain::services::audit::AuditEvent;
use tidewater_domain::services::performance::PerformanceSummary;
use tidewater_domain::value_objects::equity_point::EquityPoint;
use tidewater_domain::value_objects::side::Side;

pub fn write_audit_jsonl(path: &Path, events: &[AuditEvent]) -> Result<(), String> {
    let mut file = fs::File::create(path)
        .map_err(|err| format!("failed to create audit log {}: {}", path.display(), err))?;
    for event in events {
        let line = serde_json::to_string(event)
            .map_err(|err| format!("failed to serialize audit event: {}", err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to write audit event: {}", err))?;
    }
    Ok(())
}

pub fn write_fills_csv(path: &Path, fills: &[FillEvent]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create fills csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "fill_id",
        "order_id",
        "timestamp_utc",
        "symbol",
        "exchange",
        "side",
        "quantity",
        "fill_cost",
        "commission",
    ])
    .map_err(|err| format!("failed to write fills csv header: {}", err))?;

    for fill in fills {
        wtr.write_record([
            fill.id.to_string(),
            fill.order_id.to_string(),
            fill.timestamp.to_string(),
            fill.symbol.clone(),
            fill.exchange.clone(),
            fill.side.as_str().to_string(),
            fill.quantity.to_string(),
            fill.fill_cost.to_string(),
            fill.commission.to_string(),
        ])
        .map_err(|err| format!("failed to write fills row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush fills csv: {}", err))
}

pub fn write_equity_csv(path: &Path, points: &[EquityPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|err| format!("failed to create equity csv {}: {}", path.display(), err))?;
    wtr.write_record([
        "timestamp_utc",
        "cash",
        "commission",
        "total",
        "returns",
        "equity_curve",
        "drawdown",
    ])
    .map_err(|err| format!("failed to write equity csv header: {}", err))?;

    for point in points {
        wtr.write_record([
            point.timestamp.to_string(),
            point.cash.to_string(),
            point.commission.to_string(),
            point.total.to_string(),
            point.returns.to_string(),
            point.equity_curve.to_string(),
            point.drawdown.to_string(),
        ])
        .map_err(|err| format!("failed to write equity row: {}", err))?;
    }

    wtr.flush()
        .map_err(|err| format!("failed to flush equity csv: {}", err))
}

/// Writes the headline statistics, their display rows and any run metadata.
/// A NaN Sharpe ratio is stored as `null`.
pub fn write_summary_json(
    path: &Path,
    summary: &PerformanceSummary,
    meta: Option<&serde_json::Value>,
) -> Result<(), String> {
    let rows: serde_json::Map<String, serde_json::Value> = summary
        .report_rows()
        .into_iter()
        .map(|(label, value)| (label, serde_json::Value::String(value)))
        .collect();
    let json = serde_json::json!({
        "meta": meta,
        "total_return": summary.total_return,
        "sharpe_ratio": summary.sharpe_ratio,
        "max_drawdown": summary.max_drawdown,
        "drawdown_duration": summary.drawdown_duration,
        "periods": summary.periods,
        "report": rows,
    });
    let json = serde_json::to_string_pretty(&json)
        .map_err(|err| format!("failed to serialize summary: {}", err))?;
    fs::write(path, json)
        .map_err(|err| format!("failed to write summary {}: {}", path.display(), err))
}

/// Reads back the `meta` object written by [`write_summary_json`]; `None` when
/// the file is absent or carries no meta.
pub fn read_summary_meta_json(path: &Path) -> Result<Option<serde_json::Value>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("failed to read summary {}: {}", path.display(), err))?;
    let mut json: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| format!("invalid summary json {}: {}", path.display(), err))?;
    Ok(match json.get_mut("meta").map(serde_json::Value::take) {
        Some(serde_json::Value::Null) | None => None,
        Some(meta) => Some(meta),
    })
}

#[derive(Debug, Clone, Deserialize)]
struct FillRecord {
    fill_id: u64,
    order_id: u64,
    timestamp_utc: i64,
    symbol: String,
    exchange: String,
    side: String,
    quantity: u64,
    fill_cost: f64,
    commission: f64,
}

pub fn read_fills_csv(path: &Path) -> Result<Vec<FillEvent>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open fills csv {}: {}", path.display(), err))?;
    let mut fills = Vec::new();
    for result in rdr.deserialize::<FillRecord>() {
        let record = result.map_err(|err| format!("failed to parse fill record: {}", err))?;
        fills.push(FillEvent {
            id: record.fill_id,
            order_id: record.order_id,
            timestamp: record.timestamp_utc,
            symbol: record.symbol,
            exchange: record.exchange,
            quantity: record.quantity,
            side: Side::parse(&record.side)?,
            fill_cost: record.fill_cost,
            commission: record.commission,
        });
    }
    Ok(fills)
}

#[derive(Debug, Clone, Deserialize)]
struct EquityRecord {
    timestamp_utc: i64,
    cash: f64,
    commission: f64,
    total: f64,
    returns: f64,
    equity_curve: f64,
    drawdown: f64,
}

pub fn read_equity_csv(path: &Path) -> Result<Vec<EquityPoint>, String> {
    let mut rdr = csv::Reader::from_path(path)
        .map_err(|err| format!("failed to open equity csv {}: {}", path.display(), err))?;
    let mut points = Vec::new();
    for result in rdr.deserialize::<EquityRecord>() {
        let record = result.map_err(|err| format!("failed to parse equity record: {}", err))?;
        points.push(EquityPoint {
            timestamp: record.timestamp_utc,
            cash: record.cash,
            commission: record.commission,
            total: record.total,
            returns: record.returns,
            equity_curve: record.equity_curve,
            drawdown: record.drawdown,
        });
    }
    Ok(points)
}
