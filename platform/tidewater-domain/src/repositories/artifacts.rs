use crate::events::FillEvent;
use crate::services::audit::AuditEvent;
use crate::services::performance::PerformanceSummary;
use crate::value_objects::equity_point::EquityPoint;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String>;
    fn write_fills_csv(&self, path: &Path, fills: &[FillEvent]) -> Result<(), String>;
    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String>;
    fn write_summary_json(
        &self,
        path: &Path,
        summary: &PerformanceSummary,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String>;
    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String>;
    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String>;
}

pub trait ArtifactReader {
    fn read_fills_csv(&self, path: &Path) -> Result<Vec<FillEvent>, String>;
    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String>;
    fn read_config_snapshot_toml(&self, path: &Path) -> Result<Option<String>, String>;
    /// The `meta` object of an existing summary, if the file exists.
    fn read_summary_meta_json(&self, path: &Path) -> Result<Option<serde_json::Value>, String>;
    fn exists(&self, path: &Path) -> bool;
}
