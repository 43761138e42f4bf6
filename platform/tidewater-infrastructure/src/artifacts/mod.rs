use crate::reporting;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tidewater_domain::events::FillEvent;
use tidewater_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use tidewater_domain::services::audit::AuditEvent;
use tidewater_domain::services::performance::PerformanceSummary;
use tidewater_domain::value_objects::equity_point::EquityPoint;

fn timed<T>(artifact: &'static str, f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    let start = Instant::now();
    let result = f();
    let outcome = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "tidewater.infra.artifacts.calls_total",
        "artifact" => artifact,
        "result" => outcome
    )
    .increment(1);
    metrics::histogram!("tidewater.infra.artifacts.io_ms", "artifact" => artifact)
        .record(start.elapsed().as_secs_f64() * 1000.0);
    if let Err(err) = &result {
        tracing::error!(artifact, error = %err, "artifact io failed");
    }
    result
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), String> {
        fs::create_dir_all(path)
            .map_err(|err| format!("failed to create dir {}: {}", path.display(), err))
    }

    fn write_fills_csv(&self, path: &Path, fills: &[FillEvent]) -> Result<(), String> {
        timed("fills_csv", || reporting::write_fills_csv(path, fills))
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), String> {
        timed("equity_csv", || reporting::write_equity_csv(path, points))
    }

    fn write_summary_json(
        &self,
        path: &Path,
        summary: &PerformanceSummary,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), String> {
        timed("summary_json", || {
            reporting::write_summary_json(path, summary, meta)
        })
    }

    fn write_audit_jsonl(&self, path: &Path, events: &[AuditEvent]) -> Result<(), String> {
        timed("audit_jsonl", || reporting::write_audit_jsonl(path, events))
    }

    fn write_config_snapshot_toml(&self, path: &Path, contents: &str) -> Result<(), String> {
        timed("config_snapshot", || {
            fs::write(path, contents).map_err(|err| {
                format!(
                    "failed to write config snapshot {}: {}",
                    path.display(),
                    err
                )
            })
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactReader;

impl FilesystemArtifactReader {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactReader for FilesystemArtifactReader {
    fn read_fills_csv(&self, path: &Path) -> Result<Vec<FillEvent>, String> {
        timed("fills_csv", || reporting::read_fills_csv(path))
    }

    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, String> {
        timed("equity_csv", || reporting::read_equity_csv(path))
    }

    fn read_config_snapshot_toml(&self, path: &Path) -> Result<Option<String>, String> {
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(path)
            .map(Some)
            .map_err(|err| format!("failed to read config snapshot {}: {}", path.display(), err))
    }

    fn read_summary_meta_json(&self, path: &Path) -> Result<Option<serde_json::Value>, String> {
        timed("summary_json", || reporting::read_summary_meta_json(path))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
