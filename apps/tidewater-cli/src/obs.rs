use clap::ValueEnum;
use std::net::SocketAddr;

pub const LOG_ENV: &str = "TIDEWATER_LOG";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

fn resolve_filter(log_level: &str) -> String {
    match std::env::var(LOG_ENV) {
        Ok(raw) if !raw.trim().is_empty() => raw,
        _ => log_level.to_string(),
    }
}

/// Logs go to stderr so command output on stdout stays machine readable.
pub fn init_tracing(log_level: &str, format: LogFormat) -> Result<(), String> {
    let filter = resolve_filter(log_level);
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .map_err(|err| format!("invalid log filter '{filter}': {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| format!("failed to install tracing subscriber: {err}"))
}

#[cfg(feature = "prometheus")]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let Some(addr) = addr else {
        return Ok(None);
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|err| format!("failed to install prometheus exporter: {err}"))?;

    tracing::info!(metrics_addr = %addr, "prometheus metrics exporter enabled");
    Ok(Some(addr))
}

#[cfg(not(feature = "prometheus"))]
pub fn init_metrics(addr: Option<SocketAddr>) -> Result<Option<SocketAddr>, String> {
    if addr.is_some() {
        return Err("metrics exporter requires tidewater-cli feature `prometheus`".to_string());
    }
    Ok(None)
}
