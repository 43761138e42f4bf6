use crate::infra::build_market_data_repo;
use std::path::Path;
use tidewater_application::config::load_config;
use tidewater_application::validation::validate;

pub fn run(config_path: &Path, strict: bool) -> Result<(), String> {
    let config = load_config(config_path)?;
    let market_data = build_market_data_repo(&config)?;
    let report = validate(&config, strict, market_data.as_ref())?;

    let rendered = serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "mode": "validate",
        "report": report,
    }))
    .map_err(|err| format!("failed to render validation report: {err}"))?;
    println!("{rendered}");
    Ok(())
}
