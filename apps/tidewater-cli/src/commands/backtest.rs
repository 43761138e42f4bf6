use crate::infra::build_market_data_repo;
use std::path::{Path, PathBuf};
use tidewater_application::backtesting::run_backtest;
use tidewater_application::config::load_config_with_source;
use tidewater_infrastructure::artifacts::FilesystemArtifactWriter;

pub fn run(config_path: &Path, out: Option<PathBuf>) -> Result<(), String> {
    let (config, config_toml) = load_config_with_source(config_path)?;
    let market_data = build_market_data_repo(&config)?;
    let artifacts = FilesystemArtifactWriter::new();

    let report = run_backtest(&config, &config_toml, out, market_data.as_ref(), &artifacts)?;

    println!("Signals: {}", report.stats.signals);
    println!("Orders: {}", report.stats.orders);
    println!("Fills: {}", report.stats.fills);
    super::print_summary(&report.summary);
    println!("Artifacts: {}", report.run_dir.display());
    Ok(())
}
