mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tidewater")]
#[command(
    about = "Event-driven backtester over historical bars.",
    version,
    arg_required_else_help = true
)]
#[command(
    after_help = "Examples:\n  tidewater backtest --config configs/sample.toml --out runs/\n  tidewater validate --config configs/sample.toml --strict\n  tidewater report --input runs/sample_ma_cross/\n"
)]
struct Cli {
    /// Log level or filter directive; env TIDEWATER_LOG takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = obs::LogFormat::Text)]
    log_format: obs::LogFormat,

    /// Serve Prometheus metrics on host:port.
    #[arg(long, global = true, env = "TIDEWATER_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay the configured symbols through the strategy and write run artifacts.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        /// Base directory for the run; defaults to paths.out_dir.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check config and data without running the engine.
    Validate {
        #[arg(long)]
        config: PathBuf,
        /// Fail on duplicates, out-of-order rows or invalid closes.
        #[arg(long)]
        strict: bool,
    },
    /// Recompute the summary of a finished run from its artifacts.
    Report {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.log_level, cli.log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Backtest { config, out } => commands::backtest::run(&config, out),
        Command::Validate { config, strict } => commands::validate::run(&config, strict),
        Command::Report { input } => commands::report::run(&input),
    };

    if let Err(err) = result {
        let code = if err.contains("strict validation failed") {
            2
        } else {
            1
        };
        eprintln!("error: {err}");
        std::process::exit(code);
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::obs::LogFormat;
    use clap::Parser;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tidewater",
            "backtest",
            "--config",
            "configs/sample.toml",
            "--log-format",
            "json",
            "--metrics-addr",
            "127.0.0.1:9000",
        ])
        .expect("parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.log_level, "info");
        assert_eq!(cli.metrics_addr.map(|addr| addr.port()), Some(9000));
        match cli.command {
            Command::Backtest { config, out } => {
                assert!(config.ends_with("sample.toml"));
                assert!(out.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_strict_and_report_requires_input() {
        let cli = Cli::try_parse_from(["tidewater", "validate", "--config", "c.toml", "--strict"])
            .expect("parse");
        assert!(matches!(cli.command, Command::Validate { strict: true, .. }));
        assert!(Cli::try_parse_from(["tidewater", "report"]).is_err());
    }
}
