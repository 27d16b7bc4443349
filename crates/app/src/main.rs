//! Triangle renderer entry point.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use triangle_app::{Cli, report, run_headless, windowed};

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    info!("Starting Triangle Renderer");

    if cli.headless {
        run_headless(&config)
    } else {
        windowed::run(config)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging starts before the configuration is validated
    let log_config = cli.log_config();
    if let Err(e) = triangle_core::init_logging(&log_config).context("Can not initialize logging") {
        report::report_fatal(&e, &log_config.file, false, !cli.headless);
        return ExitCode::from(1);
    }

    match run(&cli) {
        Ok(()) => {
            info!("Clean shutdown");
            ExitCode::SUCCESS
        }
        Err(e) => {
            report::report_fatal(&e, &log_config.file, true, !cli.headless);
            ExitCode::from(1)
        }
    }
}
