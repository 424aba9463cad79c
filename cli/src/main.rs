use clap::Parser;
use registry::ThemeManager;
use std::process::ExitCode;
use themectl::commands::{Cli, execute};
use themectl::config::load_config;
use themectl::error::AppError;
use themectl::logger::setup_logger;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()).into_result() {
        Ok(config) => config,
        Err(msg) => {
            eprintln!("{}", AppError::Config(msg));
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = setup_logger(config.logging()) {
        eprintln!("Failed to initialize logger: {e}");
    }

    let manager = ThemeManager::with_defaults(config.registry().clone());
    match execute(cli.command, &manager) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::debug!("Command failed ({})", e.kind());
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
