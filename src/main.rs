use std::{env, path::PathBuf, process::ExitCode};

use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use student_registry::{config::Config, registry::Registry};

fn init_logger(level: LevelFilter) {
    let log_config = simplelog::Config::default();
    // only fails when a logger is already installed
    if let Err(err) = TermLogger::init(level, log_config, TerminalMode::Stderr, ColorChoice::Auto) {
        eprintln!("failed to initialise logging: {}", err);
    }
}

/// usage: student-registry [INPUT] [OUTPUT]
///
/// Loads INPUT (or the configured registry file), prints the load report as
/// JSON and, when OUTPUT is given, writes the registry back out to it.
fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    init_logger(config.log_level);

    let mut args = env::args_os().skip(1);
    let input = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.registry_file.clone());
    let output = args.next().map(PathBuf::from);

    let mut registry = Registry::new();
    let report = match registry.load(&input) {
        Ok(report) => report,
        Err(err) => {
            error!("failed to load {}: {}", input.display(), err);
            return ExitCode::FAILURE;
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(err) => error!("failed to render load report: {}", err),
    }

    if let Some(output) = output {
        if let Err(err) = registry.save(&output) {
            error!("failed to write {}: {}", output.display(), err);
            return ExitCode::FAILURE;
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        info!("{} records were skipped", report.skipped.len());
        ExitCode::from(2)
    }
}
