// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! llamacpp-observer entry point.
//!
//! Loads configuration, installs logging and runs either the full agent
//! (`serve`) or the metrics exporter alone (`exporter`) until SIGINT or
//! SIGTERM.

mod cli_parser;
mod runtime_init;

use std::process::ExitCode;

use cli_parser::Command;
use llamacpp_observer::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let cli = match cli_parser::parse(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}", e);
            cli_parser::print_usage();
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Help(Some(sub)) => {
            cli_parser::print_command_help(&sub);
            return ExitCode::SUCCESS;
        }
        Command::Help(None) => {
            cli_parser::print_usage();
            return ExitCode::SUCCESS;
        }
        Command::Version => {
            println!("llamacpp-observer {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Command::Serve | Command::Exporter => {}
    }

    let config = match runtime_init::load_config(&cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    telemetry::init_logging(config.log_format);

    let result = match cli.command {
        Command::Exporter => runtime_init::run_exporter(config).await,
        _ => runtime_init::run_serve(config).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}
