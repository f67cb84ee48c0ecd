//! Command-line entry point.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-controllers generate [-c controllers.json] [-o routes.json] [-f json|yaml] [--openapi openapi.json]
//! openapi-from-controllers output [-c controllers.json]
//! ```
//!
//! Pass `-v` to any subcommand for debug logging.

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_controllers::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("openapi-from-controllers starting...");
    cli::run(args)
}
