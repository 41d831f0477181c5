use std::process::ExitCode;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod cli;
mod jq_exec;

const LOG_ENV: &str = "JSON_VET_LOG";
const DEFAULT_LOG_FILTER: &str = "json_vet=warn";

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("json_vet=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false).with_filter(filter))
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::CommandLineInterface::load();
    init_logging(cli.verbose);
    cli.run()
}
