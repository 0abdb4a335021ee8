//! veil CLI - command-line interface for the redaction pipeline.
//!
//! The main entry point for the `veil` binary.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use veil_cli::{Cli, Commands};

fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();
    veil_core::init_logging(cli.log_format.into());

    let config = cli.pipeline_config();
    let gateway = cli.gateway()?;

    // Storage calls run one after another; a single-threaded runtime is enough.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let code = match cli.command {
            Commands::Run(args) => {
                let result = veil_cli::commands::run::execute(&args, gateway, config).await?;
                if result.is_success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::FAILURE
                }
            }
            Commands::Request(args) => {
                veil_cli::commands::request::execute(args, gateway, &config).await?;
                ExitCode::SUCCESS
            }
        };
        Ok::<_, anyhow::Error>(code)
    })
}
