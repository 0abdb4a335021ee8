//! Run command - process the pending invocation request once.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use veil_core::{Pipeline, PipelineConfig, RunResult, StorageGateway};

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Print the result as a single JSON line instead of pretty JSON.
    #[arg(long)]
    pub compact: bool,
}

/// Execute the run command.
///
/// The pipeline always produces a result; it is printed as JSON and returned
/// so the caller can pick an exit status.
///
/// # Errors
///
/// Returns an error only if the result cannot be encoded.
pub async fn execute(
    args: &RunArgs,
    gateway: Arc<dyn StorageGateway>,
    config: PipelineConfig,
) -> Result<RunResult> {
    let result = Pipeline::new(gateway, config).run().await;

    let encoded = if args.compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{encoded}");

    Ok(result)
}
