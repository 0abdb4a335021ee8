//! Request command - write an invocation request for a dataset.
//!
//! This is the upstream producer side of the pipeline: it names a dataset in
//! the input location and the columns to mask, and drops the request document
//! into the invocation location for the next `veil run`.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use veil_core::request::request_key_for;
use veil_core::{InvocationRequest, PipelineConfig, StorageGateway, resolve_locations};

/// Arguments for the request command.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Dataset key in the input location. Defaults to the first listed object.
    #[arg(long)]
    pub key: Option<String>,

    /// Column to mask. Repeat for several columns.
    #[arg(long = "field", short = 'f')]
    pub fields: Vec<String>,
}

/// Execute the request command.
///
/// Returns the key the request was written under.
///
/// # Errors
///
/// Returns an error if the locations cannot be resolved, the input location
/// is empty, or the request cannot be written.
pub async fn execute(
    args: RequestArgs,
    gateway: Arc<dyn StorageGateway>,
    config: &PipelineConfig,
) -> Result<String> {
    let state_location = config.validate()?;
    let locations = resolve_locations(gateway.as_ref(), &state_location, &config.state_key)
        .await
        .context("Failed to retrieve bucket names. Make sure the buckets have been created")?;

    let dataset_key = match args.key {
        Some(key) => key,
        None => gateway
            .list(&locations.input)
            .await?
            .into_iter()
            .next()
            .map(|meta| meta.key)
            .context("No files found in the input location. Upload a dataset first")?,
    };

    let request = InvocationRequest::new(locations.input.clone(), dataset_key, args.fields)?;
    let request_key = request_key_for(&request.source_key, &config.request_suffix)?;
    gateway
        .put(&locations.invocation, &request_key, request.to_json()?)
        .await
        .with_context(|| format!("failed to write request to {}", locations.invocation))?;

    tracing::info!(
        location = %locations.invocation,
        key = %request_key,
        "uploaded invocation request"
    );
    println!("{}/{}", locations.invocation, request_key);
    Ok(request_key)
}
