//! Resolution of storage locations from a persisted state document.
//!
//! The state document is the JSON state written by the infrastructure tool
//! that provisioned the buckets. Only its `outputs` section is read:
//!
//! ```json
//! {
//!   "outputs": {
//!     "gdpr_input_bucket":      { "value": "...", "type": "string" },
//!     "gdpr_processed_bucket":  { "value": "...", "type": "string" },
//!     "gdpr_invocation_bucket": { "value": "...", "type": "string" }
//!   }
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::location::{BucketName, Locations};
use crate::storage::StorageGateway;

/// Output name of the input location.
pub const INPUT_OUTPUT: &str = "gdpr_input_bucket";
/// Output name of the processed location.
pub const PROCESSED_OUTPUT: &str = "gdpr_processed_bucket";
/// Output name of the invocation location.
pub const INVOCATION_OUTPUT: &str = "gdpr_invocation_bucket";

#[derive(Debug, Deserialize)]
struct StateDocument {
    outputs: HashMap<String, OutputValue>,
}

#[derive(Debug, Deserialize)]
struct OutputValue {
    value: serde_json::Value,
}

impl StateDocument {
    fn bucket(&self, name: &str) -> Result<BucketName> {
        let output = self
            .outputs
            .get(name)
            .ok_or_else(|| Error::configuration(format!("state output {name} is missing")))?;
        let value = output
            .value
            .as_str()
            .ok_or_else(|| Error::configuration(format!("state output {name} is not a string")))?;
        BucketName::new(value)
            .map_err(|e| Error::configuration(format!("state output {name}: {e}")))
    }
}

/// Decodes a state document into the three pipeline locations.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the payload is not JSON, has no
/// `outputs` section, or any of the three outputs is missing, not a string,
/// or not a valid bucket name.
pub fn parse_locations(raw: &[u8]) -> Result<Locations> {
    let document: StateDocument = serde_json::from_slice(raw)
        .map_err(|e| Error::configuration(format!("malformed state document: {e}")))?;

    Locations::new(
        document.bucket(INPUT_OUTPUT)?,
        document.bucket(PROCESSED_OUTPUT)?,
        document.bucket(INVOCATION_OUTPUT)?,
    )
}

/// Fetches the state document and resolves the input, processed, and
/// invocation locations.
///
/// Either all three locations resolve or the run gets a configuration error;
/// the failure is logged here so callers only decide whether to abort.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for any fetch or decode failure.
pub async fn resolve_locations(
    gateway: &dyn StorageGateway,
    config_location: &BucketName,
    config_key: &str,
) -> Result<Locations> {
    let resolved = match gateway.get(config_location, config_key).await {
        Ok(raw) => parse_locations(&raw),
        Err(e) => Err(Error::configuration(format!(
            "failed to read state document {config_location}/{config_key}: {e}"
        ))),
    };

    match &resolved {
        Ok(locations) => tracing::info!(
            input = %locations.input,
            processed = %locations.processed,
            invocation = %locations.invocation,
            "resolved storage locations"
        ),
        Err(e) => tracing::error!(error = %e, "failed to retrieve bucket names"),
    }
    resolved
}
