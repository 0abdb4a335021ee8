//! Pre-built test fixtures for common pipeline scenarios.
//!
//! Provides factory functions to create state documents, requests, and a
//! seeded storage environment with sensible defaults.

use std::sync::Arc;

use serde_json::json;
use veil_core::config::PipelineConfig;
use veil_core::pipeline::Pipeline;
use veil_core::storage::StorageGateway;

use crate::storage::TracingMemoryGateway;

/// Default state document location used by [`TestEnvironment`].
pub const STATE_LOCATION: &str = "tf-state-gdpr-obfuscator";
/// Default state document key used by [`TestEnvironment`].
pub const STATE_KEY: &str = "tf-state";
/// Input location named in the default state document.
pub const INPUT_LOCATION: &str = "mock-input-bucket-name";
/// Processed location named in the default state document.
pub const PROCESSED_LOCATION: &str = "mock-processed-bucket-name";
/// Invocation location named in the default state document.
pub const INVOCATION_LOCATION: &str = "mock-invocation-bucket-name";

/// The two-row dataset used across pipeline scenarios.
pub const PEOPLE_CSV: &str = "name,email,age\nJohn,john@example.com,30\nJane,jane@example.com,25\n";

/// Builds a state document naming the three locations.
#[must_use]
pub fn state_document(input: &str, processed: &str, invocation: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "version": 4,
        "terraform_version": "1.6.6",
        "serial": 45,
        "lineage": "92ed6dfd-fecf-ec4d-15ab-f2f80bbe684f",
        "outputs": {
            "gdpr_input_bucket": { "value": input, "type": "string" },
            "gdpr_processed_bucket": { "value": processed, "type": "string" },
            "gdpr_invocation_bucket": { "value": invocation, "type": "string" },
        },
    }))
    .expect("state document serializes")
}

/// Builds an invocation request document.
#[must_use]
pub fn request_document(bucket_name: &str, s3_file_path: &str, pii_fields: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "bucket_name": bucket_name,
        "s3_file_path": s3_file_path,
        "pii_fields": pii_fields,
    }))
    .expect("request document serializes")
}

/// Test environment with a tracing gateway and a seeded state document.
pub struct TestEnvironment {
    /// Shared storage gateway.
    pub gateway: Arc<TracingMemoryGateway>,
    /// Pipeline configuration pointing at the seeded state document.
    pub config: PipelineConfig,
}

impl TestEnvironment {
    /// Creates an environment whose state document names the default locations.
    pub async fn new() -> Self {
        let env = Self::without_state();
        env.gateway
            .seed(
                STATE_LOCATION,
                STATE_KEY,
                state_document(INPUT_LOCATION, PROCESSED_LOCATION, INVOCATION_LOCATION),
            )
            .await;
        env
    }

    /// Creates an environment with no state document.
    #[must_use]
    pub fn without_state() -> Self {
        Self {
            gateway: Arc::new(TracingMemoryGateway::new()),
            config: PipelineConfig {
                state_location: STATE_LOCATION.to_string(),
                state_key: STATE_KEY.to_string(),
                ..PipelineConfig::default()
            },
        }
    }

    /// Stores a dataset in the input location.
    pub async fn seed_dataset(&self, key: &str, csv: &str) {
        self.gateway.seed(INPUT_LOCATION, key, csv.to_string()).await;
    }

    /// Stores an invocation request for `key` in the invocation location.
    pub async fn seed_request(&self, request_key: &str, dataset_key: &str, pii_fields: &[&str]) {
        self.gateway
            .seed(
                INVOCATION_LOCATION,
                request_key,
                request_document(INPUT_LOCATION, dataset_key, pii_fields),
            )
            .await;
    }

    /// Builds a pipeline over this environment's gateway.
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        let gateway: Arc<dyn StorageGateway> = self.gateway.clone();
        Pipeline::new(gateway, self.config.clone())
    }
}
