//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::location::{BucketName, validate_key};

/// Default location of the state document.
pub const DEFAULT_STATE_LOCATION: &str = "tf-state-gdpr-obfuscator-test";
/// Default key of the state document.
pub const DEFAULT_STATE_KEY: &str = "tf-state";
/// Default prefix for redacted outputs in the processed location.
pub const DEFAULT_PROCESSED_PREFIX: &str = "processed";
/// Default suffix identifying invocation request documents.
pub const DEFAULT_REQUEST_SUFFIX: &str = ".json";

/// How the request locator chooses among several matching documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
    /// The first match in the gateway's listing order.
    #[default]
    FirstListed,
    /// The lexically smallest matching key.
    Lexical,
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bucket holding the state document.
    pub state_location: String,
    /// Key of the state document.
    pub state_key: String,
    /// Key prefix for redacted outputs.
    pub processed_prefix: String,
    /// Suffix identifying invocation request documents.
    pub request_suffix: String,
    /// Tie-break among several request documents.
    pub selection: SelectionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            state_location: DEFAULT_STATE_LOCATION.to_string(),
            state_key: DEFAULT_STATE_KEY.to_string(),
            processed_prefix: DEFAULT_PROCESSED_PREFIX.to_string(),
            request_suffix: DEFAULT_REQUEST_SUFFIX.to_string(),
            selection: SelectionPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks that every setting is usable and returns the state location.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for an invalid state location or key,
    /// or an empty request suffix.
    pub fn validate(&self) -> Result<BucketName> {
        let state_location = BucketName::new(self.state_location.clone())
            .map_err(|e| Error::configuration(format!("state location: {e}")))?;
        validate_key(&self.state_key)
            .map_err(|e| Error::configuration(format!("state key: {e}")))?;
        if self.request_suffix.is_empty() {
            return Err(Error::configuration("request suffix cannot be empty"));
        }
        if self.processed_prefix.starts_with('/') {
            return Err(Error::configuration(format!(
                "processed prefix must be relative: {}",
                self.processed_prefix
            )));
        }
        Ok(state_location)
    }
}
