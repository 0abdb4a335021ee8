//! Invocation requests: discovery, decoding, and production.
//!
//! An invocation request is a small JSON document dropped into the invocation
//! location by an upstream producer:
//!
//! ```json
//! { "bucket_name": "input-bucket", "s3_file_path": "people.csv", "pii_fields": ["name"] }
//! ```

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::config::SelectionPolicy;
use crate::error::{Error, Result};
use crate::location::{BucketName, basename, validate_key};
use crate::storage::StorageGateway;

/// A decoded, validated invocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRequest {
    /// Location holding the dataset to redact.
    #[serde(rename = "bucket_name")]
    pub source_location: BucketName,
    /// Key of the dataset within `source_location`.
    #[serde(rename = "s3_file_path")]
    pub source_key: String,
    /// Column names to mask, in request order, without duplicates.
    #[serde(rename = "pii_fields")]
    pub columns_to_redact: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequest {
    bucket_name: Option<String>,
    s3_file_path: Option<String>,
    #[serde(default)]
    pii_fields: Option<Vec<String>>,
}

impl InvocationRequest {
    /// Builds a request, validating the source and collapsing duplicate columns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the source key is not a valid
    /// object key or names a prefix.
    pub fn new<I, S>(
        source_location: BucketName,
        source_key: impl Into<String>,
        columns: I,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source_key = source_key.into();
        validate_key(&source_key)
            .map_err(|e| Error::invalid_request(format!("s3_file_path: {e}")))?;
        if basename(&source_key).is_none() {
            return Err(Error::invalid_request(format!(
                "s3_file_path names a prefix, not an object: {source_key}"
            )));
        }

        let mut columns_to_redact: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if !columns_to_redact.contains(&column) {
                columns_to_redact.push(column);
            }
        }

        Ok(Self {
            source_location,
            source_key,
            columns_to_redact,
        })
    }

    /// Decodes and validates a request document.
    ///
    /// A missing or `null` `pii_fields` is an empty column list, which is a
    /// valid no-op redaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the payload is not a JSON object of
    /// the expected shape, or `bucket_name`/`s3_file_path` is missing or empty.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let raw: RawRequest = serde_json::from_slice(raw)
            .map_err(|e| Error::invalid_request(format!("malformed request document: {e}")))?;

        let bucket_name = raw
            .bucket_name
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::invalid_request("bucket_name not found in request"))?;
        let source_key = raw
            .s3_file_path
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::invalid_request("s3_file_path not found in request"))?;
        let source_location = BucketName::new(bucket_name)
            .map_err(|e| Error::invalid_request(format!("bucket_name: {e}")))?;

        Self::new(source_location, source_key, raw.pii_fields.unwrap_or_default())
    }

    /// Encodes the request in its wire format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if serialization fails.
    pub fn to_json(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(|e| Error::Internal {
                message: format!("failed to encode request: {e}"),
            })
    }
}

/// Derives the key a producer writes a request under: the dataset's file
/// stem plus `suffix` (`2024/people.csv` -> `people.json`).
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `source_key` has no file name.
pub fn request_key_for(source_key: &str, suffix: &str) -> Result<String> {
    let name = basename(source_key).ok_or_else(|| {
        Error::invalid_request(format!("source key has no file name: {source_key}"))
    })?;
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    };
    Ok(format!("{stem}{suffix}"))
}

/// Picks the request key from a listing.
///
/// With [`SelectionPolicy::FirstListed`] the first key ending in `suffix`
/// wins, so the result depends on the gateway's listing order whenever more
/// than one request is pending.
#[must_use]
pub fn select_request<'a, I>(keys: I, suffix: &str, policy: SelectionPolicy) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matches = keys.into_iter().filter(|key| key.ends_with(suffix));
    match policy {
        SelectionPolicy::FirstListed => matches.next(),
        SelectionPolicy::Lexical => matches.min(),
    }
}

/// Finds the pending invocation request in a location.
pub struct RequestLocator {
    gateway: Arc<dyn StorageGateway>,
    suffix: String,
    policy: SelectionPolicy,
}

impl RequestLocator {
    /// Creates a locator matching keys that end in `suffix`.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        suffix: impl Into<String>,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            gateway,
            suffix: suffix.into(),
            policy,
        }
    }

    /// Returns the key of the pending request, or `None` if the location holds
    /// no matching object.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the location cannot be listed.
    pub async fn find_request(&self, location: &BucketName) -> Result<Option<String>> {
        let objects = self.gateway.list(location).await?;
        for object in &objects {
            tracing::info!(key = %object.key, "found key");
        }

        let keys = objects.iter().map(|o| o.key.as_str());
        let selected = select_request(keys, &self.suffix, self.policy).map(str::to_string);
        tracing::info!(key = ?selected, %location, "request key lookup finished");
        Ok(selected)
    }

    /// Fetches and decodes the request stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns the gateway error if the fetch fails, or
    /// [`Error::InvalidRequest`] if the document does not decode.
    pub async fn load(&self, location: &BucketName, key: &str) -> Result<InvocationRequest> {
        let raw = self.gateway.get(location, key).await?;
        InvocationRequest::parse(&raw)
    }
}
