//! The redaction pipeline orchestrator.
//!
//! One [`Pipeline::run`] processes exactly one invocation request:
//!
//! ```text
//! Start -> LocationsResolved -> RequestFound -> RequestParsed
//!       -> Redacted -> Uploaded -> Cleaned -> Done
//! ```
//!
//! Any stage before `Cleaned` can fail into `Error`, which ends the run with a
//! 400 or 500 [`RunResult`]. Nothing is written before `Uploaded`, and the
//! input and invocation locations are only cleared after the upload lands.
//! Cleanup problems are logged and reported but never fail the run.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::Instrument;
use ulid::Ulid;

use crate::config::PipelineConfig;
use crate::error::Error;
use crate::location::{BucketName, Locations, processed_key};
use crate::observability::pipeline_span;
use crate::redact::{RedactedObject, Redactor};
use crate::request::{InvocationRequest, RequestLocator};
use crate::state::resolve_locations;
use crate::storage::StorageGateway;

/// HTTP-style status for a successful run.
pub const STATUS_OK: u16 = 200;
/// Status for a structurally invalid invocation request.
pub const STATUS_BAD_REQUEST: u16 = 400;
/// Status for resolution, storage, and processing failures.
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// Stages of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing has happened yet.
    Start,
    /// All three storage locations are known.
    LocationsResolved,
    /// A request document was found in the invocation location.
    RequestFound,
    /// The request document decoded and validated.
    RequestParsed,
    /// The dataset was fetched and masked in memory.
    Redacted,
    /// The redacted dataset was written to the processed location.
    Uploaded,
    /// The input and invocation locations were cleared.
    Cleaned,
    /// The run finished successfully.
    Done,
    /// The run failed.
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::LocationsResolved => "locations_resolved",
            Self::RequestFound => "request_found",
            Self::RequestParsed => "request_parsed",
            Self::Redacted => "redacted",
            Self::Uploaded => "uploaded",
            Self::Cleaned => "cleaned",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why a run ended in the `Error` stage.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    /// The storage locations could not be resolved.
    #[error("failed to resolve storage locations: {0}")]
    Configuration(#[source] Error),

    /// The invocation location holds no request document.
    #[error("no request document found in invocation location {location}")]
    RequestNotFound {
        /// The location that was searched.
        location: BucketName,
    },

    /// The invocation location could not be listed, or the request could not be read.
    #[error("failed to retrieve request document: {0}")]
    RequestUnreadable(#[source] Error),

    /// The request document is structurally invalid.
    #[error("invalid request document: {0}")]
    RequestInvalid(#[source] Error),

    /// The dataset could not be fetched, parsed, or masked.
    #[error("failed to process dataset: {0}")]
    Processing(#[source] Error),

    /// The redacted dataset could not be written.
    #[error("failed to upload redacted dataset: {0}")]
    Upload(#[source] Error),
}

impl RunFailure {
    /// The status code reported for this failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RequestInvalid(_) => STATUS_BAD_REQUEST,
            _ => STATUS_INTERNAL_ERROR,
        }
    }
}

/// Structured result of one run. Always produced, success or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// 200, 400, or 500.
    pub status_code: u16,
    /// Human-readable outcome.
    pub message: String,
}

impl RunResult {
    /// Returns true for a 200 result.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == STATUS_OK
    }
}

impl From<&RunFailure> for RunResult {
    fn from(failure: &RunFailure) -> Self {
        Self {
            status_code: failure.status_code(),
            message: failure.to_string(),
        }
    }
}

/// Outcome of clearing one location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Keys that were deleted.
    pub deleted: Vec<String>,
    /// Keys that could not be deleted, with the error text.
    pub failed: Vec<(String, String)>,
}

impl CleanupReport {
    /// Returns true if every listed object was deleted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes every object in `location`.
///
/// Clearing an empty location deletes nothing and succeeds. Individual delete
/// failures are collected in the report and the remaining objects are still
/// attempted.
///
/// # Errors
///
/// Returns the gateway error if the location cannot be listed.
pub async fn clear_location(
    gateway: &dyn StorageGateway,
    location: &BucketName,
) -> crate::Result<CleanupReport> {
    let objects = gateway.list(location).await?;
    let mut report = CleanupReport::default();

    for object in objects {
        match gateway.delete(location, &object.key).await {
            Ok(()) => report.deleted.push(object.key),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %location,
                    key = %object.key,
                    "failed to delete object"
                );
                report.failed.push((object.key, e.to_string()));
            }
        }
    }

    if report.deleted.is_empty() && report.failed.is_empty() {
        tracing::info!(%location, "no objects found in bucket");
    } else {
        tracing::info!(
            %location,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "cleared bucket"
        );
    }
    Ok(report)
}

/// State of one run. Owned by the orchestrator and dropped when the run returns.
#[derive(Debug)]
pub struct PipelineRun {
    /// Run identifier used in log spans.
    pub run_id: Ulid,
    /// Current stage.
    pub stage: Stage,
    /// Resolved locations, once known.
    pub locations: Option<Locations>,
    /// Key of the request document, once found.
    pub request_key: Option<String>,
    /// Decoded request, once parsed.
    pub request: Option<InvocationRequest>,
    /// Key the redacted dataset was written under, once uploaded.
    pub output_key: Option<String>,
}

impl PipelineRun {
    /// Creates a run at [`Stage::Start`] with a fresh run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Ulid::new(),
            stage: Stage::Start,
            locations: None,
            request_key: None,
            request: None,
            output_key: None,
        }
    }

    fn advance(&mut self, next: Stage) {
        tracing::debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

/// Cleanup outcome for both transient locations.
#[derive(Debug, Clone, Default)]
pub struct Cleanup {
    /// Input location report, `None` if it could not be listed.
    pub input: Option<CleanupReport>,
    /// Invocation location report, `None` if it could not be listed.
    pub invocation: Option<CleanupReport>,
}

impl Cleanup {
    /// Returns true if both locations were fully cleared.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.input.as_ref().is_some_and(CleanupReport::is_complete)
            && self
                .invocation
                .as_ref()
                .is_some_and(CleanupReport::is_complete)
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Where the redacted dataset landed.
    pub output_location: BucketName,
    /// Key of the redacted dataset.
    pub output_key: String,
    /// What the masking pass did.
    pub redacted: RedactedObject,
    /// What cleanup did.
    pub cleanup: Cleanup,
}

/// Sequences location resolution, request discovery, redaction, upload, and cleanup.
pub struct Pipeline {
    gateway: Arc<dyn StorageGateway>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn StorageGateway>, config: PipelineConfig) -> Self {
        Self { gateway, config }
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline once and reports the outcome.
    pub async fn run(&self) -> RunResult {
        let mut run = PipelineRun::new();
        let span = pipeline_span(&run.run_id.to_string());

        async {
            match self.execute(&mut run).await {
                Ok(summary) => {
                    run.advance(Stage::Done);
                    let report = &summary.redacted.report;
                    tracing::info!(
                        output = %format!("{}/{}", summary.output_location, summary.output_key),
                        cleanup_complete = summary.cleanup.is_complete(),
                        "processing completed successfully"
                    );
                    RunResult {
                        status_code: STATUS_OK,
                        message: format!(
                            "Processing completed successfully: wrote {}/{} ({} rows, {} columns masked, {} not found)",
                            summary.output_location,
                            summary.output_key,
                            report.rows,
                            report.masked.len(),
                            report.missing.len()
                        ),
                    }
                }
                Err(failure) => {
                    let failed_at = run.stage;
                    run.advance(Stage::Error);
                    tracing::error!(error = %failure, stage = %failed_at, "pipeline run failed");
                    RunResult::from(&failure)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Drives one run through every stage, returning the summary on success.
    ///
    /// On failure `run.stage` is left at the last stage reached.
    ///
    /// # Errors
    ///
    /// Returns the [`RunFailure`] for the first stage that failed.
    pub async fn execute(&self, run: &mut PipelineRun) -> Result<RunSummary, RunFailure> {
        let state_location = self.config.validate().map_err(RunFailure::Configuration)?;

        let locations = resolve_locations(
            self.gateway.as_ref(),
            &state_location,
            &self.config.state_key,
        )
        .await
        .map_err(RunFailure::Configuration)?;
        run.locations = Some(locations.clone());
        run.advance(Stage::LocationsResolved);

        let locator = RequestLocator::new(
            Arc::clone(&self.gateway),
            self.config.request_suffix.clone(),
            self.config.selection,
        );
        let request_key = locator
            .find_request(&locations.invocation)
            .await
            .map_err(RunFailure::RequestUnreadable)?
            .ok_or_else(|| RunFailure::RequestNotFound {
                location: locations.invocation.clone(),
            })?;
        run.request_key = Some(request_key.clone());
        run.advance(Stage::RequestFound);

        let request = match locator.load(&locations.invocation, &request_key).await {
            Ok(request) => request,
            Err(e @ Error::InvalidRequest { .. }) => return Err(RunFailure::RequestInvalid(e)),
            Err(e) => return Err(RunFailure::RequestUnreadable(e)),
        };
        tracing::info!(
            source = %format!("{}/{}", request.source_location, request.source_key),
            columns = ?request.columns_to_redact,
            "decoded invocation request"
        );
        if request.source_location != locations.input {
            tracing::warn!(
                source = %request.source_location,
                input = %locations.input,
                "request source differs from the input location; the input location is still cleared"
            );
        }
        let output_key = processed_key(&self.config.processed_prefix, &request.source_key)
            .map_err(RunFailure::RequestInvalid)?;
        run.request = Some(request.clone());
        run.advance(Stage::RequestParsed);

        let redacted = Redactor::new(Arc::clone(&self.gateway))
            .redact(
                &request.source_location,
                &request.source_key,
                request.columns_to_redact.as_slice(),
            )
            .await
            .map_err(RunFailure::Processing)?;
        run.advance(Stage::Redacted);

        self.gateway
            .put(&locations.processed, &output_key, redacted.data.clone())
            .await
            .map_err(RunFailure::Upload)?;
        tracing::info!(
            location = %locations.processed,
            key = %output_key,
            "uploaded obfuscated dataset"
        );
        run.output_key = Some(output_key.clone());
        run.advance(Stage::Uploaded);

        let cleanup = Cleanup {
            input: self.clear_logged(&locations.input).await,
            invocation: self.clear_logged(&locations.invocation).await,
        };
        run.advance(Stage::Cleaned);

        Ok(RunSummary {
            output_location: locations.processed,
            output_key,
            redacted,
            cleanup,
        })
    }

    async fn clear_logged(&self, location: &BucketName) -> Option<CleanupReport> {
        match clear_location(self.gateway.as_ref(), location).await {
            Ok(report) => Some(report),
            Err(e) => {
                tracing::error!(error = %e, %location, "failed to delete objects from bucket");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGateway;
    use bytes::Bytes;

    fn bucket(name: &str) -> BucketName {
        BucketName::new(name).expect("valid bucket")
    }

    #[test]
    fn failure_status_codes() {
        let invalid = RunFailure::RequestInvalid(Error::invalid_request("missing bucket_name"));
        assert_eq!(invalid.status_code(), STATUS_BAD_REQUEST);

        let not_found = RunFailure::RequestNotFound {
            location: bucket("invocation-bucket"),
        };
        assert_eq!(not_found.status_code(), STATUS_INTERNAL_ERROR);
        assert_eq!(
            RunFailure::Processing(Error::dataset("bad")).status_code(),
            STATUS_INTERNAL_ERROR
        );

        let result = RunResult::from(&invalid);
        assert_eq!(result.status_code, 400);
        assert!(result.message.contains("missing bucket_name"));
    }

    #[test]
    fn run_result_serializes_wire_shape() {
        let result = RunResult {
            status_code: 200,
            message: "ok".into(),
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({ "status_code": 200, "message": "ok" })
        );
    }

    #[tokio::test]
    async fn clear_location_deletes_everything() {
        let gateway = MemoryGateway::new();
        let loc = bucket("input-bucket");
        for key in ["file1", "nested/file2", "file3.json"] {
            gateway.put(&loc, key, Bytes::from("x")).await.unwrap();
        }

        let report = clear_location(&gateway, &loc).await.expect("clear");
        assert_eq!(report.deleted.len(), 3);
        assert!(report.is_complete());
        assert!(gateway.keys(&loc).is_empty());
    }

    #[tokio::test]
    async fn clear_location_is_idempotent() {
        let gateway = MemoryGateway::new();
        let loc = bucket("empty-bucket");

        let first = clear_location(&gateway, &loc).await.expect("clear empty");
        let second = clear_location(&gateway, &loc).await.expect("clear again");
        assert_eq!(first, CleanupReport::default());
        assert_eq!(second, CleanupReport::default());
    }

    #[tokio::test]
    async fn missing_state_document_fails_at_start() {
        let pipeline = Pipeline::new(Arc::new(MemoryGateway::new()), PipelineConfig::default());
        let mut run = PipelineRun::new();

        let failure = pipeline.execute(&mut run).await.expect_err("no state");
        assert!(matches!(failure, RunFailure::Configuration(_)));
        assert_eq!(run.stage, Stage::Start);
        assert!(run.locations.is_none());
    }
}
