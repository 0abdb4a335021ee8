//! # veil-core
//!
//! Column redaction for tabular objects held in an object store.
//!
//! A run reads a state document to learn three storage locations, picks up
//! the pending invocation request, masks the requested CSV columns, writes
//! the result to the processed location, and clears the transient locations.
//!
//! - **Storage**: the [`StorageGateway`] contract plus memory and filesystem gateways
//! - **State**: location resolution from the state document
//! - **Requests**: discovery, decoding, and production of invocation requests
//! - **Redaction**: CSV parsing, column masking, and serialization
//! - **Pipeline**: the orchestrator and its cleanup step
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veil_core::prelude::*;
//!
//! # async fn example() {
//! let gateway: Arc<dyn StorageGateway> = Arc::new(MemoryGateway::new());
//! let result = Pipeline::new(gateway, PipelineConfig::default()).run().await;
//! println!("{} {}", result.status_code, result.message);
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod local_fs;
pub mod location;
pub mod observability;
pub mod pipeline;
pub mod redact;
pub mod request;
pub mod state;
pub mod storage;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{PipelineConfig, SelectionPolicy};
    pub use crate::error::{Error, Result};
    pub use crate::local_fs::LocalFsGateway;
    pub use crate::location::{BucketName, Locations};
    pub use crate::pipeline::{Pipeline, RunFailure, RunResult, Stage, clear_location};
    pub use crate::redact::{MASK_TOKEN, Redactor};
    pub use crate::request::{InvocationRequest, RequestLocator};
    pub use crate::state::resolve_locations;
    pub use crate::storage::{MemoryGateway, ObjectMeta, StorageGateway};
}

// Re-export key types at crate root for ergonomics
pub use config::{PipelineConfig, SelectionPolicy};
pub use error::{Error, Result};
pub use local_fs::LocalFsGateway;
pub use location::{BucketName, Locations};
pub use observability::{LogFormat, init_logging};
pub use pipeline::{
    CleanupReport, Pipeline, PipelineRun, RunFailure, RunResult, Stage, clear_location,
};
pub use redact::{MASK_TOKEN, RedactionReport, Redactor, Table};
pub use request::{InvocationRequest, RequestLocator};
pub use state::resolve_locations;
pub use storage::{MemoryGateway, ObjectMeta, StorageGateway};
