//! # veil-cli
//!
//! Command-line interface for the veil redaction pipeline.
//!
//! ## Commands
//!
//! - `veil run` - Process the pending invocation request once
//! - `veil request` - Write an invocation request for a dataset in the input location
//!
//! ## Configuration
//!
//! Every setting can come from a flag or an environment variable:
//!
//! - `VEIL_STORAGE_ROOT` - Directory holding one subdirectory per bucket (required)
//! - `VEIL_STATE_BUCKET` - Bucket holding the state document
//! - `VEIL_STATE_KEY` - Key of the state document
//! - `VEIL_PROCESSED_PREFIX` - Key prefix for redacted outputs
//! - `VEIL_REQUEST_SUFFIX` - Suffix identifying request documents
//! - `VEIL_REQUEST_SELECTION` - `first-listed` or `lexical`
//! - `VEIL_LOG_FORMAT` - `pretty` or `json`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]

pub mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use veil_core::config::{
    DEFAULT_PROCESSED_PREFIX, DEFAULT_REQUEST_SUFFIX, DEFAULT_STATE_KEY, DEFAULT_STATE_LOCATION,
};
use veil_core::{LocalFsGateway, LogFormat, PipelineConfig, SelectionPolicy, StorageGateway};

/// veil - redact PII columns from datasets in object storage.
#[derive(Debug, Parser)]
#[command(name = "veil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding one subdirectory per bucket.
    #[arg(long, env = "VEIL_STORAGE_ROOT", global = true)]
    pub storage_root: Option<PathBuf>,

    /// Bucket holding the state document.
    #[arg(long, env = "VEIL_STATE_BUCKET", default_value = DEFAULT_STATE_LOCATION, global = true)]
    pub state_bucket: String,

    /// Key of the state document.
    #[arg(long, env = "VEIL_STATE_KEY", default_value = DEFAULT_STATE_KEY, global = true)]
    pub state_key: String,

    /// Key prefix for redacted outputs.
    #[arg(
        long,
        env = "VEIL_PROCESSED_PREFIX",
        default_value = DEFAULT_PROCESSED_PREFIX,
        global = true
    )]
    pub processed_prefix: String,

    /// Suffix identifying invocation request documents.
    #[arg(long, env = "VEIL_REQUEST_SUFFIX", default_value = DEFAULT_REQUEST_SUFFIX, global = true)]
    pub request_suffix: String,

    /// How to choose among several pending requests.
    #[arg(long, env = "VEIL_REQUEST_SELECTION", default_value = "first-listed", global = true)]
    pub selection: Selection,

    /// Log output format.
    #[arg(long, env = "VEIL_LOG_FORMAT", default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the pipeline configuration from the flags.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            state_location: self.state_bucket.clone(),
            state_key: self.state_key.clone(),
            processed_prefix: self.processed_prefix.clone(),
            request_suffix: self.request_suffix.clone(),
            selection: self.selection.into(),
        }
    }

    /// Opens the storage gateway.
    ///
    /// # Errors
    ///
    /// Returns an error if no storage root is set or it is not a directory.
    pub fn gateway(&self) -> Result<Arc<dyn StorageGateway>> {
        let root = self
            .storage_root
            .as_ref()
            .context("Storage root is required. Set VEIL_STORAGE_ROOT or use --storage-root")?;
        let gateway = LocalFsGateway::new(root)
            .with_context(|| format!("cannot use storage root {}", root.display()))?;
        Ok(Arc::new(gateway))
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process the pending invocation request once.
    Run(commands::run::RunArgs),
    /// Write an invocation request for a dataset in the input location.
    Request(commands::request::RequestArgs),
}

/// Request selection policy flag.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum Selection {
    /// First match in listing order.
    #[default]
    FirstListed,
    /// Lexically smallest match.
    Lexical,
}

impl From<Selection> for SelectionPolicy {
    fn from(value: Selection) -> Self {
        match value {
            Selection::FirstListed => Self::FirstListed,
            Selection::Lexical => Self::Lexical,
        }
    }
}

/// Log format flag.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable logs.
    #[default]
    Pretty,
    /// JSON logs.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}
