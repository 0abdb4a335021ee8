//! Shared test utilities for veil.
//!
//! This crate provides:
//! - [`TracingMemoryGateway`]: In-memory storage with operation recording and
//!   failure injection
//! - [`TestEnvironment`]: A gateway seeded with a state document
//! - Factory functions for state and request documents
//!
//! # Example
//!
//! ```rust,ignore
//! use veil_test_utils::{TestEnvironment, PEOPLE_CSV};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let env = TestEnvironment::new().await;
//!     env.seed_dataset("people.csv", PEOPLE_CSV).await;
//!     env.seed_request("people.json", "people.csv", &["name"]).await;
//!     let result = env.pipeline().run().await;
//!     assert!(result.is_success());
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("veil_core=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
