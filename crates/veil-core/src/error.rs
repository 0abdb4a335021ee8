//! Error types and result aliases for veil.
//!
//! Storage, decoding, and validation failures share one error type so every
//! component boundary returns an explicit `Result` instead of a sentinel.

/// The result type used throughout veil.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in veil operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A bucket name or object key failed validation.
    #[error("invalid location: {message}")]
    InvalidLocation {
        /// Description of what made the location invalid.
        message: String,
    },

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The object store could not be reached or rejected the call.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The state document did not yield all three storage locations.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration failure.
        message: String,
    },

    /// An invocation request document is structurally invalid.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what is missing or malformed.
        message: String,
    },

    /// A dataset could not be parsed or serialized.
    #[error("dataset error: {message}")]
    Dataset {
        /// Description of the dataset failure.
        message: String,
    },

    /// An internal error occurred that should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a new transport error with the given message.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source cause.
    #[must_use]
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new dataset error.
    #[must_use]
    pub fn dataset(message: impl Into<String>) -> Self {
        Self::Dataset {
            message: message.into(),
        }
    }

    /// Returns true if the error reports a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(err.to_string())
        } else {
            Self::transport_with_source("filesystem operation failed", err)
        }
    }
}
