//! Storage locations and object key helpers.
//!
//! A [`BucketName`] identifies one object-store container. A pipeline run works
//! against three of them, bundled in [`Locations`]:
//!
//! | Role | Contents | Cleared after a successful run |
//! |------|----------|--------------------------------|
//! | `input` | raw datasets | yes |
//! | `processed` | redacted datasets under `processed/` | no |
//! | `invocation` | pending invocation requests | yes |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A validated bucket (container) identifier.
///
/// Names are 3 to 63 characters of lowercase ASCII letters, digits, `-`, `_`
/// and `.`, and must start and end with a letter or digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Creates a bucket name after validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLocation`] if the name is empty, too long,
    /// or contains characters outside the allowed set.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Returns the bucket name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidLocation {
                message: "bucket name cannot be empty".into(),
            });
        }

        if !(3..=63).contains(&name.len()) {
            return Err(Error::InvalidLocation {
                message: format!("bucket name must be 3-63 characters: {name}"),
            });
        }

        if !name.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' || c == '.'
        }) {
            return Err(Error::InvalidLocation {
                message: format!(
                    "bucket name contains invalid characters (allowed: a-z, 0-9, '-', '_', '.'): {name}"
                ),
            });
        }

        let edge_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
        if !edge_ok(name.chars().next()) || !edge_ok(name.chars().last()) {
            return Err(Error::InvalidLocation {
                message: format!("bucket name must start and end with a letter or digit: {name}"),
            });
        }

        Ok(())
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BucketName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<BucketName> for String {
    fn from(value: BucketName) -> Self {
        value.0
    }
}

/// The three storage locations a pipeline run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    /// Raw datasets awaiting redaction.
    pub input: BucketName,
    /// Destination for redacted datasets.
    pub processed: BucketName,
    /// Pending invocation requests.
    pub invocation: BucketName,
}

impl Locations {
    /// Bundles three locations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the processed location is the same
    /// bucket as the input or invocation location. Both of those are cleared
    /// after a successful run, which would delete the redacted output.
    pub fn new(input: BucketName, processed: BucketName, invocation: BucketName) -> Result<Self> {
        if processed == input || processed == invocation {
            return Err(Error::configuration(format!(
                "processed location {processed} must differ from the input and invocation locations"
            )));
        }

        Ok(Self {
            input,
            processed,
            invocation,
        })
    }
}

/// Validates an object key for use with a storage gateway.
///
/// Keys are relative, `/`-separated paths. Empty keys, absolute paths,
/// backslashes, control characters, and `.`/`..` segments are rejected.
///
/// # Errors
///
/// Returns [`Error::InvalidLocation`] describing the first violation found.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidLocation {
            message: "object key cannot be empty".into(),
        });
    }

    if key.starts_with('/') {
        return Err(Error::InvalidLocation {
            message: format!("absolute keys not allowed: {key}"),
        });
    }

    if key.contains('\\') {
        return Err(Error::InvalidLocation {
            message: format!("backslashes not allowed in keys: {key}"),
        });
    }

    if key.chars().any(char::is_control) {
        return Err(Error::InvalidLocation {
            message: format!("control characters not allowed in keys: {key:?}"),
        });
    }

    if key.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(Error::InvalidLocation {
            message: format!("relative segments not allowed in keys: {key}"),
        });
    }

    Ok(())
}

/// Returns the final `/`-separated segment of a key.
///
/// Returns `None` when the key ends in `/` and so names a prefix rather than
/// an object.
#[must_use]
pub fn basename(key: &str) -> Option<&str> {
    key.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Derives the key a redacted dataset is written under.
///
/// `processed_key("processed", "2024/people.csv")` is `processed/people.csv`.
///
/// # Errors
///
/// Returns [`Error::InvalidLocation`] if `source_key` has no basename.
pub fn processed_key(prefix: &str, source_key: &str) -> Result<String> {
    let name = basename(source_key).ok_or_else(|| Error::InvalidLocation {
        message: format!("source key has no file name: {source_key}"),
    })?;
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{prefix}/{name}"))
    }
}
