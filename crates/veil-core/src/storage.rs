//! Storage gateway abstraction for object storage.
//!
//! This module defines the contract every component uses to reach the object
//! store. A gateway is constructed once and handed to each component as an
//! `Arc<dyn StorageGateway>`; nothing in the crate holds a process-wide client.
//!
//! ## Listing Order
//!
//! `list` returns keys in provider-defined order. Backends are free to return
//! lexical, insertion, or arbitrary order, and callers must not assume one
//! unless they sort.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::location::{BucketName, validate_key};

/// Metadata about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object key within its location.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp, when the backend reports one.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Object store primitives consumed by every pipeline component.
#[async_trait]
pub trait StorageGateway: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// Returns `Error::NotFound` if the object doesn't exist and
    /// `Error::Transport` when the store cannot be reached.
    async fn get(&self, location: &BucketName, key: &str) -> Result<Bytes>;

    /// Writes an object unconditionally, replacing any existing content.
    async fn put(&self, location: &BucketName, key: &str, data: Bytes) -> Result<()>;

    /// Lists every object in a location.
    ///
    /// Returns an empty vec for an empty location. Order is provider-defined.
    async fn list(&self, location: &BucketName) -> Result<Vec<ObjectMeta>>;

    /// Deletes an object.
    ///
    /// Succeeds even if the object doesn't exist (idempotent).
    async fn delete(&self, location: &BucketName, key: &str) -> Result<()>;
}

/// In-memory storage gateway.
///
/// Thread-safe via `RwLock`. Lists objects in insertion order; overwriting a
/// key keeps its original position.
#[derive(Debug, Default, Clone)]
pub struct MemoryGateway {
    buckets: Arc<RwLock<HashMap<BucketName, Vec<StoredObject>>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    key: String,
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryGateway {
    /// Creates a new empty memory gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the keys stored in a location, in listing order.
    #[must_use]
    pub fn keys(&self, location: &BucketName) -> Vec<String> {
        self.buckets
            .read()
            .map(|buckets| {
                buckets
                    .get(location)
                    .map(|objects| objects.iter().map(|o| o.key.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }
}

fn poisoned() -> Error {
    Error::Internal {
        message: "lock poisoned".into(),
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn get(&self, location: &BucketName, key: &str) -> Result<Bytes> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;

        buckets
            .get(location)
            .and_then(|objects| objects.iter().find(|o| o.key == key))
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {location}/{key}")))
    }

    async fn put(&self, location: &BucketName, key: &str, data: Bytes) -> Result<()> {
        validate_key(key)?;
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        let objects = buckets.entry(location.clone()).or_default();

        let stored = StoredObject {
            key: key.to_string(),
            data,
            last_modified: Utc::now(),
        };
        match objects.iter_mut().find(|o| o.key == key) {
            Some(existing) => *existing = stored,
            None => objects.push(stored),
        }
        Ok(())
    }

    async fn list(&self, location: &BucketName) -> Result<Vec<ObjectMeta>> {
        let buckets = self.buckets.read().map_err(|_| poisoned())?;

        Ok(buckets
            .get(location)
            .map(|objects| {
                objects
                    .iter()
                    .map(|o| ObjectMeta {
                        key: o.key.clone(),
                        size: o.data.len() as u64,
                        last_modified: Some(o.last_modified),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete(&self, location: &BucketName, key: &str) -> Result<()> {
        let mut buckets = self.buckets.write().map_err(|_| poisoned())?;
        if let Some(objects) = buckets.get_mut(location) {
            objects.retain(|o| o.key != key);
        }
        Ok(())
    }
}
