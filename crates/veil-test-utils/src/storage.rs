//! Test storage gateway with operation tracing.
//!
//! Wraps a [`MemoryGateway`] and records every call for test assertions.
//! Failures can be injected per location and key prefix.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use veil_core::error::{Error, Result};
use veil_core::location::BucketName;
use veil_core::storage::{MemoryGateway, ObjectMeta, StorageGateway};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Get operation.
    Get {
        /// Location that was read.
        location: String,
        /// Key that was read.
        key: String,
    },
    /// Put operation.
    Put {
        /// Location that was written.
        location: String,
        /// Key that was written.
        key: String,
        /// Size of data written.
        size: usize,
    },
    /// List operation.
    List {
        /// Location that was listed.
        location: String,
    },
    /// Delete operation.
    Delete {
        /// Location that was deleted from.
        location: String,
        /// Key that was deleted.
        key: String,
    },
}

/// Which calls an injected failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    /// Every operation.
    Any,
    /// Only `get`.
    Get,
    /// Only `put`.
    Put,
    /// Only `list`.
    List,
    /// Only `delete`.
    Delete,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    location: String,
    key_prefix: String,
    on: FailOn,
}

/// In-memory storage gateway with operation tracing.
///
/// Records all operations for later assertion in tests. Failed calls are
/// recorded too, so tests can check a call was attempted.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryGateway {
    inner: MemoryGateway,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    failures: Arc<Mutex<Vec<InjectedFailure>>>,
}

impl TracingMemoryGateway {
    /// Creates a new empty tracing gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns the recorded puts.
    #[must_use]
    pub fn puts(&self) -> Vec<StorageOp> {
        self.operations()
            .into_iter()
            .filter(|op| matches!(op, StorageOp::Put { .. }))
            .collect()
    }

    /// Returns the recorded deletes.
    #[must_use]
    pub fn deletes(&self) -> Vec<StorageOp> {
        self.operations()
            .into_iter()
            .filter(|op| matches!(op, StorageOp::Delete { .. }))
            .collect()
    }

    /// Makes every operation on `location` fail with a transport error.
    pub fn inject_failure(&self, location: &str) {
        self.inject_failure_on(location, "", FailOn::Any);
    }

    /// Makes `on` operations on keys under `key_prefix` in `location` fail
    /// with a transport error. An empty prefix matches every key. List calls
    /// have no key, so a list failure ignores the prefix.
    pub fn inject_failure_on(&self, location: &str, key_prefix: &str, on: FailOn) {
        self.failures.lock().expect("lock").push(InjectedFailure {
            location: location.to_string(),
            key_prefix: key_prefix.to_string(),
            on,
        });
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.failures.lock().expect("lock").clear();
    }

    /// Returns the keys stored in a location, in listing order.
    #[must_use]
    pub fn keys(&self, location: &str) -> Vec<String> {
        BucketName::new(location)
            .map(|loc| self.inner.keys(&loc))
            .unwrap_or_default()
    }

    /// Stores an object directly, bypassing tracing and injected failures.
    pub async fn seed(&self, location: &str, key: &str, data: impl Into<Bytes>) {
        let location = BucketName::new(location).expect("valid seed location");
        self.inner
            .put(&location, key, data.into())
            .await
            .expect("seed put");
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, location: &BucketName, key: Option<&str>, on: FailOn) -> Result<()> {
        let failures = self.failures.lock().expect("lock");
        let hit = failures.iter().any(|f| {
            f.location == location.as_str()
                && (f.on == FailOn::Any || f.on == on)
                && key.is_none_or(|k| k.starts_with(&f.key_prefix))
        });
        if hit {
            return Err(Error::transport(format!(
                "injected failure for {location}/{}",
                key.unwrap_or("")
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl StorageGateway for TracingMemoryGateway {
    async fn get(&self, location: &BucketName, key: &str) -> Result<Bytes> {
        self.record(StorageOp::Get {
            location: location.to_string(),
            key: key.to_string(),
        });
        self.check_failure(location, Some(key), FailOn::Get)?;
        self.inner.get(location, key).await
    }

    async fn put(&self, location: &BucketName, key: &str, data: Bytes) -> Result<()> {
        self.record(StorageOp::Put {
            location: location.to_string(),
            key: key.to_string(),
            size: data.len(),
        });
        self.check_failure(location, Some(key), FailOn::Put)?;
        self.inner.put(location, key, data).await
    }

    async fn list(&self, location: &BucketName) -> Result<Vec<ObjectMeta>> {
        self.record(StorageOp::List {
            location: location.to_string(),
        });
        self.check_failure(location, None, FailOn::List)?;
        self.inner.list(location).await
    }

    async fn delete(&self, location: &BucketName, key: &str) -> Result<()> {
        self.record(StorageOp::Delete {
            location: location.to_string(),
            key: key.to_string(),
        });
        self.check_failure(location, Some(key), FailOn::Delete)?;
        self.inner.delete(location, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(name: &str) -> BucketName {
        BucketName::new(name).expect("valid bucket")
    }

    #[tokio::test]
    async fn tracing_gateway_records_operations() {
        let gateway = TracingMemoryGateway::new();
        let loc = bucket("input-bucket");

        gateway
            .put(&loc, "test.csv", Bytes::from("hello"))
            .await
            .expect("put");
        let _ = gateway.get(&loc, "test.csv").await;
        let _ = gateway.list(&loc).await;

        let ops = gateway.operations();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], StorageOp::Put { size: 5, .. }));
        assert!(matches!(ops[1], StorageOp::Get { .. }));
        assert!(matches!(ops[2], StorageOp::List { .. }));
    }

    #[tokio::test]
    async fn tracing_gateway_failure_injection() {
        let gateway = TracingMemoryGateway::new();
        gateway.seed("input-bucket", "fail/test.csv", "data").await;
        gateway.seed("input-bucket", "ok/test.csv", "data").await;
        gateway.inject_failure_on("input-bucket", "fail/", FailOn::Get);

        let loc = bucket("input-bucket");
        let err = gateway.get(&loc, "fail/test.csv").await.expect_err("injected");
        assert!(matches!(err, Error::Transport { .. }));
        assert!(gateway.get(&loc, "ok/test.csv").await.is_ok());
        assert!(gateway.delete(&loc, "fail/test.csv").await.is_ok());

        gateway.clear_failures();
        gateway.inject_failure("input-bucket");
        assert!(gateway.list(&loc).await.is_err());
        assert!(gateway.put(&loc, "x.csv", Bytes::from("x")).await.is_err());
    }

    #[tokio::test]
    async fn seed_bypasses_tracing() {
        let gateway = TracingMemoryGateway::new();
        gateway.seed("input-bucket", "a.csv", "a").await;
        assert!(gateway.operations().is_empty());
        assert_eq!(gateway.keys("input-bucket"), vec!["a.csv"]);
    }
}
