//! Key-value store port - durable, origin-scoped string storage
//!
//! Backs the persisted cache tier, the image registry, the cleanup marker and
//! the per-file upload URL cache.

use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait KeyValueStorePort: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
