use async_trait::async_trait;

/// Asks the host to wake the upload replay driver once connectivity returns.
#[async_trait]
pub trait BackgroundSyncPort: Send + Sync {
    async fn register(&self, tag: &str) -> anyhow::Result<()>;
}
