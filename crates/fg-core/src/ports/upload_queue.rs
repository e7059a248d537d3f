use async_trait::async_trait;

use crate::error::QueueError;
use crate::ids::PendingUploadId;
use crate::upload::{NewPendingUpload, PendingUpload};

/// Durable storage contract of the offline upload queue.
///
/// Entries are user data, not cache: they leave the queue only through
/// [`PendingUploadQueuePort::remove`].
#[async_trait]
pub trait PendingUploadQueuePort: Send + Sync {
    /// Appends an upload. The payload is durable once this returns.
    async fn enqueue(&self, upload: NewPendingUpload) -> Result<PendingUploadId, QueueError>;

    /// All pending uploads, oldest first.
    async fn list_pending(&self) -> Result<Vec<PendingUpload>, QueueError>;

    /// Returns `false` if no such entry existed.
    async fn remove(&self, id: PendingUploadId) -> Result<bool, QueueError>;

    async fn record_attempt(&self, id: PendingUploadId) -> Result<(), QueueError>;
}
