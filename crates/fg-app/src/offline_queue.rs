use std::sync::Arc;
use tracing::{info, warn};

use fg_core::error::GatewayError;
use fg_core::ids::PendingUploadId;
use fg_core::ports::{BackgroundSyncPort, PendingUploadQueuePort};
use fg_core::upload::{NewPendingUpload, PendingUpload};

/// Tag under which the replay driver is registered with background sync.
pub const UPLOAD_SYNC_TAG: &str = "upload-sync";

/// Uploads captured while offline, waiting for the network to come back.
pub struct OfflineUploadQueue {
    store: Arc<dyn PendingUploadQueuePort>,
    sync: Arc<dyn BackgroundSyncPort>,
}

impl OfflineUploadQueue {
    pub fn new(store: Arc<dyn PendingUploadQueuePort>, sync: Arc<dyn BackgroundSyncPort>) -> Self {
        Self { store, sync }
    }

    pub async fn enqueue(&self, upload: NewPendingUpload) -> Result<PendingUploadId, GatewayError> {
        let bytes = upload.payload.len();
        let id = self.store.enqueue(upload).await?;
        info!(%id, bytes, "upload queued for later");
        Ok(id)
    }

    pub async fn list_pending(&self) -> Result<Vec<PendingUpload>, GatewayError> {
        Ok(self.store.list_pending().await?)
    }

    pub async fn remove(&self, id: PendingUploadId) -> Result<bool, GatewayError> {
        Ok(self.store.remove(id).await?)
    }

    pub async fn record_attempt(&self, id: PendingUploadId) -> Result<(), GatewayError> {
        Ok(self.store.record_attempt(id).await?)
    }

    /// Asks the host to wake the replay driver. Failure only delays replay
    /// until the next explicit run, so it is logged rather than returned.
    pub async fn register_background_sync(&self) {
        if let Err(e) = self.sync.register(UPLOAD_SYNC_TAG).await {
            warn!(error = %e, "background sync registration failed");
        }
    }
}
