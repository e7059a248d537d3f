use tracing::{info, warn};

use fg_core::error::{GatewayError, TransportError};
use fg_core::image::ImageHints;

use super::client::GatewayClient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub failed: usize,
    pub remaining: usize,
}

impl GatewayClient {
    /// Sends queued uploads oldest first. Successful ones leave the queue,
    /// failed ones get their attempt counter bumped and stay. Stops as soon
    /// as the host reports the network offline or a send is aborted; an
    /// aborted upload stays queued without counting an attempt.
    pub async fn replay_pending_uploads(&self) -> Result<ReplayReport, GatewayError> {
        let inner = &self.inner;
        let uploads = &inner.deps.uploads;
        let mut report = ReplayReport::default();

        for upload in uploads.list_pending().await? {
            if !inner.deps.network.is_online() {
                info!("network offline, pausing upload replay");
                break;
            }

            let file = upload.to_upload_file();
            match inner
                .send_upload(&file, &upload.folder, &upload.headers_snapshot)
                .await
            {
                Ok(url) => {
                    uploads.remove(upload.id).await?;
                    inner.deps.registry.record(&url, ImageHints::default()).await;
                    info!(id = %upload.id, %url, "queued upload replayed");
                    report.replayed += 1;
                }
                Err(GatewayError::Transport(TransportError::Aborted)) => {
                    info!(id = %upload.id, "upload replay aborted");
                    break;
                }
                Err(e) => {
                    warn!(
                        id = %upload.id,
                        attempts = upload.attempt_count + 1,
                        error = %e,
                        "queued upload failed"
                    );
                    uploads.record_attempt(upload.id).await?;
                    report.failed += 1;
                }
            }
        }

        report.remaining = uploads.list_pending().await?.len();
        Ok(report)
    }
}
