//! Idle-time image warmer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::gateway::GatewayClient;

/// Result of one idle slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreloadTick {
    Fetched(String),
    /// The registry already had this image.
    Skipped(String),
    /// Foreground requests were running; nothing was done.
    Yielded,
    Failed(String),
    Exhausted,
}

pub struct PreloadScheduler {
    client: GatewayClient,
    urls: Vec<String>,
    cursor: AtomicUsize,
    interval: Duration,
}

impl PreloadScheduler {
    pub fn new(client: GatewayClient, urls: Vec<String>, interval: Duration) -> Self {
        Self {
            client,
            urls,
            cursor: AtomicUsize::new(0),
            interval,
        }
    }

    pub fn remaining(&self) -> usize {
        self.urls
            .len()
            .saturating_sub(self.cursor.load(Ordering::SeqCst))
    }

    /// Handles at most one URL. A failed URL is not retried.
    pub async fn run_once(&self) -> PreloadTick {
        if self.client.foreground_in_flight() > 0 {
            return PreloadTick::Yielded;
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(url) = self.urls.get(index) else {
            self.cursor.store(self.urls.len(), Ordering::SeqCst);
            return PreloadTick::Exhausted;
        };

        if self.client.registry().is_loaded(url).await {
            debug!(%url, "preload skipped, already loaded");
            return PreloadTick::Skipped(url.clone());
        }

        match self.client.fetch_image(url).await {
            Ok(_) => {
                debug!(%url, "image preloaded");
                PreloadTick::Fetched(url.clone())
            }
            Err(e) => {
                warn!(%url, error = %e, "image preload failed");
                PreloadTick::Failed(url.clone())
            }
        }
    }

    /// Runs one slice per interval until `cancel` fires or the list is done.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("preload cancelled");
                        return;
                    }
                    _ = ticker.tick() => {}
                }
                if self.run_once().await == PreloadTick::Exhausted {
                    info!(urls = self.urls.len(), "preload finished");
                    return;
                }
            }
        })
    }
}
