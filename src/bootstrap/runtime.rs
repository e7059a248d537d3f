//! Assembled gateway plus the background tasks that keep it healthy:
//! the upload replay driver, the preload scheduler and the cache sweeper.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fg_app::{GatewayClient, PreloadScheduler, UPLOAD_SYNC_TAG};
use fg_core::config::GatewayConfig;
use fg_core::ports::NetworkStatusPort;
use fg_infra::{NetworkStatusFlag, NotifyBackgroundSync, ReqwestTransport};

/// How often an armed replay driver re-checks connectivity.
const REPLAY_RECHECK: Duration = Duration::from_secs(30);

pub struct GatewayRuntime {
    config: GatewayConfig,
    client: GatewayClient,
    transport: Arc<ReqwestTransport>,
    network: Arc<NetworkStatusFlag>,
    sync: Arc<NotifyBackgroundSync>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl GatewayRuntime {
    pub(super) fn new(
        config: GatewayConfig,
        client: GatewayClient,
        transport: Arc<ReqwestTransport>,
        network: Arc<NetworkStatusFlag>,
        sync: Arc<NotifyBackgroundSync>,
    ) -> Self {
        Self {
            config,
            client,
            transport,
            network,
            sync,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }

    pub fn client(&self) -> &GatewayClient {
        &self.client
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Connectivity switch for the host.
    pub fn network(&self) -> &Arc<NetworkStatusFlag> {
        &self.network
    }

    pub fn sync(&self) -> &Arc<NotifyBackgroundSync> {
        &self.sync
    }

    /// Seeds the cookie jar, e.g. with a CSRF cookie obtained elsewhere.
    pub fn add_cookie(&self, cookie: &str) {
        self.transport.add_cookie(cookie);
    }

    /// Hydrates persisted state.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.client.init().await?;
        Ok(())
    }

    /// Starts the long-running tasks. They stop on [`GatewayRuntime::shutdown`].
    pub fn spawn_background_tasks(&mut self) {
        self.tasks.push(spawn_replay_driver(
            self.client.clone(),
            self.network.clone(),
            self.sync.clone(),
            self.cancel.child_token(),
        ));

        let sweep_every = Duration::from_secs(self.config.cache.default_ttl_secs.max(1));
        self.tasks.push(spawn_sweeper(
            self.client.clone(),
            sweep_every,
            self.cancel.child_token(),
        ));

        let preload = &self.config.preload;
        if preload.enabled && !preload.urls.is_empty() {
            let scheduler = PreloadScheduler::new(
                self.client.clone(),
                preload.urls.clone(),
                Duration::from_millis(preload.interval_ms.max(1)),
            );
            self.tasks.push(scheduler.spawn(self.cancel.child_token()));
        }

        info!(tasks = self.tasks.len(), "background tasks started");
    }

    /// Stops background tasks, then flushes persistent state.
    pub async fn shutdown(mut self) -> anyhow::Result<()> {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        self.client.dispose().await?;
        info!("gateway runtime shut down");
        Ok(())
    }
}

/// Replays the offline queue whenever an upload is deferred, and keeps
/// retrying on a timer while anything is left. The driver starts armed so
/// uploads queued by a previous run are picked up.
fn spawn_replay_driver(
    client: GatewayClient,
    network: Arc<NetworkStatusFlag>,
    sync: Arc<NotifyBackgroundSync>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut armed = true;
        let mut recheck = tokio::time::interval(REPLAY_RECHECK);
        recheck.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("replay driver cancelled");
                    return;
                }
                tags = sync.wait() => {
                    if tags.iter().any(|t| t == UPLOAD_SYNC_TAG) {
                        armed = true;
                    }
                }
                _ = recheck.tick() => {}
            }

            if !armed || !network.is_online() {
                continue;
            }
            match client.replay_pending_uploads().await {
                Ok(report) => {
                    armed = report.remaining > 0;
                    if report.replayed > 0 || report.failed > 0 {
                        info!(
                            replayed = report.replayed,
                            failed = report.failed,
                            remaining = report.remaining,
                            "upload replay pass finished"
                        );
                    }
                }
                Err(e) => warn!(error = %e, "upload replay pass failed"),
            }
        }
    })
}

fn spawn_sweeper(client: GatewayClient, every: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            match client.sweep().await {
                Ok(report) => debug!(?report, "cache sweep"),
                Err(e) => warn!(error = %e, "cache sweep failed"),
            }
        }
    })
}
