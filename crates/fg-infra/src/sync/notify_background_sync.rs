use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Mutex;
use tokio::sync::Notify;

use fg_core::ports::BackgroundSyncPort;

/// In-process background sync: registering a tag wakes whoever is parked in
/// [`NotifyBackgroundSync::wait`].
///
/// Registrations coalesce. Several `register` calls before the driver wakes
/// produce a single wake-up carrying every tag.
#[derive(Default)]
pub struct NotifyBackgroundSync {
    tags: Mutex<BTreeSet<String>>,
    notify: Notify,
}

impl NotifyBackgroundSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for at least one registration and drains the registered tags.
    pub async fn wait(&self) -> Vec<String> {
        loop {
            let drained = self.take_tags();
            if !drained.is_empty() {
                return drained;
            }
            self.notify.notified().await;
        }
    }

    pub fn take_tags(&self) -> Vec<String> {
        match self.tags.lock() {
            Ok(mut tags) => std::mem::take(&mut *tags).into_iter().collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl BackgroundSyncPort for NotifyBackgroundSync {
    async fn register(&self, tag: &str) -> anyhow::Result<()> {
        self.tags
            .lock()
            .map_err(|_| anyhow::anyhow!("background sync lock poisoned"))?
            .insert(tag.to_string());
        self.notify.notify_one();
        tracing::debug!(tag, "background sync registered");
        Ok(())
    }
}
