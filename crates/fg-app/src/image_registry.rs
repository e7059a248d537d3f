use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use fg_core::image::{canonicalize_image_url, ImageHints, ImageRegistryEntry};
use fg_core::ports::{ClockPort, KeyValueStorePort};

pub const IMAGE_REGISTRY_KEY: &str = "image-registry";

/// Ledger of images already fetched, keyed by canonical URL.
///
/// Persisted every `persist_every` records rather than on every write; the
/// durable copy may lag the in-memory ledger by that many updates.
pub struct ImageRegistry {
    kv: Arc<dyn KeyValueStorePort>,
    clock: Arc<dyn ClockPort>,
    entries: RwLock<HashMap<String, ImageRegistryEntry>>,
    records: AtomicU64,
    persist_every: u64,
    max_age_ms: i64,
}

impl ImageRegistry {
    pub fn new(
        kv: Arc<dyn KeyValueStorePort>,
        clock: Arc<dyn ClockPort>,
        persist_every: u64,
        max_age_ms: i64,
    ) -> Self {
        Self {
            kv,
            clock,
            entries: RwLock::new(HashMap::new()),
            records: AtomicU64::new(0),
            persist_every: persist_every.max(1),
            max_age_ms,
        }
    }

    pub fn canonicalize(&self, url: &str) -> String {
        canonicalize_image_url(url)
    }

    /// Loaded and seen within the long image TTL.
    pub async fn is_loaded(&self, url: &str) -> bool {
        let canonical = self.canonicalize(url);
        let now = self.clock.now_ms();
        self.entries
            .read()
            .await
            .get(&canonical)
            .is_some_and(|e| e.loaded && !e.is_expired(now, self.max_age_ms))
    }

    pub async fn entry(&self, url: &str) -> Option<ImageRegistryEntry> {
        let canonical = self.canonicalize(url);
        self.entries.read().await.get(&canonical).cloned()
    }

    /// Upserts the entry for `url` and returns its new state.
    pub async fn record(&self, url: &str, hints: ImageHints) -> ImageRegistryEntry {
        let canonical = self.canonicalize(url);
        let now = self.clock.now_ms();

        let entry = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(&canonical) {
                Some(entry) => {
                    entry.touch(now, hints);
                    entry.clone()
                }
                None => {
                    let entry = ImageRegistryEntry::first_load(canonical.clone(), now, hints);
                    entries.insert(canonical, entry.clone());
                    entry
                }
            }
        };

        let records = self.records.fetch_add(1, Ordering::SeqCst) + 1;
        if records % self.persist_every == 0 {
            if let Err(e) = self.persist().await {
                warn!(error = %e, "image registry persist failed");
            }
        }
        entry
    }

    pub async fn persist(&self) -> Result<()> {
        let serialized = {
            let entries = self.entries.read().await;
            let list: Vec<&ImageRegistryEntry> = entries.values().collect();
            serde_json::to_string(&list).context("serialize image registry failed")?
        };
        self.kv
            .set(IMAGE_REGISTRY_KEY, &serialized)
            .await
            .context("write image registry failed")?;
        debug!("image registry persisted");
        Ok(())
    }

    /// Hydrates from the key-value store, dropping entries older than the long
    /// image TTL. Returns the number of entries kept.
    pub async fn load(&self) -> Result<usize> {
        let raw = self
            .kv
            .get(IMAGE_REGISTRY_KEY)
            .await
            .context("read image registry failed")?;
        let Some(raw) = raw else {
            return Ok(0);
        };

        let list: Vec<ImageRegistryEntry> = match serde_json::from_str(&raw) {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "discarding corrupt image registry");
                return Ok(0);
            }
        };

        let now = self.clock.now_ms();
        let total = list.len();
        let live: Vec<ImageRegistryEntry> = list
            .into_iter()
            .filter(|e| !e.is_expired(now, self.max_age_ms))
            .collect();
        let kept = live.len();

        let mut entries = self.entries.write().await;
        for entry in live {
            entries.insert(entry.canonical_url.clone(), entry);
        }
        info!(kept, dropped = total - kept, "image registry loaded");
        Ok(kept)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn dispose(&self) -> Result<()> {
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ManualClock, MemoryKv};

    const DAY: i64 = 24 * 60 * 60 * 1000;

    fn registry(kv: Arc<MemoryKv>, clock: Arc<ManualClock>) -> ImageRegistry {
        ImageRegistry::new(kv, clock, 10, 7 * DAY)
    }

    #[tokio::test]
    async fn recording_same_image_n_times_yields_one_entry() {
        let reg = registry(Arc::new(MemoryKv::default()), Arc::new(ManualClock::new(0)));

        for i in 0..5 {
            reg.record(&format!("https://cdn.folio.dev/a.jpg?t={i}"), ImageHints::default())
                .await;
        }

        assert_eq!(reg.len().await, 1);
        let entry = reg.entry("https://cdn.folio.dev/a.jpg").await.unwrap();
        assert_eq!(entry.load_count, 5);
        assert!(reg.is_loaded("https://cdn.folio.dev/a.jpg?cb=zz").await);
    }

    #[tokio::test]
    async fn every_nth_record_persists() {
        let kv = Arc::new(MemoryKv::default());
        let reg = ImageRegistry::new(kv.clone(), Arc::new(ManualClock::new(0)), 3, 7 * DAY);

        reg.record("/api/images/1", ImageHints::default()).await;
        reg.record("/api/images/2", ImageHints::default()).await;
        assert!(kv.raw(IMAGE_REGISTRY_KEY).is_none());

        reg.record("/api/images/3", ImageHints::default()).await;
        assert!(kv.raw(IMAGE_REGISTRY_KEY).is_some());
    }

    #[tokio::test]
    async fn survives_persist_and_reload() {
        let kv = Arc::new(MemoryKv::default());
        let clock = Arc::new(ManualClock::new(0));
        let reg = registry(kv.clone(), clock.clone());
        reg.record(
            "https://cdn.folio.dev/a.jpg?w=200",
            ImageHints {
                size: Some("card".to_string()),
                width: Some(200),
                height: None,
            },
        )
        .await;
        reg.persist().await.unwrap();

        let fresh = registry(kv, clock);
        assert_eq!(fresh.load().await.unwrap(), 1);
        let entry = fresh.entry("https://cdn.folio.dev/a.jpg?w=200&t=9").await.unwrap();
        assert_eq!(entry.width, Some(200));
        assert_eq!(entry.last_requested_size.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn load_drops_entries_older_than_long_ttl() {
        let kv = Arc::new(MemoryKv::default());
        let clock = Arc::new(ManualClock::new(0));
        let reg = registry(kv.clone(), clock.clone());
        reg.record("/api/images/old", ImageHints::default()).await;
        clock.advance(6 * DAY);
        reg.record("/api/images/new", ImageHints::default()).await;
        reg.persist().await.unwrap();

        clock.advance(2 * DAY);
        let fresh = registry(kv, clock);
        assert_eq!(fresh.load().await.unwrap(), 1);
        assert!(fresh.is_loaded("/api/images/new").await);
        assert!(!fresh.is_loaded("/api/images/old").await);
    }

    #[tokio::test]
    async fn corrupt_registry_is_ignored() {
        let kv = Arc::new(MemoryKv::default());
        kv.put(IMAGE_REGISTRY_KEY, "[{]");
        let reg = registry(kv, Arc::new(ManualClock::new(0)));

        assert_eq!(reg.load().await.unwrap(), 0);
        assert!(reg.is_empty().await);
    }
}
