//! Two-tier response cache.
//!
//! The memory tier holds every cached response for the life of the process.
//! Image-class GET entries are mirrored into a persisted tier so image
//! responses survive restarts. On disk that tier is two JSON maps keyed by
//! cache path (canonical for image endpoints): `image-cache-metadata` holds
//! `{timestamp, url, size}` per entry and `image-cache-payloads` holds the
//! response bodies.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use fg_core::cache::{path_in_family, CacheEntry, CacheKey, TtlClass, TtlPolicy};
use fg_core::http::HttpMethod;
use fg_core::image::canonicalize_image_url;
use fg_core::ports::{ClockPort, KeyValueStorePort};

pub const CACHE_METADATA_KEY: &str = "image-cache-metadata";
pub const CACHE_PAYLOADS_KEY: &str = "image-cache-payloads";
pub const LAST_CLEANUP_KEY: &str = "cache-last-cleanup";

/// One row of `image-cache-metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCacheMeta {
    /// When the response was stored, in epoch millis.
    pub timestamp: i64,
    /// Canonical image URL the response points at.
    pub url: String,
    /// Serialized payload size in bytes.
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedPayload {
    ttl_class: TtlClass,
    payload: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub memory_removed: usize,
    pub persisted_removed: usize,
    /// Whether the persisted tier was due and got swept on this call.
    pub persisted_swept: bool,
}

pub struct CacheStore {
    policy: Arc<TtlPolicy>,
    kv: Arc<dyn KeyValueStorePort>,
    clock: Arc<dyn ClockPort>,
    memory: RwLock<HashMap<CacheKey, CacheEntry>>,
    persisted: Mutex<HashMap<CacheKey, CacheEntry>>,
    unflushed_writes: AtomicUsize,
    persist_every: usize,
    cleanup_interval_ms: i64,
}

impl CacheStore {
    pub fn new(
        policy: Arc<TtlPolicy>,
        kv: Arc<dyn KeyValueStorePort>,
        clock: Arc<dyn ClockPort>,
        persist_every: usize,
        cleanup_interval_ms: i64,
    ) -> Self {
        Self {
            policy,
            kv,
            clock,
            memory: RwLock::new(HashMap::new()),
            persisted: Mutex::new(HashMap::new()),
            unflushed_writes: AtomicUsize::new(0),
            persist_every: persist_every.max(1),
            cleanup_interval_ms,
        }
    }

    pub fn policy(&self) -> &Arc<TtlPolicy> {
        &self.policy
    }

    /// Hydrates the persisted tier. Corrupt documents are dropped with a
    /// warning; metadata rows without a payload are skipped.
    pub async fn init(&self) -> Result<()> {
        let Some(metadata) = self
            .read_map::<ImageCacheMeta>(CACHE_METADATA_KEY)
            .await?
        else {
            return Ok(());
        };
        let mut payloads = self
            .read_map::<PersistedPayload>(CACHE_PAYLOADS_KEY)
            .await?
            .unwrap_or_default();

        let mut persisted = self.persisted.lock().await;
        for (path, meta) in metadata {
            let Some(stored) = payloads.remove(&path) else {
                debug!(path, "cache metadata without payload, skipping");
                continue;
            };
            if !stored.ttl_class.is_image() {
                continue;
            }
            let key = CacheKey::get(path);
            persisted.insert(
                key.clone(),
                CacheEntry {
                    key,
                    payload: stored.payload,
                    stored_at_ms: meta.timestamp,
                    ttl_class: stored.ttl_class,
                },
            );
        }
        info!(entries = persisted.len(), "cache metadata hydrated");
        Ok(())
    }

    async fn read_map<T>(&self, key: &str) -> Result<Option<BTreeMap<String, T>>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let Some(raw) = self
            .kv
            .get(key)
            .await
            .with_context(|| format!("read {key} failed"))?
        else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(Some(map)),
            Err(e) => {
                warn!(key, error = %e, "discarding corrupt cache document");
                Ok(None)
            }
        }
    }

    /// Fresh entry for `key`, from memory or the persisted tier.
    ///
    /// A stale entry is a miss but stays in place for [`CacheStore::lookup_stale`].
    pub async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        let entry = self.lookup_stale(key).await?;
        if entry.is_fresh(now, self.policy.ttl_ms(entry.ttl_class)) {
            Some(entry)
        } else {
            debug!(path = %key.path, age_ms = entry.age_ms(now), "cache entry expired");
            None
        }
    }

    /// Entry for `key` regardless of age.
    pub async fn lookup_stale(&self, key: &CacheKey) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.read().await.get(key) {
            return Some(entry.clone());
        }

        let entry = self.persisted.lock().await.get(key).cloned()?;
        self.memory
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| entry.clone());
        Some(entry)
    }

    /// Most recently stored entry whose query-less path equals `prefix`, across
    /// both tiers.
    pub async fn latest_with_prefix(&self, prefix: &str) -> Option<CacheEntry> {
        let memory = self.memory.read().await;
        let persisted = self.persisted.lock().await;
        memory
            .values()
            .chain(persisted.values())
            .filter(|e| e.key.path_without_query() == prefix)
            .max_by_key(|e| e.stored_at_ms)
            .cloned()
    }

    pub async fn store(&self, key: CacheKey, payload: Value, ttl_class: TtlClass) {
        let entry = CacheEntry {
            key: key.clone(),
            payload,
            stored_at_ms: self.clock.now_ms(),
            ttl_class,
        };

        let persist = is_persistable(&key, ttl_class);
        if persist {
            self.persisted.lock().await.insert(key.clone(), entry.clone());
        }
        self.memory.write().await.insert(key, entry);

        if persist {
            let writes = self.unflushed_writes.fetch_add(1, Ordering::SeqCst) + 1;
            if writes >= self.persist_every {
                if let Err(e) = self.flush().await {
                    warn!(error = %e, "cache metadata flush failed");
                }
            }
        }
    }

    /// Removes every entry whose path satisfies `predicate`, in both tiers.
    pub async fn purge<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let removed_memory = {
            let mut memory = self.memory.write().await;
            let before = memory.len();
            memory.retain(|key, _| !predicate(&key.path));
            before - memory.len()
        };
        let removed_persisted = {
            let mut persisted = self.persisted.lock().await;
            let before = persisted.len();
            persisted.retain(|key, _| !predicate(&key.path));
            before - persisted.len()
        };

        if removed_persisted > 0 {
            if let Err(e) = self.flush().await {
                warn!(error = %e, "cache metadata flush after purge failed");
            }
        }
        removed_memory.max(removed_persisted)
    }

    /// Purges everything under `family` (segment-aware).
    pub async fn purge_family(&self, family: &str) -> usize {
        let removed = self.purge(|path| path_in_family(path, family)).await;
        if removed > 0 {
            debug!(family, removed, "cache family purged");
        }
        removed
    }

    /// Drops expired entries from memory and, at most once per cleanup
    /// interval, from the persisted tier.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now_ms();
        let mut report = SweepReport::default();

        {
            let mut memory = self.memory.write().await;
            let before = memory.len();
            memory.retain(|_, e| e.is_fresh(now, self.policy.ttl_ms(e.ttl_class)));
            report.memory_removed = before - memory.len();
        }

        let last_cleanup = self
            .kv
            .get(LAST_CLEANUP_KEY)
            .await
            .context("read cache cleanup marker failed")?
            .and_then(|raw| raw.parse::<i64>().ok());
        let due = last_cleanup.map_or(true, |last| now - last >= self.cleanup_interval_ms);

        if due {
            {
                let mut persisted = self.persisted.lock().await;
                let before = persisted.len();
                persisted.retain(|_, e| e.is_fresh(now, self.policy.ttl_ms(e.ttl_class)));
                report.persisted_removed = before - persisted.len();
            }
            self.flush().await?;
            self.kv
                .set(LAST_CLEANUP_KEY, &now.to_string())
                .await
                .context("write cache cleanup marker failed")?;
            report.persisted_swept = true;
        }

        debug!(?report, "cache sweep finished");
        Ok(report)
    }

    /// Writes the persisted tier to the key-value store. Payloads go first so
    /// every metadata row on disk has its body.
    pub async fn flush(&self) -> Result<()> {
        let (metadata, payloads) = {
            let persisted = self.persisted.lock().await;
            let mut metadata = BTreeMap::new();
            let mut payloads = BTreeMap::new();
            for entry in persisted.values() {
                metadata.insert(entry.key.path.clone(), self.describe(entry));
                payloads.insert(
                    entry.key.path.clone(),
                    PersistedPayload {
                        ttl_class: entry.ttl_class,
                        payload: entry.payload.clone(),
                    },
                );
            }
            (
                serde_json::to_string(&metadata).context("serialize cache metadata failed")?,
                serde_json::to_string(&payloads).context("serialize cache payloads failed")?,
            )
        };
        self.unflushed_writes.store(0, Ordering::SeqCst);
        self.kv
            .set(CACHE_PAYLOADS_KEY, &payloads)
            .await
            .context("write cache payloads failed")?;
        self.kv
            .set(CACHE_METADATA_KEY, &metadata)
            .await
            .context("write cache metadata failed")
    }

    fn describe(&self, entry: &CacheEntry) -> ImageCacheMeta {
        let url = self
            .policy
            .find_storage_urls(&entry.payload)
            .into_iter()
            .next()
            .or_else(|| {
                entry
                    .payload
                    .get("url")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| entry.key.path.clone());
        ImageCacheMeta {
            timestamp: entry.stored_at_ms,
            url: canonicalize_image_url(&url),
            size: entry.payload.to_string().len() as u64,
        }
    }

    /// Flushes pending image-class writes.
    pub async fn dispose(&self) -> Result<()> {
        if self.unflushed_writes.load(Ordering::SeqCst) > 0 {
            self.flush().await?;
        }
        Ok(())
    }

    /// Entries in the memory tier.
    pub async fn len(&self) -> usize {
        self.memory.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Only plain GETs go to disk; the path alone identifies them on reload.
fn is_persistable(key: &CacheKey, ttl_class: TtlClass) -> bool {
    ttl_class.is_image() && key.method == HttpMethod::Get && key.body.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{default_policy, ManualClock, MemoryKv};
    use serde_json::json;

    const MINUTE: i64 = 60_000;

    fn store_with(kv: Arc<MemoryKv>, clock: Arc<ManualClock>) -> CacheStore {
        CacheStore::new(default_policy(), kv, clock, 3, 24 * 60 * MINUTE)
    }

    #[tokio::test]
    async fn default_entry_hits_before_expiry_and_misses_after() {
        let clock = Arc::new(ManualClock::new(1_000));
        let cache = store_with(Arc::new(MemoryKv::default()), clock.clone());
        let key = CacheKey::get("/api/users/123/followers");

        cache.store(key.clone(), json!({"count": 3}), TtlClass::Default).await;
        clock.advance(4 * MINUTE);
        assert_eq!(cache.lookup(&key).await.unwrap().payload, json!({"count": 3}));

        clock.advance(2 * MINUTE);
        assert!(cache.lookup(&key).await.is_none());
        assert!(cache.lookup_stale(&key).await.is_some());
    }

    #[tokio::test]
    async fn purge_removes_all_and_only_matching_entries() {
        let cache = store_with(Arc::new(MemoryKv::default()), Arc::new(ManualClock::new(0)));
        for path in [
            "/api/users/123",
            "/api/users/123/followers",
            "/api/users/123/books?page=2",
            "/api/users/1234",
            "/api/articles",
        ] {
            cache.store(CacheKey::get(path), json!(path), TtlClass::Default).await;
        }

        let removed = cache.purge_family("/api/users/123").await;

        assert_eq!(removed, 3);
        assert!(cache.lookup(&CacheKey::get("/api/users/1234")).await.is_some());
        assert!(cache.lookup(&CacheKey::get("/api/articles")).await.is_some());
        assert!(cache.lookup(&CacheKey::get("/api/users/123")).await.is_none());
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn image_entries_flush_every_n_writes_and_survive_restart() {
        let kv = Arc::new(MemoryKv::default());
        let clock = Arc::new(ManualClock::new(0));
        let cache = store_with(kv.clone(), clock.clone());

        for i in 0..2 {
            let key = CacheKey::get(format!("/api/images/{i}"));
            cache.store(key, json!({"i": i}), TtlClass::ImageLong).await;
        }
        cache.store(CacheKey::get("/api/articles"), json!([1]), TtlClass::Default).await;
        assert!(kv.raw(CACHE_METADATA_KEY).is_none());

        cache.store(CacheKey::get("/api/images/2"), json!({"i": 2}), TtlClass::ImageLong).await;
        assert!(kv.raw(CACHE_METADATA_KEY).is_some());

        let restarted = store_with(kv, clock);
        restarted.init().await.unwrap();
        let hit = restarted.lookup(&CacheKey::get("/api/images/1")).await.unwrap();
        assert_eq!(hit.payload, json!({"i": 1}));
        assert!(restarted.lookup(&CacheKey::get("/api/articles")).await.is_none());
    }

    #[tokio::test]
    async fn corrupt_metadata_is_ignored() {
        let kv = Arc::new(MemoryKv::default());
        kv.put(CACHE_METADATA_KEY, "{{{");
        let cache = store_with(kv, Arc::new(ManualClock::new(0)));

        cache.init().await.unwrap();
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn latest_with_prefix_picks_newest_sibling() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = store_with(Arc::new(MemoryKv::default()), clock.clone());

        cache.store(CacheKey::get("/api/articles?page=1"), json!(1), TtlClass::Default).await;
        clock.advance(10);
        cache.store(CacheKey::get("/api/articles?page=2"), json!(2), TtlClass::Default).await;
        cache.store(CacheKey::get("/api/articles/9"), json!(9), TtlClass::Default).await;

        let latest = cache.latest_with_prefix("/api/articles").await.unwrap();
        assert_eq!(latest.payload, json!(2));
        assert!(cache.latest_with_prefix("/api/books").await.is_none());
    }

    #[tokio::test]
    async fn sweep_prunes_persisted_tier_at_most_once_per_interval() {
        let kv = Arc::new(MemoryKv::default());
        let clock = Arc::new(ManualClock::new(0));
        let cache = store_with(kv.clone(), clock.clone());
        let image_ttl = cache.policy().ttl_ms(TtlClass::ImageShort);

        cache.store(CacheKey::get("/api/articles"), json!("a"), TtlClass::ImageShort).await;
        cache.store(CacheKey::get("/api/counts"), json!(1), TtlClass::Default).await;

        let first = cache.sweep().await.unwrap();
        assert!(first.persisted_swept);
        assert_eq!(first.memory_removed, 0);

        clock.advance(image_ttl + 1);
        let second = cache.sweep().await.unwrap();
        assert_eq!(second.memory_removed, 2);
        assert!(second.persisted_swept);
        assert_eq!(second.persisted_removed, 1);
        assert_eq!(kv.raw(LAST_CLEANUP_KEY).as_deref(), Some(&*clock.now().to_string()));

        clock.advance(MINUTE);
        let third = cache.sweep().await.unwrap();
        assert!(!third.persisted_swept);
    }

    #[tokio::test]
    async fn dispose_flushes_pending_image_writes() {
        let kv = Arc::new(MemoryKv::default());
        let cache = store_with(kv.clone(), Arc::new(ManualClock::new(0)));

        let key = CacheKey::new(HttpMethod::Get, "/api/covers/7", "");
        cache.store(key, json!({"url": "x"}), TtlClass::ImageLong).await;
        assert!(kv.raw(CACHE_METADATA_KEY).is_none());

        cache.dispose().await.unwrap();
        assert!(kv.raw(CACHE_METADATA_KEY).unwrap().contains("/api/covers/7"));
    }

    #[tokio::test]
    async fn metadata_maps_cache_path_to_timestamp_url_and_size() {
        let kv = Arc::new(MemoryKv::default());
        let cache = store_with(kv.clone(), Arc::new(ManualClock::new(42)));
        let payload = json!({"url": "https://cdn.folio.dev/7.jpg?t=3"});

        cache
            .store(CacheKey::get("/api/images/7"), payload.clone(), TtlClass::ImageLong)
            .await;
        cache
            .store(
                CacheKey::new(HttpMethod::Post, "/api/images/search", r#"{"q":"x"}"#),
                json!({"url": "https://cdn.folio.dev/8.jpg"}),
                TtlClass::ImageShort,
            )
            .await;
        cache.flush().await.unwrap();

        let metadata: Value = serde_json::from_str(&kv.raw(CACHE_METADATA_KEY).unwrap()).unwrap();
        assert_eq!(
            metadata,
            json!({
                "/api/images/7": {
                    "timestamp": 42,
                    "url": "https://cdn.folio.dev/7.jpg",
                    "size": payload.to_string().len(),
                }
            })
        );
        let payloads = kv.raw(CACHE_PAYLOADS_KEY).unwrap();
        assert!(payloads.contains("cdn.folio.dev/7.jpg?t=3"));
    }

    #[tokio::test]
    async fn metadata_row_without_payload_is_skipped() {
        let kv = Arc::new(MemoryKv::default());
        kv.put(
            CACHE_METADATA_KEY,
            r#"{"/api/images/1":{"timestamp":0,"url":"/api/images/1","size":2}}"#,
        );
        let cache = store_with(kv, Arc::new(ManualClock::new(0)));

        cache.init().await.unwrap();
        assert!(cache.lookup_stale(&CacheKey::get("/api/images/1")).await.is_none());
    }
}
