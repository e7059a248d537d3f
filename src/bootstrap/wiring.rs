//! # Dependency injection
//!
//! The only place that knows every concrete adapter. It builds them from the
//! resolved config and hands them to the services as ports. No decisions are
//! made here beyond "file-backed or in-memory".

use std::path::Path;
use std::sync::Arc;

use fg_app::{CacheStore, GatewayClient, GatewayDeps, GatewaySettings, ImageRegistry, OfflineUploadQueue};
use fg_core::config::GatewayConfig;
use fg_core::ports::KeyValueStorePort;
use fg_core::TtlPolicy;
use fg_infra::db::executor::DieselSqliteExecutor;
use fg_infra::db::pool::{init_db_pool, DbPool};
use fg_infra::{
    DieselPendingUploadQueue, FileKeyValueStore, InMemoryKeyValueStore, NetworkStatusFlag,
    NotifyBackgroundSync, ReqwestTransport, SystemClock,
};

use super::runtime::GatewayRuntime;

pub type WiringResult<T> = Result<T, WiringError>;

/// Infrastructure that could not be brought up.
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    #[error("Key-value store initialization failed: {0}")]
    KeyValueInit(String),

    #[error("HTTP client initialization failed: {0}")]
    HttpInit(String),

    #[error("Invalid cache policy: {0}")]
    Policy(String),
}

/// An empty path keeps the queue in an in-memory database.
fn create_db_pool(db_path: &Path) -> WiringResult<DbPool> {
    if db_path.as_os_str().is_empty() {
        return init_db_pool(":memory:")
            .map_err(|e| WiringError::DatabaseInit(format!("{e:#}")));
    }

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            WiringError::DatabaseInit(format!("Failed to create DB directory: {}", e))
        })?;
    }

    let db_url = db_path
        .to_str()
        .ok_or_else(|| WiringError::DatabaseInit("Invalid database path".to_string()))?;

    init_db_pool(db_url)
        .map_err(|e| WiringError::DatabaseInit(format!("Failed to initialize DB: {e:#}")))
}

async fn create_kv_store(kv_path: &Path) -> WiringResult<Arc<dyn KeyValueStorePort>> {
    if kv_path.as_os_str().is_empty() {
        tracing::warn!("no kv path configured, cache metadata will not survive restarts");
        return Ok(Arc::new(InMemoryKeyValueStore::new()));
    }
    let store = FileKeyValueStore::open(kv_path)
        .await
        .map_err(|e| WiringError::KeyValueInit(format!("{e:#}")))?;
    Ok(Arc::new(store))
}

/// Builds every adapter and service. Services are constructed but not yet
/// initialised; call [`GatewayRuntime::start`] for that.
pub async fn wire_dependencies(config: &GatewayConfig) -> WiringResult<GatewayRuntime> {
    let policy = TtlPolicy::from_config(&config.cache, &config.images)
        .map_err(|e| WiringError::Policy(e.to_string()))?;
    let policy = Arc::new(policy);
    let long_ttl_ms = policy.image_long_ttl().as_millis() as i64;

    let kv = create_kv_store(&config.storage.kv_path).await?;
    let pool = create_db_pool(&config.storage.database_path)?;
    let transport = Arc::new(
        ReqwestTransport::new(&config.api.base_url)
            .map_err(|e| WiringError::HttpInit(format!("{e:#}")))?,
    );

    let clock = Arc::new(SystemClock);
    let network = Arc::new(NetworkStatusFlag::default());
    let sync = Arc::new(NotifyBackgroundSync::new());

    let cache = Arc::new(CacheStore::new(
        policy,
        kv.clone(),
        clock.clone(),
        config.cache.persist_every,
        config.cache.cleanup_interval_secs as i64 * 1000,
    ));
    let registry = Arc::new(ImageRegistry::new(
        kv.clone(),
        clock.clone(),
        config.images.registry_persist_every,
        long_ttl_ms,
    ));
    let queue_store = Arc::new(DieselPendingUploadQueue::new(DieselSqliteExecutor::new(pool)));
    let uploads = Arc::new(OfflineUploadQueue::new(queue_store, sync.clone()));

    let client = GatewayClient::new(
        GatewaySettings::from_config(&config.api),
        GatewayDeps {
            transport: transport.clone(),
            cookies: transport.clone(),
            clock,
            network: network.clone(),
            kv,
            cache,
            registry,
            uploads,
        },
    );

    tracing::debug!(base_url = %config.api.base_url, "gateway dependencies wired");

    Ok(GatewayRuntime::new(
        config.clone(),
        client,
        transport,
        network,
        sync,
    ))
}
