//! Shared harness for gateway integration tests: real infrastructure adapters
//! (in-memory KV, SQLite `:memory:` queue) around a scripted transport.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fg_app::{
    CacheStore, GatewayClient, GatewayDeps, GatewaySettings, ImageRegistry, OfflineUploadQueue,
};
use fg_core::config::GatewayConfig;
use fg_core::error::TransportError;
use fg_core::http::{HttpRequest, HttpResponse};
use fg_core::ports::{ClockPort, CookieSourcePort, HttpTransportPort};
use fg_core::TtlPolicy;
use fg_infra::db::executor::DieselSqliteExecutor;
use fg_infra::db::pool::init_db_pool;
use fg_infra::{
    DieselPendingUploadQueue, InMemoryKeyValueStore, NetworkStatusFlag, NotifyBackgroundSync,
};

pub const NOW: i64 = 1_700_000_000_000;

pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct NoCookies;

impl CookieSourcePort for NoCookies {
    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Answers from a queue of scripted responses, optionally after a delay.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedTransport {
    pub fn respond(&self, status: u16, body: &str) {
        self.push(Ok(HttpResponse::new(status, body)));
    }

    pub fn push(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransportPort for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(TransportError::Unreachable("connection refused".into())))
    }
}

pub struct TestGateway {
    pub client: GatewayClient,
    pub transport: Arc<ScriptedTransport>,
    pub clock: Arc<ManualClock>,
    pub network: Arc<NetworkStatusFlag>,
    pub kv: Arc<InMemoryKeyValueStore>,
    pub sync: Arc<NotifyBackgroundSync>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self::with_kv(Arc::new(InMemoryKeyValueStore::new()))
    }

    /// Builds a gateway over an existing key-value store, as a restarted
    /// process would.
    pub fn with_kv(kv: Arc<InMemoryKeyValueStore>) -> Self {
        let mut config = GatewayConfig::default();
        config.api.base_url = "https://api.folio.dev".to_string();
        config.api.api_key = "key-1".to_string();
        config.api.signing_secret = "secret".to_string();

        let transport = Arc::new(ScriptedTransport::default());
        let clock = Arc::new(ManualClock(AtomicI64::new(NOW)));
        let network = Arc::new(NetworkStatusFlag::new(true));
        let sync = Arc::new(NotifyBackgroundSync::new());

        let policy = Arc::new(TtlPolicy::from_config(&config.cache, &config.images).unwrap());
        let long_ttl_ms = policy.image_long_ttl().as_millis() as i64;
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

        let pool = init_db_pool(":memory:").unwrap();
        let store = Arc::new(DieselPendingUploadQueue::new(DieselSqliteExecutor::new(pool)));
        let uploads = Arc::new(OfflineUploadQueue::new(store, sync.clone()));

        let client = GatewayClient::new(
            GatewaySettings::from_config(&config.api),
            GatewayDeps {
                transport: transport.clone(),
                cookies: Arc::new(NoCookies),
                clock: clock.clone(),
                network: network.clone(),
                kv: kv.clone(),
                cache,
                registry,
                uploads,
            },
        );

        Self {
            client,
            transport,
            clock,
            network,
            kv,
            sync,
        }
    }
}
