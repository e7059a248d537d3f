//! Hand-written port fakes shared by the unit tests of this crate.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use fg_core::config::{CacheSection, ImagesSection};
use fg_core::error::{QueueError, TransportError};
use fg_core::http::{HttpRequest, HttpResponse};
use fg_core::ids::PendingUploadId;
use fg_core::ports::{
    BackgroundSyncPort, ClockPort, CookieSourcePort, HttpTransportPort, KeyValueStorePort,
    NetworkStatusPort, PendingUploadQueuePort,
};
use fg_core::upload::{NewPendingUpload, PendingUpload};
use fg_core::TtlPolicy;

pub fn default_policy() -> Arc<TtlPolicy> {
    Arc::new(TtlPolicy::from_config(&CacheSection::default(), &ImagesSection::default()).unwrap())
}

pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl ClockPort for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now()
    }
}

#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl KeyValueStorePort for MemoryKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.put(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> anyhow::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Replays queued responses in order and records every request it saw.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn push(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn push_json(&self, status: u16, body: &str) {
        self.push(Ok(HttpResponse::new(status, body)));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransportPort for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted response".into())))
    }
}

#[derive(Default)]
pub struct FixedCookies(pub HashMap<String, String>);

impl CookieSourcePort for FixedCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

pub struct Online(pub AtomicBool);

impl Online {
    pub fn new(online: bool) -> Self {
        Self(AtomicBool::new(online))
    }
}

impl NetworkStatusPort for Online {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Offline queue store kept in a vector.
#[derive(Default)]
pub struct MemoryQueue {
    rows: Mutex<Vec<PendingUpload>>,
    next_id: AtomicI64,
}

impl MemoryQueue {
    pub fn rows(&self) -> Vec<PendingUpload> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl PendingUploadQueuePort for MemoryQueue {
    async fn enqueue(&self, upload: NewPendingUpload) -> Result<PendingUploadId, QueueError> {
        let id = PendingUploadId::new(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.rows.lock().unwrap().push(PendingUpload {
            id,
            payload: upload.payload,
            file_name: upload.file_name,
            mime_type: upload.mime_type,
            folder: upload.folder,
            headers_snapshot: upload.headers_snapshot,
            created_at_ms: upload.created_at_ms,
            attempt_count: 0,
        });
        Ok(id)
    }

    async fn list_pending(&self) -> Result<Vec<PendingUpload>, QueueError> {
        Ok(self.rows())
    }

    async fn remove(&self, id: PendingUploadId) -> Result<bool, QueueError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }

    async fn record_attempt(&self, id: PendingUploadId) -> Result<(), QueueError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(QueueError::NotFound(id))?;
        row.attempt_count += 1;
        Ok(())
    }
}

pub struct NoopSync;

#[async_trait]
impl BackgroundSyncPort for NoopSync {
    async fn register(&self, _tag: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
