use futures::FutureExt;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fg_core::cache::{resource_family, CacheKey};
use fg_core::config::ApiSection;
use fg_core::error::{GatewayError, TransportError};
use fg_core::http::{
    append_query_param, is_absolute_url, join_url, HttpBody, HttpMethod, HttpRequest,
    HttpResponse, HEADER_API_KEY, HEADER_CACHE_CONTROL, HEADER_CSRF_TOKEN, HEADER_NONCE,
    HEADER_SIGNATURE, HEADER_TIMESTAMP, LONG_LIVED_CACHE_CONTROL,
};
use fg_core::image::{image_cache_path, resolve_image_target, ImageHints};
use fg_core::ports::{
    ClockPort, CookieSourcePort, HttpTransportPort, KeyValueStorePort, NetworkStatusPort,
};
use fg_core::response::{GatewayResponse, ResponseSource};
use fg_core::signing::{canonical_body, RequestSigner, SignedRequest};

use super::classify::{classify_response, ResponseClass};
use super::inflight::{InflightRequests, SharedResponse};
use crate::cache_store::{CacheStore, SweepReport};
use crate::image_registry::ImageRegistry;
use crate::offline_queue::OfflineUploadQueue;

/// Static request settings, resolved from `[api]`.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub base_url: String,
    pub api_key: String,
    pub signer: RequestSigner,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
    pub upload_path: String,
    pub csrf_cookie: String,
}

impl GatewaySettings {
    pub fn from_config(api: &ApiSection) -> Self {
        Self {
            base_url: api.base_url.clone(),
            api_key: api.api_key.clone(),
            signer: RequestSigner::new(api.signing_secret.clone()),
            request_timeout: api.request_timeout(),
            upload_timeout: api.upload_timeout(),
            upload_path: api.upload_path.clone(),
            csrf_cookie: api.csrf_cookie.clone(),
        }
    }
}

/// Ports and services the gateway is built from.
#[derive(Clone)]
pub struct GatewayDeps {
    pub transport: Arc<dyn HttpTransportPort>,
    pub cookies: Arc<dyn CookieSourcePort>,
    pub clock: Arc<dyn ClockPort>,
    pub network: Arc<dyn NetworkStatusPort>,
    pub kv: Arc<dyn KeyValueStorePort>,
    pub cache: Arc<CacheStore>,
    pub registry: Arc<ImageRegistry>,
    pub uploads: Arc<OfflineUploadQueue>,
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Read and write the response cache (GET only).
    pub use_cache: bool,
    /// Firing this turns the call into a silent [`ResponseSource::Cancelled`].
    pub cancel: Option<CancellationToken>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cancel: None,
        }
    }
}

impl RequestOptions {
    pub fn uncached() -> Self {
        Self {
            use_cache: false,
            ..Self::default()
        }
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Clone)]
pub struct GatewayClient {
    pub(super) inner: Arc<GatewayInner>,
}

pub(super) struct GatewayInner {
    pub(super) settings: GatewaySettings,
    pub(super) deps: GatewayDeps,
    inflight: InflightRequests,
    pub(super) foreground: AtomicUsize,
}

/// One request after classification, ready to be signed and sent.
struct PreparedCall {
    method: HttpMethod,
    path: String,
    body: Option<Value>,
    key: CacheKey,
    cacheable: bool,
    is_image: bool,
    identity: bool,
}

/// Counts a caller-initiated request for as long as it is alive.
pub(crate) struct ForegroundGuard<'a>(&'a AtomicUsize);

impl<'a> ForegroundGuard<'a> {
    pub(super) fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ForegroundGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl GatewayClient {
    pub fn new(settings: GatewaySettings, deps: GatewayDeps) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                settings,
                deps,
                inflight: InflightRequests::default(),
                foreground: AtomicUsize::new(0),
            }),
        }
    }

    /// Hydrates the persisted cache tier and the image registry.
    pub async fn init(&self) -> Result<(), GatewayError> {
        self.inner.deps.cache.init().await.map_err(storage_error)?;
        let images = self.inner.deps.registry.load().await.map_err(storage_error)?;
        info!(images, "gateway initialized");
        Ok(())
    }

    /// Flushes batched persistent state.
    pub async fn dispose(&self) -> Result<(), GatewayError> {
        self.inner.deps.cache.dispose().await.map_err(storage_error)?;
        self.inner.deps.registry.dispose().await.map_err(storage_error)?;
        info!("gateway disposed");
        Ok(())
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.inner.deps.cache
    }

    pub fn registry(&self) -> &Arc<ImageRegistry> {
        &self.inner.deps.registry
    }

    pub fn uploads(&self) -> &Arc<OfflineUploadQueue> {
        &self.inner.deps.uploads
    }

    /// Caller-initiated requests currently running.
    pub fn foreground_in_flight(&self) -> usize {
        self.inner.foreground.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn foreground_guard(&self) -> ForegroundGuard<'_> {
        ForegroundGuard::enter(&self.inner.foreground)
    }

    pub async fn sweep(&self) -> Result<SweepReport, GatewayError> {
        self.inner.deps.cache.sweep().await.map_err(storage_error)
    }

    pub async fn get(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        self.request(HttpMethod::Get, path, None, options).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        self.request(HttpMethod::Post, path, Some(body), options).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: Value,
        options: RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        self.request(HttpMethod::Put, path, Some(body), options).await
    }

    pub async fn delete(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        self.request(HttpMethod::Delete, path, None, options).await
    }

    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<GatewayResponse, GatewayError> {
        let inner = &self.inner;
        let _foreground = ForegroundGuard::enter(&inner.foreground);
        let policy = inner.deps.cache.policy();

        let is_image = policy.is_image_path(path);
        if method == HttpMethod::Get && is_image {
            if let Some(response) = inner.registry_short_circuit(path).await {
                return Ok(response);
            }
        }

        let identity = policy.is_identity_path(path);
        let cacheable = method == HttpMethod::Get && options.use_cache && !identity;
        let key = if method == HttpMethod::Get && is_image {
            CacheKey::get(image_cache_path(path))
        } else {
            CacheKey::new(method, path, canonical_body(body.as_ref()))
        };

        if cacheable {
            if let Some(entry) = inner.deps.cache.lookup(&key).await {
                debug!(path, "cache hit");
                if entry.ttl_class.is_image() {
                    inner.record_images(path, &entry.payload, is_image).await;
                }
                return Ok(GatewayResponse::new(entry.payload, ResponseSource::Cache));
            }
        }

        let call = PreparedCall {
            method,
            path: path.to_string(),
            body,
            key,
            cacheable,
            is_image,
            identity,
        };

        if cacheable {
            let shared = inner.join_inflight(call);
            with_cancel(options.cancel.as_ref(), shared).await
        } else {
            with_cancel(options.cancel.as_ref(), inner.execute(call)).await
        }
    }

    /// Fetches an image, skipping the network when the registry already has it.
    ///
    /// Relative URLs and URLs under `base_url` are signed like any API call;
    /// third-party URLs are fetched unsigned.
    pub async fn fetch_image(&self, url: &str) -> Result<GatewayResponse, GatewayError> {
        let inner = &self.inner;
        let registry = &inner.deps.registry;
        let canonical = registry.canonicalize(url);
        if registry.is_loaded(&canonical).await {
            return Ok(GatewayResponse::new(
                json!({ "url": canonical }),
                ResponseSource::Registry,
            ));
        }

        let mut headers = vec![(
            HEADER_CACHE_CONTROL.to_string(),
            LONG_LIVED_CACHE_CONTROL.to_string(),
        )];
        if let Some(path) = inner.backend_path(url) {
            let signed = inner.settings.signer.build_signed_request(
                HttpMethod::Get,
                path,
                None,
                inner.deps.clock.as_ref(),
            );
            headers.extend(inner.signed_headers(&signed));
        }

        let timeout = inner.settings.request_timeout;
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: join_url(&inner.settings.base_url, url),
            headers,
            body: HttpBody::Empty,
            timeout: Some(timeout),
        };

        let response = match inner.send(request, timeout).await {
            Ok(response) => response,
            Err(TransportError::Aborted) => return Ok(GatewayResponse::cancelled()),
            Err(e) => return Err(e.into()),
        };

        if response.is_success() {
            registry.record(&canonical, ImageHints::default()).await;
            debug!(url = %canonical, bytes = response.body.len(), "image fetched");
            return Ok(GatewayResponse::new(
                json!({ "url": canonical, "bytes": response.body.len() }),
                ResponseSource::Network,
            ));
        }

        match classify_response(&response) {
            ResponseClass::RateLimited { retry_after } => {
                Err(GatewayError::RateLimited { retry_after })
            }
            ResponseClass::Failed(err) => Err(err),
            _ => Err(GatewayError::from_status(
                response.status,
                response.body_text(),
            )),
        }
    }
}

impl GatewayInner {
    fn join_inflight(self: &Arc<Self>, call: PreparedCall) -> SharedResponse {
        let key = call.key.clone();
        self.inflight.join_or_start(&key, |generation| {
            let inner = Arc::clone(self);
            let finish_key = key.clone();
            // Runs detached so a caller that gives up cannot leave the
            // shared call parked with a stale result in the map.
            let task = tokio::spawn(async move {
                let result = inner.execute(call).await;
                inner.inflight.finish(&finish_key, generation);
                result
            });
            task.map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(GatewayError::Transport(TransportError::Other(format!(
                        "request task failed: {e}"
                    ))))
                })
            })
            .boxed()
        })
    }

    async fn execute(&self, call: PreparedCall) -> Result<GatewayResponse, GatewayError> {
        let clock = self.deps.clock.as_ref();
        let send_path = if call.identity {
            append_query_param(&call.path, "_ts", &clock.now_ms().to_string())
        } else {
            call.path.clone()
        };

        let signed =
            self.settings
                .signer
                .build_signed_request(call.method, &send_path, call.body.as_ref(), clock);
        let mut headers = self.signed_headers(&signed);
        if call.method.is_mutating() {
            self.push_csrf_header(&mut headers);
        }
        if call.is_image {
            headers.push((
                HEADER_CACHE_CONTROL.to_string(),
                LONG_LIVED_CACHE_CONTROL.to_string(),
            ));
        }

        let body = if signed.body_digest_input.is_empty() {
            HttpBody::Empty
        } else {
            HttpBody::Json(signed.body_digest_input.clone())
        };
        let timeout = self.settings.request_timeout;
        let request = HttpRequest {
            method: call.method,
            url: join_url(&self.settings.base_url, &send_path),
            headers,
            body,
            timeout: Some(timeout),
        };

        let response = match self.send(request, timeout).await {
            Ok(response) => response,
            Err(TransportError::Aborted) => {
                debug!(path = %call.path, "request aborted");
                return Ok(GatewayResponse::cancelled());
            }
            Err(e) => {
                warn!(path = %call.path, error = %e, "request failed before a response");
                return Err(e.into());
            }
        };

        self.handle_response(&call, &response).await
    }

    async fn handle_response(
        &self,
        call: &PreparedCall,
        response: &HttpResponse,
    ) -> Result<GatewayResponse, GatewayError> {
        let policy = self.deps.cache.policy();
        match classify_response(response) {
            ResponseClass::Success(data) => {
                if call.cacheable {
                    let class = policy.classify(&call.path, &data);
                    self.deps
                        .cache
                        .store(call.key.clone(), data.clone(), class)
                        .await;
                }
                if call.is_image || policy.contains_storage_url(&data) {
                    self.record_images(&call.path, &data, call.is_image).await;
                }
                if call.method.is_mutating() {
                    self.purge_after_mutation(&call.path).await;
                }
                Ok(GatewayResponse::new(data, ResponseSource::Network))
            }
            ResponseClass::RateLimited { retry_after } => {
                if call.method == HttpMethod::Get {
                    if let Some(data) = self.stale_fallback(&call.key).await {
                        warn!(path = %call.path, "rate limited, serving cached copy");
                        return Ok(GatewayResponse::new(data, ResponseSource::StaleFallback));
                    }
                }
                warn!(path = %call.path, ?retry_after, "rate limited");
                Err(GatewayError::RateLimited { retry_after })
            }
            ResponseClass::Benign(code) => {
                debug!(path = %call.path, code = code.as_str(), "benign conflict treated as success");
                if call.method.is_mutating() {
                    self.purge_after_mutation(&call.path).await;
                }
                Ok(GatewayResponse::normalized(code))
            }
            ResponseClass::Failed(err) => {
                warn!(path = %call.path, status = response.status, error = %err, "request failed");
                Err(err)
            }
        }
    }

    /// Exact key at any age, else the newest entry for the same query-less path.
    async fn stale_fallback(&self, key: &CacheKey) -> Option<Value> {
        let cache = &self.deps.cache;
        if let Some(entry) = cache.lookup_stale(key).await {
            return Some(entry.payload);
        }
        cache
            .latest_with_prefix(key.path_without_query())
            .await
            .map(|entry| entry.payload)
    }

    async fn registry_short_circuit(&self, path: &str) -> Option<GatewayResponse> {
        let registry = &self.deps.registry;
        let target = resolve_image_target(path);
        if !registry.is_loaded(&target).await {
            return None;
        }

        registry.record(&target, ImageHints::default()).await;
        let key = CacheKey::get(image_cache_path(path));
        let data = match self.deps.cache.lookup_stale(&key).await {
            Some(entry) => entry.payload,
            None => json!({ "url": registry.canonicalize(&target) }),
        };
        debug!(path, "image already loaded, skipping network");
        Some(GatewayResponse::new(data, ResponseSource::Registry))
    }

    async fn record_images(&self, path: &str, payload: &Value, is_image_path: bool) {
        let registry = &self.deps.registry;
        if is_image_path {
            registry
                .record(&resolve_image_target(path), ImageHints::default())
                .await;
        }
        for url in self.deps.cache.policy().find_storage_urls(payload) {
            registry.record(&url, ImageHints::default()).await;
        }
    }

    async fn purge_after_mutation(&self, path: &str) {
        let family = resource_family(path);
        self.deps.cache.purge_family(&family).await;
    }

    pub(super) async fn send(
        &self,
        request: HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        match tokio::time::timeout(timeout, self.deps.transport.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        }
    }

    pub(super) fn signed_headers(&self, signed: &SignedRequest) -> Vec<(String, String)> {
        vec![
            (HEADER_API_KEY.to_string(), self.settings.api_key.clone()),
            (HEADER_TIMESTAMP.to_string(), signed.timestamp_ms.to_string()),
            (HEADER_NONCE.to_string(), signed.nonce.to_string()),
            (HEADER_SIGNATURE.to_string(), signed.signature.clone()),
        ]
    }

    pub(super) fn push_csrf_header(&self, headers: &mut Vec<(String, String)>) {
        if let Some(token) = self.deps.cookies.cookie(&self.settings.csrf_cookie) {
            headers.push((HEADER_CSRF_TOKEN.to_string(), token));
        }
    }

    /// Path to sign for `url` when it targets our own backend.
    fn backend_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        if !is_absolute_url(url) {
            return Some(url);
        }
        let base = self.settings.base_url.trim_end_matches('/');
        url.strip_prefix(base)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

pub(super) fn storage_error(err: anyhow::Error) -> GatewayError {
    GatewayError::Storage(format!("{err:#}"))
}

async fn with_cancel<F>(
    cancel: Option<&CancellationToken>,
    call: F,
) -> Result<GatewayResponse, GatewayError>
where
    F: Future<Output = Result<GatewayResponse, GatewayError>>,
{
    let Some(token) = cancel else {
        return call.await;
    };
    tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("request cancelled by caller");
            Ok(GatewayResponse::cancelled())
        }
        result = call => result,
    }
}
