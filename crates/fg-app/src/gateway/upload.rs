use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use fg_core::error::{GatewayError, TransportError};
use fg_core::http::{
    join_url, HttpBody, HttpMethod, HttpRequest, MultipartPart, HEADER_API_KEY,
    HEADER_CSRF_TOKEN,
};
use fg_core::image::ImageHints;
use fg_core::upload::{NewPendingUpload, UploadFile, UploadOutcome};

use super::classify::{classify_response, ResponseClass};
use super::client::{ForegroundGuard, GatewayClient, GatewayInner};

impl GatewayClient {
    /// Uploads an image file into `folder`.
    ///
    /// A file already uploaded (same name, size and modification time) is
    /// answered from the local URL cache. Offline, or with the backend
    /// unreachable, the file goes to the offline queue and a provisional
    /// `pending-upload://` URL comes back at once.
    pub async fn upload_image(
        &self,
        file: UploadFile,
        folder: &str,
    ) -> Result<UploadOutcome, GatewayError> {
        let inner = &self.inner;
        let _foreground = ForegroundGuard::enter(&inner.foreground);
        let fingerprint_key = file.fingerprint().storage_key();

        match inner.deps.kv.get(&fingerprint_key).await {
            Ok(Some(url)) => {
                debug!(file = %file.file_name, %url, "upload answered from url cache");
                return Ok(UploadOutcome::cached(url));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "upload url cache unreadable"),
        }

        if !inner.deps.network.is_online() {
            return inner.defer_upload(file, folder).await;
        }

        match inner.send_upload(&file, folder, &BTreeMap::new()).await {
            Ok(url) => {
                if let Err(e) = inner.deps.kv.set(&fingerprint_key, &url).await {
                    warn!(error = %e, "caching uploaded url failed");
                }
                inner.deps.registry.record(&url, ImageHints::default()).await;
                info!(file = %file.file_name, %url, "image uploaded");
                Ok(UploadOutcome::uploaded(url))
            }
            Err(GatewayError::Transport(TransportError::Unreachable(reason))) => {
                warn!(%reason, "backend unreachable, deferring upload");
                inner.defer_upload(file, folder).await
            }
            Err(GatewayError::Transport(TransportError::Aborted)) => {
                debug!(file = %file.file_name, "upload aborted");
                Ok(UploadOutcome::cancelled())
            }
            Err(e) => Err(e),
        }
    }
}

impl GatewayInner {
    pub(super) async fn defer_upload(
        &self,
        file: UploadFile,
        folder: &str,
    ) -> Result<UploadOutcome, GatewayError> {
        let mut headers_snapshot = BTreeMap::new();
        headers_snapshot.insert(HEADER_API_KEY.to_string(), self.settings.api_key.clone());
        if let Some(token) = self.deps.cookies.cookie(&self.settings.csrf_cookie) {
            headers_snapshot.insert(HEADER_CSRF_TOKEN.to_string(), token);
        }

        let id = self
            .deps
            .uploads
            .enqueue(NewPendingUpload {
                payload: file.bytes,
                file_name: file.file_name,
                mime_type: file.mime_type,
                folder: folder.to_string(),
                headers_snapshot,
                created_at_ms: self.deps.clock.now_ms(),
            })
            .await?;
        self.deps.uploads.register_background_sync().await;

        Ok(UploadOutcome::deferred(id))
    }

    /// Sends one multipart upload and returns the stored URL.
    ///
    /// Signed with an empty body; `carried` headers from an earlier attempt
    /// are added unless freshly computed ones replace them.
    pub(super) async fn send_upload(
        &self,
        file: &UploadFile,
        folder: &str,
        carried: &BTreeMap<String, String>,
    ) -> Result<String, GatewayError> {
        let path = &self.settings.upload_path;
        let signed = self.settings.signer.build_signed_request(
            HttpMethod::Post,
            path,
            None,
            self.deps.clock.as_ref(),
        );
        let mut headers = self.signed_headers(&signed);
        self.push_csrf_header(&mut headers);
        for (name, value) in carried {
            if !headers.iter().any(|(h, _)| h.eq_ignore_ascii_case(name)) {
                headers.push((name.clone(), value.clone()));
            }
        }

        let timeout = self.settings.upload_timeout;
        let request = HttpRequest {
            method: HttpMethod::Post,
            url: join_url(&self.settings.base_url, path),
            headers,
            body: HttpBody::Multipart(vec![
                MultipartPart::File {
                    name: "image".to_string(),
                    file_name: file.file_name.clone(),
                    mime_type: file.mime_type.clone(),
                    bytes: file.bytes.clone(),
                },
                MultipartPart::Text {
                    name: "folder".to_string(),
                    value: folder.to_string(),
                },
            ]),
            timeout: Some(timeout),
        };

        let response = self.send(request, timeout).await?;
        match classify_response(&response) {
            ResponseClass::Success(data) => extract_uploaded_url(&data).ok_or_else(|| {
                GatewayError::Decode("upload response carries no url".to_string())
            }),
            ResponseClass::RateLimited { retry_after } => {
                Err(GatewayError::RateLimited { retry_after })
            }
            ResponseClass::Benign(_) => Err(GatewayError::from_status(
                response.status,
                response.body_text(),
            )),
            ResponseClass::Failed(err) => Err(err),
        }
    }
}

/// `url`, `imageUrl` or `data.url`, whichever the backend filled in.
fn extract_uploaded_url(data: &Value) -> Option<String> {
    data.get("url")
        .or_else(|| data.get("imageUrl"))
        .or_else(|| data.get("data").and_then(|d| d.get("url")))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}
