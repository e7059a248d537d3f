use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Sends one HTTP request. Any status code is a successful send; only
/// failures below HTTP are errors.
#[async_trait]
pub trait HttpTransportPort: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
