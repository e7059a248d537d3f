use serde_json::{json, Value};

use crate::error::BenignCode;

/// Where a successful gateway result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// Answered by the image registry without touching the network.
    Registry,
    /// Served from cache after the backend rate limited the live request.
    StaleFallback,
    /// A benign 4xx folded into a success shape.
    Normalized(BenignCode),
    /// The caller aborted; `data` is null.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayResponse {
    pub data: Value,
    pub source: ResponseSource,
}

impl GatewayResponse {
    pub fn new(data: Value, source: ResponseSource) -> Self {
        Self { data, source }
    }

    pub fn cancelled() -> Self {
        Self::new(Value::Null, ResponseSource::Cancelled)
    }

    pub fn normalized(code: BenignCode) -> Self {
        Self::new(
            json!({ "success": true, "code": code.as_str() }),
            ResponseSource::Normalized(code),
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.source == ResponseSource::Cancelled
    }
}
