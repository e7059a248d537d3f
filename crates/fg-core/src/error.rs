//! Error taxonomy of the gateway.

use std::time::Duration;
use thiserror::Error;

use crate::ids::PendingUploadId;

/// Failure below HTTP: nothing usable came back from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The caller withdrew the request; not a failure.
    #[error("request aborted")]
    Aborted,

    #[error("transport failed: {0}")]
    Other(String),
}

/// Errors surfaced by gateway calls.
///
/// `Clone` so coalesced callers waiting on the same in-flight request all
/// receive the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("not authorized ({status}): {body}")]
    Auth { status: u16, body: String },

    #[error("request rejected ({status}): {body}")]
    Client { status: u16, body: String },

    #[error("server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("response decode failed: {0}")]
    Decode(String),

    #[error("local storage failed: {0}")]
    Storage(String),
}

impl GatewayError {
    /// HTTP status for errors that carry one.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Auth { status, .. }
            | GatewayError::Client { status, .. }
            | GatewayError::Server { status, .. } => Some(*status),
            GatewayError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Maps a non-success, non-429 status to its typed variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => GatewayError::Auth { status, body },
            500..=599 => GatewayError::Server { status, body },
            _ => GatewayError::Client { status, body },
        }
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("pending upload not found: {0}")]
    NotFound(PendingUploadId),

    #[error("upload queue storage error: {0}")]
    Storage(String),
}

impl From<QueueError> for GatewayError {
    fn from(err: QueueError) -> Self {
        GatewayError::Storage(err.to_string())
    }
}

/// Structured 4xx codes whose outcome is identical to success from the
/// caller's point of view (idempotent conflicts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BenignCode {
    AlreadyFollowing,
    NotFollowing,
    AlreadyLiked,
    NotLiked,
    AlreadyBookmarked,
    NotBookmarked,
    AlreadyExists,
    AlreadyDeleted,
}

impl BenignCode {
    pub fn from_code(code: &str) -> Option<Self> {
        let code = match code {
            "ALREADY_FOLLOWING" => BenignCode::AlreadyFollowing,
            "NOT_FOLLOWING" => BenignCode::NotFollowing,
            "ALREADY_LIKED" => BenignCode::AlreadyLiked,
            "NOT_LIKED" => BenignCode::NotLiked,
            "ALREADY_BOOKMARKED" => BenignCode::AlreadyBookmarked,
            "NOT_BOOKMARKED" => BenignCode::NotBookmarked,
            "ALREADY_EXISTS" => BenignCode::AlreadyExists,
            "ALREADY_DELETED" => BenignCode::AlreadyDeleted,
            _ => return None,
        };
        Some(code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BenignCode::AlreadyFollowing => "ALREADY_FOLLOWING",
            BenignCode::NotFollowing => "NOT_FOLLOWING",
            BenignCode::AlreadyLiked => "ALREADY_LIKED",
            BenignCode::NotLiked => "NOT_LIKED",
            BenignCode::AlreadyBookmarked => "ALREADY_BOOKMARKED",
            BenignCode::NotBookmarked => "NOT_BOOKMARKED",
            BenignCode::AlreadyExists => "ALREADY_EXISTS",
            BenignCode::AlreadyDeleted => "ALREADY_DELETED",
        }
    }
}
