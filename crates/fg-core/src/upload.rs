use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::PendingUploadId;

/// A file handed to the upload path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub last_modified_ms: i64,
}

impl UploadFile {
    pub fn fingerprint(&self) -> UploadFingerprint {
        UploadFingerprint {
            file_name: self.file_name.clone(),
            size_bytes: self.bytes.len() as u64,
            last_modified_ms: self.last_modified_ms,
        }
    }
}

/// Content identity of a local file, good enough to skip re-uploads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadFingerprint {
    pub file_name: String,
    pub size_bytes: u64,
    pub last_modified_ms: i64,
}

impl UploadFingerprint {
    pub fn storage_key(&self) -> String {
        format!(
            "upload-url:{}:{}:{}",
            self.file_name, self.size_bytes, self.last_modified_ms
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub url: String,
    /// The payload sits in the offline queue; `url` is provisional.
    pub pending: bool,
    pub from_cache: bool,
    pub pending_id: Option<PendingUploadId>,
    /// The request was aborted before an answer; `url` is empty.
    pub cancelled: bool,
}

impl UploadOutcome {
    pub fn uploaded(url: String) -> Self {
        Self {
            url,
            pending: false,
            from_cache: false,
            pending_id: None,
            cancelled: false,
        }
    }

    pub fn cached(url: String) -> Self {
        Self {
            url,
            pending: false,
            from_cache: true,
            pending_id: None,
            cancelled: false,
        }
    }

    pub fn deferred(id: PendingUploadId) -> Self {
        Self {
            url: provisional_upload_url(id),
            pending: true,
            from_cache: false,
            pending_id: Some(id),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            url: String::new(),
            pending: false,
            from_cache: false,
            pending_id: None,
            cancelled: true,
        }
    }
}

pub fn provisional_upload_url(id: PendingUploadId) -> String {
    format!("pending-upload://{id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPendingUpload {
    pub payload: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub folder: String,
    pub headers_snapshot: BTreeMap<String, String>,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpload {
    pub id: PendingUploadId,
    pub payload: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    pub folder: String,
    pub headers_snapshot: BTreeMap<String, String>,
    pub created_at_ms: i64,
    pub attempt_count: u32,
}

impl PendingUpload {
    pub fn to_upload_file(&self) -> UploadFile {
        UploadFile {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            bytes: self.payload.clone(),
            last_modified_ms: self.created_at_ms,
        }
    }
}
