use serde::{Deserialize, Serialize};

/// Auto-assigned key of a row in the offline upload queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PendingUploadId(i64);

impl PendingUploadId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for PendingUploadId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for PendingUploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
