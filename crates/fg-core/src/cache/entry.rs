use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::key::CacheKey;

/// Named cache lifetime assigned when an entry is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Minutes; profiles, counts, follow state.
    Default,
    /// Days; data responses that embed object-storage image URLs.
    ImageShort,
    /// Days; image-serving endpoints.
    ImageLong,
}

impl TtlClass {
    pub fn is_image(&self) -> bool {
        !matches!(self, TtlClass::Default)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Value,
    pub stored_at_ms: i64,
    pub ttl_class: TtlClass,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.stored_at_ms)
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        self.age_ms(now_ms) < ttl_ms
    }
}
