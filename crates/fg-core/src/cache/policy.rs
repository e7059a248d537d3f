use regex::Regex;
use serde_json::Value;
use std::time::Duration;

use super::entry::TtlClass;
use crate::config::{CacheSection, ImagesSection};
use crate::http::strip_query;

/// Decides which TTL class a response gets and which endpoints bypass the
/// cache.
///
/// The storage-URL predicate here is the same one the image registry uses to
/// decide what to record, so both sides agree on what "an image" is.
#[derive(Debug, Clone)]
pub struct TtlPolicy {
    default_ttl: Duration,
    image_short_ttl: Duration,
    image_long_ttl: Duration,
    image_path_prefixes: Vec<String>,
    identity_patterns: Vec<Regex>,
    storage_url: Regex,
}

impl TtlPolicy {
    pub fn from_config(cache: &CacheSection, images: &ImagesSection) -> Result<Self, regex::Error> {
        let identity_patterns = cache
            .identity_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            default_ttl: Duration::from_secs(cache.default_ttl_secs),
            image_short_ttl: Duration::from_secs(cache.image_short_ttl_secs),
            image_long_ttl: Duration::from_secs(cache.image_long_ttl_secs),
            image_path_prefixes: images.path_prefixes.clone(),
            identity_patterns,
            storage_url: Regex::new(&images.storage_url_pattern)?,
        })
    }

    pub fn ttl_for(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Default => self.default_ttl,
            TtlClass::ImageShort => self.image_short_ttl,
            TtlClass::ImageLong => self.image_long_ttl,
        }
    }

    pub fn ttl_ms(&self, class: TtlClass) -> i64 {
        i64::try_from(self.ttl_for(class).as_millis()).unwrap_or(i64::MAX)
    }

    pub fn image_long_ttl(&self) -> Duration {
        self.image_long_ttl
    }

    pub fn is_image_path(&self, path: &str) -> bool {
        let path = strip_query(path);
        self.image_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn is_identity_path(&self, path: &str) -> bool {
        let path = strip_query(path);
        self.identity_patterns.iter().any(|re| re.is_match(path))
    }

    pub fn is_storage_url(&self, value: &str) -> bool {
        self.storage_url.is_match(value)
    }

    /// Every string anywhere in `payload` that looks like an object-storage URL.
    pub fn find_storage_urls(&self, payload: &Value) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_storage_urls(payload, &mut found);
        found
    }

    pub fn contains_storage_url(&self, payload: &Value) -> bool {
        match payload {
            Value::String(s) => self.is_storage_url(s),
            Value::Array(items) => items.iter().any(|v| self.contains_storage_url(v)),
            Value::Object(map) => map.values().any(|v| self.contains_storage_url(v)),
            _ => false,
        }
    }

    fn collect_storage_urls(&self, payload: &Value, found: &mut Vec<String>) {
        match payload {
            Value::String(s) if self.is_storage_url(s) => found.push(s.clone()),
            Value::Array(items) => items.iter().for_each(|v| self.collect_storage_urls(v, found)),
            Value::Object(map) => map.values().for_each(|v| self.collect_storage_urls(v, found)),
            _ => {}
        }
    }

    /// TTL class for a successful response. Empty or null payloads always get
    /// the short default class.
    pub fn classify(&self, path: &str, payload: &Value) -> TtlClass {
        if is_empty_payload(payload) {
            return TtlClass::Default;
        }
        if self.is_image_path(path) {
            TtlClass::ImageLong
        } else if self.contains_storage_url(payload) {
            TtlClass::ImageShort
        } else {
            TtlClass::Default
        }
    }
}

fn is_empty_payload(payload: &Value) -> bool {
    match payload {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
