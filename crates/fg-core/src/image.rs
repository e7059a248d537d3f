//! Image identity.
//!
//! [`canonicalize_image_url`] is the single definition of "same image" for the
//! whole gateway: the registry keys entries by it and the cache records image
//! payloads through it.

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::http::strip_query;

/// Query parameters that only exist to defeat caches.
pub const CACHE_BUSTING_PARAMS: &[&str] = &[
    "t",
    "ts",
    "_ts",
    "timestamp",
    "cache",
    "cb",
    "cachebust",
    "cache_bust",
    "nonce",
    "v",
    "_",
    "rand",
    "r",
];

/// Query parameters that change the rendered image and must be kept.
pub const SIZING_PARAMS: &[&str] = &["w", "width", "h", "height", "q", "quality", "fit"];

/// Strips everything but sizing parameters from `url`, sorts what is left and
/// drops the fragment. Idempotent.
pub fn canonicalize_image_url(url: &str) -> String {
    let url = url.trim();
    let without_fragment = url.split('#').next().unwrap_or(url);
    let base = strip_query(without_fragment);
    let Some((_, query)) = without_fragment.split_once('?') else {
        return base.to_string();
    };

    let mut kept: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| is_sizing_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        return base.to_string();
    }
    kept.sort();

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(kept)
        .finish();
    format!("{base}?{query}")
}

fn is_sizing_param(name: &str) -> bool {
    SIZING_PARAMS.contains(&name) && !CACHE_BUSTING_PARAMS.contains(&name)
}

/// Target image of an image-endpoint request: the decoded `url` or `src`
/// query parameter when present, otherwise the path itself.
pub fn resolve_image_target(path: &str) -> String {
    if let Some((_, query)) = path.split_once('?') {
        let target = form_urlencoded::parse(query.as_bytes())
            .find(|(name, _)| name == "url" || name == "src")
            .map(|(_, value)| value.into_owned());
        if let Some(target) = target.filter(|t| !t.is_empty()) {
            return target;
        }
    }
    path.to_string()
}

/// Cache path for an image-endpoint GET. Requests for the same image share
/// one entry no matter which cache-busting parameters they carry. A `url` or
/// `src` target is kept, canonicalized, since it names the image.
pub fn image_cache_path(path: &str) -> String {
    let target = resolve_image_target(path);
    if target == path {
        return canonicalize_image_url(path);
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("url", &canonicalize_image_url(&target))
        .finish();
    format!("{}?{query}", strip_query(path))
}

/// Optional facts recorded alongside an image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageHints {
    pub size: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistryEntry {
    pub canonical_url: String,
    pub first_seen_at_ms: i64,
    pub last_seen_at_ms: i64,
    pub load_count: u64,
    pub last_requested_size: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub loaded: bool,
}

impl ImageRegistryEntry {
    pub fn first_load(canonical_url: String, now_ms: i64, hints: ImageHints) -> Self {
        Self {
            canonical_url,
            first_seen_at_ms: now_ms,
            last_seen_at_ms: now_ms,
            load_count: 1,
            last_requested_size: hints.size,
            width: hints.width,
            height: hints.height,
            loaded: true,
        }
    }

    /// Another reference to an already-known image.
    pub fn touch(&mut self, now_ms: i64, hints: ImageHints) {
        self.load_count = self.load_count.saturating_add(1);
        self.last_seen_at_ms = now_ms;
        self.loaded = true;
        if hints.size.is_some() {
            self.last_requested_size = hints.size;
        }
        if hints.width.is_some() {
            self.width = hints.width;
        }
        if hints.height.is_some() {
            self.height = hints.height;
        }
    }

    pub fn is_expired(&self, now_ms: i64, max_age_ms: i64) -> bool {
        now_ms.saturating_sub(self.last_seen_at_ms) >= max_age_ms
    }
}
