//! # Gateway configuration DTO
//!
//! Pure data: every field has a default so a partial TOML file is valid.
//! Path resolution and environment overrides happen in the bootstrap layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub api: ApiSection,
    pub cache: CacheSection,
    pub images: ImagesSection,
    pub storage: StorageSection,
    pub preload: PreloadSection,
}

impl GatewayConfig {
    /// Parses a TOML document. Missing sections and fields take defaults.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub api_key: String,
    pub signing_secret: String,
    pub request_timeout_ms: u64,
    pub upload_timeout_ms: u64,
    pub upload_path: String,
    /// Same-origin cookie holding the anti-forgery token.
    pub csrf_cookie: String,
}

impl ApiSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout_ms)
    }
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: String::new(),
            signing_secret: String::new(),
            request_timeout_ms: 30_000,
            upload_timeout_ms: 60_000,
            upload_path: "/api/upload".to_string(),
            csrf_cookie: "csrf_token".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub default_ttl_secs: u64,
    pub image_short_ttl_secs: u64,
    pub image_long_ttl_secs: u64,
    /// Image-class writes between flushes of the persisted tier.
    pub persist_every: usize,
    /// Minimum spacing of persisted-tier sweeps.
    pub cleanup_interval_secs: u64,
    /// Regexes (matched against the query-less path) of identity-bearing
    /// endpoints that must always reach the network.
    pub identity_patterns: Vec<String>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            default_ttl_secs: 5 * 60,
            image_short_ttl_secs: 2 * 24 * 60 * 60,
            image_long_ttl_secs: 7 * 24 * 60 * 60,
            persist_every: 5,
            cleanup_interval_secs: 24 * 60 * 60,
            identity_patterns: vec![
                "^/api/profile(/|$)".to_string(),
                "^/api/auth/me$".to_string(),
                "^/api/users/[^/]+/?$".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesSection {
    /// Path prefixes of image-serving endpoints.
    pub path_prefixes: Vec<String>,
    /// Regex recognizing object-storage URLs inside response bodies.
    pub storage_url_pattern: String,
    /// `record` calls between registry persists.
    pub registry_persist_every: u64,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            path_prefixes: vec![
                "/api/images".to_string(),
                "/api/media".to_string(),
                "/api/covers".to_string(),
            ],
            storage_url_pattern: concat!(
                r"^https?://[^\s]*(",
                r"\.amazonaws\.com/|",
                r"storage\.googleapis\.com/|",
                r"\.r2\.cloudflarestorage\.com/|",
                r"res\.cloudinary\.com/|",
                r"/storage/v1/object/",
                r")"
            )
            .to_string(),
            registry_persist_every: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// SQLite file for the offline upload queue. Empty means "platform default".
    pub database_path: PathBuf,
    /// JSON key-value file. Empty means "platform default".
    pub kv_path: PathBuf,
    /// Directory for log files. Empty disables file logging.
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadSection {
    pub enabled: bool,
    pub interval_ms: u64,
    pub urls: Vec<String>,
}

impl Default for PreloadSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: 2_000,
            urls: Vec::new(),
        }
    }
}
