//! Transport-level request/response shapes.
//!
//! These are plain data handed across [`crate::ports::HttpTransportPort`]; the
//! gateway builds them, adapters translate them to a concrete HTTP client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const HEADER_API_KEY: &str = "x-api-key";
pub const HEADER_TIMESTAMP: &str = "x-timestamp";
pub const HEADER_NONCE: &str = "x-nonce";
pub const HEADER_SIGNATURE: &str = "x-signature";
pub const HEADER_CSRF_TOKEN: &str = "X-CSRF-Token";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Cache hint attached to image requests so intermediaries keep them around.
pub const LONG_LIVED_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub fn is_mutating(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultipartPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        mime_type: String,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpBody {
    #[default]
    Empty,
    /// Already-serialized JSON text.
    Json(String),
    Multipart(Vec<MultipartPart>),
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: HttpBody,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Returns `path` without its query string or fragment.
pub fn strip_query(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// Joins a relative API path onto `base_url`. Absolute URLs pass through.
pub fn join_url(base_url: &str, path: &str) -> String {
    if is_absolute_url(path) {
        return path.to_string();
    }
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

pub fn is_absolute_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Appends `name=value` to the query string of `path`.
pub fn append_query_param(path: &str, name: &str, value: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{name}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_query_removes_query_and_fragment() {
        assert_eq!(strip_query("/api/articles?page=2"), "/api/articles");
        assert_eq!(strip_query("/api/articles#top"), "/api/articles");
        assert_eq!(strip_query("/api/articles"), "/api/articles");
    }

    #[test]
    fn join_url_handles_slashes_and_absolute_urls() {
        assert_eq!(
            join_url("https://api.folio.dev/", "/api/books"),
            "https://api.folio.dev/api/books"
        );
        assert_eq!(
            join_url("https://api.folio.dev", "api/books"),
            "https://api.folio.dev/api/books"
        );
        assert_eq!(
            join_url("https://api.folio.dev", "https://cdn.example.com/a.jpg"),
            "https://cdn.example.com/a.jpg"
        );
    }

    #[test]
    fn append_query_param_picks_separator() {
        assert_eq!(append_query_param("/api/profile", "_ts", "1"), "/api/profile?_ts=1");
        assert_eq!(
            append_query_param("/api/profile?x=1", "_ts", "1"),
            "/api/profile?x=1&_ts=1"
        );
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = HttpResponse::new(429, "").with_header("Retry-After", "30");
        assert_eq!(response.header("retry-after"), Some("30"));
    }
}
