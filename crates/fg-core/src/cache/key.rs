use serde::{Deserialize, Serialize};

use crate::http::{strip_query, HttpMethod};

/// Identity of a cached response: `(method, path, serialized body)`.
///
/// `path` keeps its query string, so `?page=1` and `?page=2` are distinct
/// entries that still belong to the same resource family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: HttpMethod,
    pub path: String,
    pub body: String,
}

impl CacheKey {
    pub fn new(method: HttpMethod, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: body.into(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path, String::new())
    }

    pub fn path_without_query(&self) -> &str {
        strip_query(&self.path)
    }
}

/// Family of a resource path: the query-less path cut to its first three
/// segments. `/api/users/123/followers` belongs to `/api/users/123`.
pub fn resource_family(path: &str) -> String {
    let segments: Vec<&str> = strip_query(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .take(3)
        .collect();
    format!("/{}", segments.join("/"))
}

/// Segment-aware prefix match: `/api/users/12` is not in `/api/users/1`.
pub fn path_in_family(path: &str, family: &str) -> bool {
    let path = strip_query(path);
    let family = family.trim_end_matches('/');
    if family.is_empty() {
        return true;
    }
    path == family
        || path
            .strip_prefix(family)
            .is_some_and(|rest| rest.starts_with('/'))
}
