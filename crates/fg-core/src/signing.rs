//! Request signing.
//!
//! The backend recomputes `sha256(method ‖ path ‖ body ‖ timestamp ‖ secret)`
//! over the query-less path and rejects requests whose `x-signature` differs.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::http::{strip_query, HttpMethod};
use crate::ids::RequestNonce;
use crate::ports::ClockPort;

/// Derives request signatures from a shared secret. Stateless.
#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Signs one request. `body` must already be the canonical serialization
    /// (see [`canonical_body`]); `path` may still carry a query string.
    ///
    /// Returns 64 lower-case hex characters.
    pub fn sign(&self, method: HttpMethod, path: &str, body: &str, timestamp_ms: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update(strip_query(path).as_bytes());
        hasher.update(body.as_bytes());
        hasher.update(timestamp_ms.to_string().as_bytes());
        hasher.update(self.secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Builds a [`SignedRequest`]. `timestamp_ms` must be read right before
    /// this call so the signature and `x-timestamp` agree.
    pub fn signed_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        timestamp_ms: i64,
        nonce: RequestNonce,
    ) -> SignedRequest {
        let body_digest_input = canonical_body(body);
        let signature = self.sign(method, path, &body_digest_input, timestamp_ms);
        SignedRequest {
            method,
            path: strip_query(path).to_string(),
            body_digest_input,
            timestamp_ms,
            nonce,
            signature,
        }
    }

    /// Signs with a fresh nonce and the current time of `clock`.
    pub fn build_signed_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&Value>,
        clock: &dyn ClockPort,
    ) -> SignedRequest {
        let timestamp_ms = clock.now_ms();
        self.signed_request(method, path, body, timestamp_ms, RequestNonce::new())
    }
}

/// Transient result of signing; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body_digest_input: String,
    pub timestamp_ms: i64,
    pub nonce: RequestNonce,
    pub signature: String,
}

/// Serializes a JSON body with object keys sorted at every depth.
///
/// `None` and `null` both produce the empty string, which is also what
/// multipart uploads sign with.
pub fn canonical_body(body: Option<&Value>) -> String {
    match body {
        None | Some(Value::Null) => String::new(),
        Some(value) => sorted(value).to_string(),
    }
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::with_capacity(map.len());
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn signer() -> RequestSigner {
        RequestSigner::new("s3cret")
    }

    #[test]
    fn sign_is_deterministic() {
        let a = signer().sign(HttpMethod::Post, "/api/reviews", r#"{"rating":5}"#, 1_700_000_000_000);
        let b = signer().sign(HttpMethod::Post, "/api/reviews", r#"{"rating":5}"#, 1_700_000_000_000);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn sign_changes_when_any_input_changes() {
        let base = signer().sign(HttpMethod::Post, "/api/reviews", "{}", 1000);

        assert_ne!(base, signer().sign(HttpMethod::Put, "/api/reviews", "{}", 1000));
        assert_ne!(base, signer().sign(HttpMethod::Post, "/api/review", "{}", 1000));
        assert_ne!(base, signer().sign(HttpMethod::Post, "/api/reviews", "{ }", 1000));
        assert_ne!(base, signer().sign(HttpMethod::Post, "/api/reviews", "{}", 1001));
        assert_ne!(
            base,
            RequestSigner::new("other").sign(HttpMethod::Post, "/api/reviews", "{}", 1000)
        );
    }

    #[test]
    fn sign_ignores_query_string() {
        let plain = signer().sign(HttpMethod::Get, "/api/articles", "", 5);
        let with_query = signer().sign(HttpMethod::Get, "/api/articles?page=3", "", 5);
        assert_eq!(plain, with_query);
    }

    #[test]
    fn canonical_body_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"d": true, "c": [ {"z": 1, "y": 2} ]}});
        let b = json!({"a": {"c": [ {"y": 2, "z": 1} ], "d": true}, "b": 1});
        assert_eq!(canonical_body(Some(&a)), canonical_body(Some(&b)));
        assert_eq!(
            canonical_body(Some(&a)),
            r#"{"a":{"c":[{"y":2,"z":1}],"d":true},"b":1}"#
        );
    }

    #[test]
    fn canonical_body_of_missing_body_is_empty() {
        assert_eq!(canonical_body(None), "");
        assert_eq!(canonical_body(Some(&Value::Null)), "");
    }

    struct FixedClock(i64);

    impl ClockPort for FixedClock {
        fn now_ms(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn build_signed_request_reads_clock_and_uses_fresh_nonces() {
        let clock = FixedClock(1_700_000_000_123);
        let a = signer().build_signed_request(HttpMethod::Get, "/api/articles", None, &clock);
        let b = signer().build_signed_request(HttpMethod::Get, "/api/articles", None, &clock);

        assert_eq!(a.timestamp_ms, 1_700_000_000_123);
        assert_eq!(a.signature, b.signature);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn signed_request_strips_query_and_keeps_nonce() {
        let nonce = RequestNonce::from("abc");
        let body = json!({"title": "Chapter 1"});
        let signed = signer().signed_request(
            HttpMethod::Post,
            "/api/books/7/chapters?draft=1",
            Some(&body),
            42,
            nonce.clone(),
        );

        assert_eq!(signed.path, "/api/books/7/chapters");
        assert_eq!(signed.nonce, nonce);
        assert_eq!(signed.timestamp_ms, 42);
        assert_eq!(
            signed.signature,
            signer().sign(HttpMethod::Post, "/api/books/7/chapters", r#"{"title":"Chapter 1"}"#, 42)
        );
    }
}
