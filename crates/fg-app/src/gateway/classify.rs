use serde_json::Value;
use std::time::Duration;

use fg_core::error::{BenignCode, GatewayError};
use fg_core::http::{HttpResponse, HEADER_RETRY_AFTER};

/// What a backend response means to the caller.
#[derive(Debug)]
pub(crate) enum ResponseClass {
    Success(Value),
    RateLimited { retry_after: Option<Duration> },
    Benign(BenignCode),
    Failed(GatewayError),
}

pub(crate) fn classify_response(response: &HttpResponse) -> ResponseClass {
    if response.is_success() {
        return match parse_body(&response.body) {
            Ok(value) => ResponseClass::Success(value),
            Err(e) => ResponseClass::Failed(e),
        };
    }

    let body = parse_body(&response.body).ok();
    if response.status == 429 {
        return ResponseClass::RateLimited {
            retry_after: retry_after(response, body.as_ref()),
        };
    }

    if (400..500).contains(&response.status) {
        if let Some(code) = body
            .as_ref()
            .and_then(|b| b.get("code"))
            .and_then(Value::as_str)
            .and_then(BenignCode::from_code)
        {
            return ResponseClass::Benign(code);
        }
    }

    ResponseClass::Failed(GatewayError::from_status(
        response.status,
        response.body_text(),
    ))
}

/// Empty bodies decode to `null`.
pub(crate) fn parse_body(body: &[u8]) -> Result<Value, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// `Retry-After` header (delta-seconds) first, then a `retryAfter` body field.
fn retry_after(response: &HttpResponse, body: Option<&Value>) -> Option<Duration> {
    response
        .header(HEADER_RETRY_AFTER)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| body?.get("retryAfter")?.as_u64())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_success_body_is_null() {
        let class = classify_response(&HttpResponse::new(204, ""));
        assert!(matches!(class, ResponseClass::Success(Value::Null)));
    }

    #[test]
    fn non_json_success_is_decode_error() {
        let class = classify_response(&HttpResponse::new(200, "<html>"));
        assert!(matches!(class, ResponseClass::Failed(GatewayError::Decode(_))));
    }

    #[test]
    fn rate_limit_reads_header_then_body() {
        let header = HttpResponse::new(429, "").with_header("Retry-After", "12");
        assert!(matches!(
            classify_response(&header),
            ResponseClass::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(12)
        ));

        let body = HttpResponse::new(429, r#"{"retryAfter": 30}"#);
        assert!(matches!(
            classify_response(&body),
            ResponseClass::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(30)
        ));

        let neither = HttpResponse::new(429, "slow down");
        assert!(matches!(
            classify_response(&neither),
            ResponseClass::RateLimited { retry_after: None }
        ));
    }

    #[test]
    fn benign_code_is_recognized_only_on_4xx() {
        let conflict = HttpResponse::new(409, r#"{"code":"ALREADY_FOLLOWING","message":"x"}"#);
        assert!(matches!(
            classify_response(&conflict),
            ResponseClass::Benign(BenignCode::AlreadyFollowing)
        ));

        let server = HttpResponse::new(500, r#"{"code":"ALREADY_FOLLOWING"}"#);
        assert!(matches!(
            classify_response(&server),
            ResponseClass::Failed(GatewayError::Server { status: 500, .. })
        ));
    }

    #[test]
    fn unknown_code_is_typed_error_with_raw_body() {
        let response = HttpResponse::new(400, r#"{"code":"TITLE_TOO_LONG"}"#);
        match classify_response(&response) {
            ResponseClass::Failed(GatewayError::Client { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"code":"TITLE_TOO_LONG"}"#);
            }
            other => panic!("unexpected class: {other:?}"),
        }
    }

    #[test]
    fn auth_failures_are_distinct() {
        assert!(matches!(
            classify_response(&HttpResponse::new(401, "")),
            ResponseClass::Failed(GatewayError::Auth { status: 401, .. })
        ));
    }
}
