mod common;

use apiresponse::{ApiResponse, Failure, RawResponse, ResponseContext, StatusCode, DEFAULT_SUCCESS_RANGE};
use common::{ok, refused};

#[test]
fn status_table_is_total() {
    assert_eq!(StatusCode::from_code(200), StatusCode::Ok);
    assert_eq!(StatusCode::from_code(404), StatusCode::NotFound);
    assert_eq!(StatusCode::from_code(226), StatusCode::ImUsed);
    for code in [0u16, 99, 600, 799, u16::MAX] {
        assert_eq!(StatusCode::from_code(code), StatusCode::Unknown, "{code}");
    }
    assert_eq!(StatusCode::Unknown.code(), 0);
}

#[test]
fn every_known_code_round_trips() {
    for code in 100..=599u16 {
        let status = StatusCode::from_code(code);
        if status != StatusCode::Unknown {
            assert_eq!(status.code(), code);
        }
    }
}

#[test]
fn default_range_boundaries() {
    let ctx = ResponseContext::new();
    assert_eq!(ctx.success_range(), DEFAULT_SUCCESS_RANGE);
    assert!(ctx.of(|| ok(199, ())).is_error());
    assert!(ctx.of(|| ok(200, ())).is_success());
    assert!(ctx.of(|| ok(299, ())).is_success());
    assert!(ctx.of(|| ok(300, ())).is_error());
}

#[test]
fn custom_range_reclassifies_later_responses() {
    let ctx = ResponseContext::new();
    let before = ctx.of(|| ok(304, "cached"));
    ctx.set_success_range(200..=399).unwrap();
    let after = ctx.of(|| ok(304, "cached"));
    assert!(before.is_error());
    assert!(after.is_success());
}

#[test]
fn error_payload_keeps_status_headers_and_body() {
    let ctx = ResponseContext::new();
    let response: ApiResponse<String> = ctx.of(|| {
        Ok::<_, std::io::Error>(
            RawResponse::new(429).header("Retry-After", "30").error_body(r#"{"error":"slow down"}"#),
        )
    });
    let Some(Failure::Error(payload)) = response.as_failure() else {
        panic!("expected error, got {response:?}");
    };
    assert_eq!(payload.status(), 429);
    assert_eq!(payload.status_code(), StatusCode::TooManyRequests);
    assert_eq!(payload.headers().and_then(|h| h.get("retry-after")), Some("30"));
    assert_eq!(payload.error_body(), Some(r#"{"error":"slow down"}"#));
}

#[test]
fn transport_error_is_an_exception_not_an_error() {
    let ctx = ResponseContext::new();
    let response: ApiResponse<()> = ctx.of(refused);
    assert!(response.is_exception());
    assert!(!response.is_error());
    assert_eq!(response.message().as_deref(), Some("connection refused"));
}

#[test]
fn empty_success_has_no_content() {
    let ctx = ResponseContext::new();
    let response: ApiResponse<u32> = ctx.of(|| Ok::<_, std::io::Error>(RawResponse::new(204)));
    let success = response.as_success().unwrap();
    assert!(!success.has_content());
    assert_eq!(success.data().unwrap_err().status, 204);
    assert_eq!(success.status_code(), StatusCode::NoContent);
}
