//! Retry and classification behaviour of the request executor
//!
//! Driven by a scripted transport so attempt counts and backoff delays are
//! observable without a network or real sleeps.

mod common;

use std::time::Duration;

use common::{json_response, rate_limited, response, scripted_executor};
use forumgate_client::{ApiErrorKind, ApiRequest, RetryPolicy, TransportError};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_three_rate_limits_then_success() {
    let (executor, transport, sleeper) = scripted_executor([
        rate_limited(2),
        rate_limited(2),
        rate_limited(2),
        json_response(200, &json!({"ok": true})),
    ]);

    let document = executor.execute(ApiRequest::get("/groups/makers.json")).await.unwrap();

    assert_eq!(document, Some(json!({"ok": true})));
    assert_eq!(transport.calls(), 4);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(3); 3]);
}

#[tokio::test]
async fn test_five_rate_limits_reach_max_retries() {
    let (executor, transport, sleeper) = scripted_executor((0..5).map(|_| rate_limited(2)));

    let err = executor
        .execute(ApiRequest::get("/groups/makers.json"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::RateLimited);
    assert_eq!(err.message(), "Reached max retries");
    assert_eq!(err.status().map(|s| s.as_u16()), Some(429));
    // no further call once attempts hit zero, no sleep after the last one
    assert_eq!(transport.calls(), 5);
    assert_eq!(sleeper.sleeps().len(), 4);
}

#[tokio::test]
async fn test_custom_retry_policy() {
    let (executor, transport, sleeper) = scripted_executor((0..5).map(|_| rate_limited(0)));
    let executor = executor.with_retry_policy(RetryPolicy {
        max_attempts: 2,
        backoff: Duration::from_millis(250),
    });

    let err = executor.execute(ApiRequest::get("/x.json")).await.unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::RateLimited);
    assert_eq!(transport.calls(), 2);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(250)]);
}

#[tokio::test]
async fn test_rate_limit_without_wait_uses_backoff() {
    let (executor, _transport, sleeper) = scripted_executor([
        json_response(429, &json!({"errors": ["slow down"]})),
        json_response(200, &json!({})),
    ]);

    executor.execute(ApiRequest::get("/x.json")).await.unwrap();

    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_other_errors_are_not_retried() {
    let (executor, transport, sleeper) = scripted_executor([
        json_response(403, &json!({"errors": ["You are not permitted to view the requested resource."]})),
        json_response(200, &json!({})),
    ]);

    let err = executor.execute(ApiRequest::get("/admin/x.json")).await.unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::Http);
    assert_eq!(
        err.message(),
        "You are not permitted to view the requested resource."
    );
    assert_eq!(transport.calls(), 1);
    assert!(sleeper.sleeps().is_empty());
}

#[tokio::test]
async fn test_http_error_falls_back_to_reason() {
    let (executor, _, _) = scripted_executor([response(502, Some("text/html"), "<h1>bad gateway</h1>")]);

    let err = executor.execute(ApiRequest::get("/x.json")).await.unwrap_err();

    assert_eq!(err.message(), "Bad Gateway");
    assert_eq!(err.response().unwrap().text(), "<h1>bad gateway</h1>");
}

#[tokio::test]
async fn test_unexpected_redirect() {
    let (executor, _, _) = scripted_executor([response(302, Some("text/html"), "")]);

    let err = executor.execute(ApiRequest::get("/x.json")).await.unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::UnexpectedRedirect);
    assert_eq!(err.message(), "Unexpected redirect");
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let transport = common::ScriptedTransport::failing(TransportError::Timeout("deadline has elapsed".into()));
    let executor = forumgate_client::HttpRequestExecutor::with_transport(
        common::credentials("https://forum.example.org"),
        transport.clone(),
    );

    let err = executor.execute(ApiRequest::get("/x.json")).await.unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::Transport);
    assert!(err.is_timeout());
    assert!(err.response().is_none());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_empty_html_body_is_empty_result() {
    let (executor, _, _) = scripted_executor([response(200, Some("text/html; charset=utf-8"), " \n")]);

    let document = executor.execute(ApiRequest::put("/x.json")).await.unwrap();

    assert_eq!(document, None);
}

#[tokio::test]
async fn test_non_json_body_is_content_type_error() {
    let (executor, _, _) = scripted_executor([response(200, Some("text/html"), "<html>login</html>")]);

    let err = executor.execute(ApiRequest::get("/x.json")).await.unwrap_err();

    assert_eq!(err.kind(), ApiErrorKind::ContentTypeMismatch);
}

#[tokio::test]
async fn test_error_envelope_at_success_status() {
    let (executor, _, _) = scripted_executor([
        json_response(200, &json!({"errors": [], "rows": []})),
        json_response(200, &json!({"errors": ["x"], "message": null})),
    ]);

    let document = executor.execute(ApiRequest::post("/run")).await.unwrap();
    assert_eq!(document, Some(json!({"errors": [], "rows": []})));

    let err = executor.execute(ApiRequest::post("/run")).await.unwrap_err();
    assert_eq!(err.kind(), ApiErrorKind::Application);
    assert_eq!(err.message(), "x");
}

#[tokio::test]
async fn test_request_carries_headers_and_url() {
    let (executor, transport, _) = scripted_executor([json_response(200, &json!({}))]);

    executor
        .execute(ApiRequest::get("admin/users/12.json").query([("show_emails", "true")]))
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.url.as_str(), "https://forum.example.org/admin/users/12.json");
    assert_eq!(request.query, vec![("show_emails".to_string(), "true".to_string())]);
    assert_eq!(request.headers["accept"], "application/json; charset=utf-8");
    assert_eq!(request.headers["api-key"], common::API_KEY);
    assert_eq!(request.headers["api-username"], common::API_USERNAME);
    assert!(!request.options.follow_redirects);
}
