mod common;

use std::time::Duration as StdDuration;

use axum::http::{HeaderMap, HeaderValue};
use chrono::{Duration, Utc};
use market_data_backend::auth::{AuthFailure, Credential, Role, SessionValidator};
use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::common::{mount_session, test_config, whoami_body};

fn validator(server: &MockServer, extra: &[(&str, &str)]) -> SessionValidator {
    let config = test_config(&server.uri(), "http://localhost:9", extra);
    SessionValidator::new(&config.auth).expect("Failed to build validator")
}

#[tokio::test]
async fn test_token_forwarded_as_bearer_header_and_cookie() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .and(header("authorization", "Bearer tok-abcdefghijkl"))
        .and(header("x-session-token", "tok-abcdefghijkl"))
        .and(header("cookie", "ory_kratos_session=tok-abcdefghijkl"))
        .respond_with(ResponseTemplate::new(200).set_body_json(whoami_body(
            "user-1",
            Some("admin"),
            true,
            Utc::now() + Duration::hours(1),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let session = validator(&server, &[])
        .validate(&Credential::new("tok-abcdefghijkl"))
        .await
        .expect("Session should be valid");

    assert_eq!(session.identity_id, "user-1");
    assert_eq!(session.session_id, "sess-user-1");
    assert_eq!(session.traits.email(), Some("user-1@example.com"));
    assert_eq!(session.traits.role(), Role::Admin);
}

#[tokio::test]
async fn test_authenticate_from_cookie_header() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        "cookie-token-123",
        whoami_body("user-2", None, true, Utc::now() + Duration::hours(1)),
    )
    .await;

    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_static("theme=dark; ory_kratos_session=cookie-token-123"),
    );

    let session = validator(&server, &[]).authenticate(&headers).await.unwrap();
    assert_eq!(session.identity_id, "user-2");
    assert_eq!(session.traits.role(), Role::Trader);
}

#[tokio::test]
async fn test_missing_credential_never_calls_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = validator(&server, &[]).authenticate(&HeaderMap::new()).await;
    assert!(matches!(result, Err(AuthFailure::NoCredential)));
}

#[tokio::test]
async fn test_non_ok_status_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "status": "Unauthorized"}
        })))
        .mount(&server)
        .await;

    let result = validator(&server, &[])
        .validate(&Credential::new("revoked-token"))
        .await;
    assert!(matches!(result, Err(AuthFailure::Rejected { status: 401 })));
}

#[tokio::test]
async fn test_other_success_codes_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = validator(&server, &[])
        .validate(&Credential::new("some-token"))
        .await;
    assert!(matches!(result, Err(AuthFailure::Rejected { status: 204 })));
}

#[tokio::test]
async fn test_undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = validator(&server, &[])
        .validate(&Credential::new("some-token"))
        .await;
    assert!(matches!(result, Err(AuthFailure::Malformed(_))));
}

#[tokio::test]
async fn test_inactive_session_is_refused() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        "inactive-token",
        whoami_body("user-3", None, false, Utc::now() - Duration::hours(1)),
    )
    .await;

    let result = validator(&server, &[])
        .validate(&Credential::new("inactive-token"))
        .await;
    assert!(matches!(result, Err(AuthFailure::Inactive { .. })));
}

#[tokio::test]
async fn test_expired_session_is_refused() {
    let server = MockServer::start().await;
    mount_session(
        &server,
        "expired-token",
        whoami_body("user-4", None, true, Utc::now() - Duration::minutes(1)),
    )
    .await;

    let result = validator(&server, &[])
        .validate(&Credential::new("expired-token"))
        .await;
    assert!(matches!(result, Err(AuthFailure::Expired { .. })));
}

#[tokio::test]
async fn test_slow_provider_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(whoami_body("user-5", None, true, Utc::now() + Duration::hours(1)))
                .set_delay(StdDuration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let validator = validator(&server, &[("SESSION_VALIDATION_TIMEOUT_SECS", "1")]);
    let result = validator.validate(&Credential::new("slow-token")).await;
    assert!(matches!(result, Err(AuthFailure::Unreachable(_))));
}

#[tokio::test]
async fn test_closed_port_is_unreachable() {
    let config = test_config("http://127.0.0.1:9", "http://127.0.0.1:9", &[]);
    let validator = SessionValidator::new(&config.auth).unwrap();

    let result = validator.validate(&Credential::new("any-token")).await;
    assert!(matches!(result, Err(AuthFailure::Unreachable(_))));
    assert!(!validator.health_check().await);
}

#[tokio::test]
async fn test_without_cache_every_call_goes_to_provider() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(whoami_body(
            "user-6",
            None,
            true,
            Utc::now() + Duration::hours(1),
        )))
        .expect(2)
        .mount(&server)
        .await;

    let validator = validator(&server, &[]);
    let credential = Credential::new("repeat-token");
    validator.validate(&credential).await.unwrap();
    validator.validate(&credential).await.unwrap();
}

#[tokio::test]
async fn test_cache_serves_repeat_and_logout_evicts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(whoami_body(
            "user-7",
            None,
            true,
            Utc::now() + Duration::hours(1),
        )))
        .expect(2)
        .mount(&server)
        .await;

    let validator = validator(&server, &[("SESSION_CACHE_TTL_SECS", "60")]);
    let credential = Credential::new("cached-token");

    validator.validate(&credential).await.unwrap();
    validator.validate(&credential).await.unwrap();

    validator.invalidate(&credential).await;
    validator.validate(&credential).await.unwrap();
}

#[tokio::test]
async fn test_cached_session_is_rechecked_for_expiry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sessions/whoami"))
        .respond_with(ResponseTemplate::new(200).set_body_json(whoami_body(
            "user-8",
            None,
            true,
            Utc::now() + Duration::seconds(1),
        )))
        .mount(&server)
        .await;

    let validator = validator(&server, &[("SESSION_CACHE_TTL_SECS", "60")]);
    let credential = Credential::new("short-lived-token");

    validator.validate(&credential).await.unwrap();
    tokio::time::sleep(StdDuration::from_millis(1500)).await;

    let result = validator.validate(&credential).await;
    assert!(matches!(result, Err(AuthFailure::Expired { .. })));
}

#[tokio::test]
async fn test_health_check_gives_up_quickly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health/ready"))
        .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(5)))
        .mount(&server)
        .await;

    let validator = validator(&server, &[("SESSION_VALIDATION_TIMEOUT_SECS", "10")]);
    let started = std::time::Instant::now();
    assert!(!validator.health_check().await);
    assert!(started.elapsed() < StdDuration::from_secs(3));
}
