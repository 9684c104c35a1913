//! Backend API client integration tests against a mock server.

use std::time::Duration;

use bidwatch::backend::{ApiClient, ApiError, ErrorClass};
use bidwatch::types::BotAction;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.uri()).expect("client")
}

#[tokio::test]
async fn health_returns_epoch_from_numeric_start_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"status": "healthy", "server_start_time": 1722945600.123, "uptime": 42}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let health = client_for(&server).health(TIMEOUT).await.expect("health");
    assert_eq!(health.status, "healthy");
    assert_eq!(health.server_start_time.as_str(), "1722945600.123");
    assert_eq!(health.uptime, 42);
}

#[tokio::test]
async fn bot_status_sends_bearer_and_ignores_settings_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bot/status"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{
                "running": true, "paused": false,
                "jobs_found": 9, "unread_count": 4, "uptime": 300,
                "categories": ["design"], "keywords": ["logo"],
                "interval": 60, "auto_bid_enabled": true
            }"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let state = client_for(&server)
        .bot_status("tok-1", TIMEOUT)
        .await
        .expect("status");
    assert!(state.running);
    assert_eq!(state.jobs_found, 9);
    assert_eq!(state.unread_count, 4);
    assert_eq!(state.uptime_secs, 300);
}

#[tokio::test]
async fn unauthorized_status_classifies_as_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bot/status"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"error": "Invalid or missing token"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .bot_status("stale", TIMEOUT)
        .await
        .expect_err("401 must be an error");
    assert!(matches!(err, ApiError::Auth(_)));
    assert_eq!(err.class(), ErrorClass::Auth);
}

#[tokio::test]
async fn server_error_classifies_as_connectivity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .health(TIMEOUT)
        .await
        .expect_err("500 must be an error");
    assert_eq!(err.class(), ErrorClass::Connectivity);
}

#[tokio::test]
async fn slow_response_times_out_as_connectivity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(5))
                .set_body_raw(r#"{"server_start_time": 1}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let err = client_for(&server)
        .health(Duration::from_millis(100))
        .await
        .expect_err("must time out");
    assert!(matches!(err, ApiError::Timeout(_)));
    assert_eq!(err.class(), ErrorClass::Connectivity);
}

#[tokio::test]
async fn malformed_body_classifies_as_protocol() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json at all", "text/plain"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .health(TIMEOUT)
        .await
        .expect_err("garbage body must fail");
    assert_eq!(err.class(), ErrorClass::Protocol);
}

#[tokio::test]
async fn rejected_action_decodes_success_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bot/start"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"success": false, "message": "bot already running"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .bot_action("tok-1", BotAction::Start)
        .await
        .expect("action response");
    assert!(!resp.success);
    assert_eq!(resp.message.as_deref(), Some("bot already running"));
}

#[tokio::test]
async fn jobs_fallback_decodes_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [
                {"id": "j1", "title": "Shop logo", "is_read": false, "job_price": "5000yen"},
                {"id": "j2", "title": "Data entry", "is_read": true}
            ]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let jobs = client_for(&server).jobs("tok-1", TIMEOUT).await.expect("jobs");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, "j1");
    assert_eq!(jobs[0].job_price.as_deref(), Some("5000yen"));
    assert!(jobs[1].is_read);
}

#[tokio::test]
async fn mark_read_posts_to_job_path() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/j7/mark-read"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"success": true}"#, "application/json"))
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .mark_job_read("tok-1", "j7")
        .await
        .expect("mark read");
}

#[tokio::test]
async fn stream_handshake_authenticates_via_query_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .and(query_param("token", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\": \"snapshot\", \"jobs\": [{\"id\": \"s1\"}]}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let mut stream = client_for(&server)
        .open_job_stream("tok-1", TIMEOUT)
        .await
        .expect("stream");
    let event = stream.next_event().await.expect("event");
    assert!(event.is_some());
    assert!(stream.next_event().await.expect("eof").is_none());
}

#[tokio::test]
async fn stream_handshake_rejects_bad_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .open_job_stream("bad", TIMEOUT)
        .await
        .err()
        .expect("401 must fail the handshake");
    assert!(err.is_auth());
}

#[tokio::test]
async fn verify_token_maps_statuses_to_validity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/verify"))
        .and(header("Authorization", "Bearer good"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"valid": true, "user": {"id": 1, "email": "a@b.c"}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/verify"))
        .respond_with(ResponseTemplate::new(401).set_body_raw(
            r#"{"valid": false, "error": "Invalid or missing token"}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert!(client.verify_token("good", TIMEOUT).await.expect("verify good"));
    assert!(!client.verify_token("bad", TIMEOUT).await.expect("verify bad"));
}
