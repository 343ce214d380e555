//! Request dispatcher integration tests
//!
//! Tests the dispatcher against a real HTTP server including:
//! - Retrying after quota-exceeded responses
//! - Waiting out a saturated route window
//! - Wait deadlines and shutdown cancellation
//! - Learning application and method scopes from headers

mod common;

use std::time::{Duration, Instant};

use ranked_mirror::api::{RankedSource, RiotApi, APPLICATION_SCOPE};
use ranked_mirror::config::ApiConfig;
use ranked_mirror::error::{DispatchError, SyncError};
use ranked_mirror::limiter::{QuotaPair, QuotaProtocol, RateLimitRegistry, ScopeKey, ScopeSet};
use ranked_mirror::sync::{ApiRequest, ReqwestTransport, RequestDispatcher};
use tokio::sync::broadcast;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{quota_exceeded, quota_response};

fn dispatcher(route_limits: Vec<QuotaPair>) -> RequestDispatcher<ReqwestTransport> {
    let transport = ReqwestTransport::new(&ApiConfig {
        api_key: Some("RGAPI-test".to_string()),
        timeout_secs: 5,
        ..Default::default()
    })
    .unwrap();
    RequestDispatcher::new(
        transport,
        RateLimitRegistry::new(route_limits, 0.0),
        QuotaProtocol::default(),
    )
    .with_fallback_wait(Duration::from_millis(20))
}

fn scopes() -> ScopeSet {
    ScopeSet::new("euw1", APPLICATION_SCOPE, "status-v4.platform-data")
}

/// Test 1: A quota-exceeded response is retried after the server hint
#[tokio::test]
async fn test_retry_after_quota_exceeded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_exceeded(1))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_response("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let mut dispatcher = dispatcher(vec![QuotaPair::new(100, Duration::from_secs(1))]);
    let request = ApiRequest::get(format!("{}/status", server.uri()));

    let start = Instant::now();
    let response = dispatcher.dispatch(&request, &scopes()).await.unwrap();

    assert!(response.status.is_success());
    assert!(
        start.elapsed() >= Duration::from_secs(1),
        "retry must honor Retry-After"
    );
}

/// Test 2: Calls beyond the route window wait a full period
#[tokio::test]
async fn test_saturated_route_waits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_response("{}"))
        .expect(4)
        .mount(&server)
        .await;

    // 3 per second with no margin admits 3 calls, then blocks
    let mut dispatcher = dispatcher(vec![QuotaPair::new(3, Duration::from_secs(1))]);
    let request = ApiRequest::get(format!("{}/status", server.uri()));

    let start = Instant::now();
    for _ in 0..3 {
        dispatcher.dispatch(&request, &scopes()).await.unwrap();
    }
    assert!(start.elapsed() < Duration::from_millis(900));

    dispatcher.dispatch(&request, &scopes()).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(1));
}

/// Test 3: A wait longer than the deadline fails without sending
#[tokio::test]
async fn test_wait_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_response("{}"))
        .expect(1)
        .mount(&server)
        .await;

    let mut dispatcher = dispatcher(vec![QuotaPair::new(1, Duration::from_secs(60))])
        .with_max_wait(Duration::from_secs(5));
    let request = ApiRequest::get(format!("{}/status", server.uri()));

    dispatcher.dispatch(&request, &scopes()).await.unwrap();
    let result = dispatcher.dispatch(&request, &scopes()).await;

    assert!(matches!(
        result,
        Err(DispatchError::DeadlineExceeded { .. })
    ));
}

/// Test 4: A shutdown signal interrupts a quota wait
#[tokio::test]
async fn test_shutdown_cancels_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_response("{}"))
        .mount(&server)
        .await;

    let (tx, rx) = broadcast::channel(1);
    let mut dispatcher =
        dispatcher(vec![QuotaPair::new(1, Duration::from_secs(60))]).with_shutdown(rx);
    let request = ApiRequest::get(format!("{}/status", server.uri()));

    dispatcher.dispatch(&request, &scopes()).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(());
    });

    let start = Instant::now();
    let result = dispatcher.dispatch(&request, &scopes()).await;

    assert!(matches!(result, Err(DispatchError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(5));
}

/// Test 5: Successful responses teach the registry new scopes
#[tokio::test]
async fn test_scopes_learned_from_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(quota_response("{}"))
        .mount(&server)
        .await;

    let mut dispatcher = dispatcher(vec![QuotaPair::new(100, Duration::from_secs(1))]);
    let request = ApiRequest::get(format!("{}/status", server.uri()));
    dispatcher.dispatch(&request, &scopes()).await.unwrap();

    let registry = dispatcher.registry();
    let app = registry
        .resolve(&ScopeKey::Application(APPLICATION_SCOPE.to_string()))
        .expect("application scope learned");
    assert_eq!(app.windows().len(), 2);
    assert!(registry
        .resolve(&ScopeKey::Method("status-v4.platform-data".to_string()))
        .is_some());
    assert!(registry
        .resolve(&ScopeKey::Route("euw1".to_string()))
        .is_some());
}

/// Test 6: A success without quota headers is a protocol error
#[tokio::test]
async fn test_missing_quota_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/euw1/lol/summoner/v4/summoners/S1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"id":"S1"}"#))
        .mount(&server)
        .await;

    let dispatcher = dispatcher(vec![QuotaPair::new(100, Duration::from_secs(1))]);
    let api = RiotApi::new(dispatcher, format!("{}/{{platform}}", server.uri()));

    let result = api.summoner("euw1", "S1").await;
    assert!(matches!(result, Err(SyncError::QuotaHeader(_))));

    // The call still counts against the route
    let guard = api.dispatcher().await;
    let route = guard
        .registry()
        .resolve(&ScopeKey::Route("euw1".to_string()))
        .unwrap();
    assert_eq!(route.windows()[0].len(), 1);
}
