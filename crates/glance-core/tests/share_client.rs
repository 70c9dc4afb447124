//! Tests for the live share client against an in-process fake service.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use time::OffsetDateTime;

use glance_core::share::{APPLICATION_ID, LATEST_GLUCOSE_PATH, LOGIN_PATH, USER_AGENT};
use glance_core::{
    Error, GlanceOptions, GlucoseMonitor, GlucoseProvider, RateLimitPolicy, ShareClient,
    ShareServer, Trend,
};

#[derive(Default)]
struct FakeShare {
    logins: AtomicU32,
    fetches: AtomicU32,
    /// Answer this many fetches with an expired-session error.
    expire_next: AtomicU32,
    reject_login: AtomicBool,
    fail_fetch: AtomicBool,
    bad_payload: AtomicBool,
    last_login: std::sync::Mutex<Option<Value>>,
    last_query: std::sync::Mutex<HashMap<String, String>>,
    last_user_agent: std::sync::Mutex<Option<String>>,
    now_ms: i64,
}

impl FakeShare {
    fn new() -> Self {
        Self {
            now_ms: (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64,
            ..Self::default()
        }
    }

    fn current_token(&self) -> String {
        format!("token-{}", self.logins.load(Ordering::SeqCst))
    }
}

fn share_error(code: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "Code": code, "Message": format!("{code} (fake)") })),
    )
        .into_response()
}

async fn login(
    State(share): State<Arc<FakeShare>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    *share.last_user_agent.lock().unwrap() = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    *share.last_login.lock().unwrap() = Some(body);

    if share.reject_login.load(Ordering::SeqCst) {
        return share_error("SSO_AuthenticatePasswordInvalid");
    }
    share.logins.fetch_add(1, Ordering::SeqCst);
    Json(share.current_token()).into_response()
}

async fn latest(
    State(share): State<Arc<FakeShare>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    share.fetches.fetch_add(1, Ordering::SeqCst);
    *share.last_query.lock().unwrap() = params.clone();

    if share.fail_fetch.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    if params.get("sessionId") != Some(&share.current_token()) {
        return share_error("SessionNotValid");
    }
    if share.expire_next.load(Ordering::SeqCst) > 0 {
        share.expire_next.fetch_sub(1, Ordering::SeqCst);
        return share_error("SessionIdNotFound");
    }
    if share.bad_payload.load(Ordering::SeqCst) {
        return Json(json!([{ "Value": 100, "Trend": 12, "WT": "/Date(1462404576000)/" }]))
            .into_response();
    }

    let max: usize = params
        .get("maxCount")
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let records: Vec<Value> = [(100, 4, 0), (112, 5, 5), (118, 5, 10)]
        .into_iter()
        .take(max)
        .map(|(value, trend, minutes_ago)| {
            json!({
                "Value": value,
                "Trend": trend,
                "WT": format!("/Date({})/", share.now_ms - minutes_ago * 60_000),
            })
        })
        .collect();
    Json(records).into_response()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn spawn_fake() -> (Arc<FakeShare>, String) {
    init_tracing();
    let share = Arc::new(FakeShare::new());
    let app = Router::new()
        .route(LOGIN_PATH, post(login))
        .route(LATEST_GLUCOSE_PATH, post(latest))
        .with_state(Arc::clone(&share));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (share, format!("http://{addr}"))
}

fn client(base_url: &str) -> glance_core::ShareClientBuilder {
    ShareClient::builder("someone", "s3cret")
        .server(ShareServer::Custom(base_url.to_string()))
        .min_fetch_interval(Duration::ZERO)
        .timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_fetch_logs_in_and_decodes() {
    let (share, url) = spawn_fake().await;
    let client = client(&url).build().unwrap();

    let readings = client.fetch_latest_readings(2).await.unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].value(), 100);
    assert_eq!(readings[0].trend(), Trend::Flat);
    assert_eq!(readings[1].value(), 112);
    assert_eq!(readings[1].trend(), Trend::Down);
    assert!(readings[0] > readings[1]);

    assert_eq!(share.logins.load(Ordering::SeqCst), 1);
    assert_eq!(share.fetches.load(Ordering::SeqCst), 1);
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_request_shape() {
    let (share, url) = spawn_fake().await;
    let client = client(&url).lookback_minutes(720).build().unwrap();
    client.fetch_latest_readings(3).await.unwrap();

    let login = share.last_login.lock().unwrap().clone().unwrap();
    assert_eq!(login["accountName"], "someone");
    assert_eq!(login["password"], "s3cret");
    assert_eq!(login["applicationId"], APPLICATION_ID);
    assert_eq!(share.last_user_agent.lock().unwrap().as_deref(), Some(USER_AGENT));

    let query = share.last_query.lock().unwrap().clone();
    assert_eq!(query.get("sessionId").map(String::as_str), Some("token-1"));
    assert_eq!(query.get("minutes").map(String::as_str), Some("720"));
    assert_eq!(query.get("maxCount").map(String::as_str), Some("3"));
}

#[tokio::test]
async fn test_session_is_reused() {
    let (share, url) = spawn_fake().await;
    let client = client(&url).build().unwrap();

    client.fetch_latest_readings(1).await.unwrap();
    client.fetch_latest_readings(1).await.unwrap();
    assert_eq!(share.logins.load(Ordering::SeqCst), 1);
    assert_eq!(share.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fetches_share_one_login() {
    let (share, url) = spawn_fake().await;
    let client = Arc::new(client(&url).build().unwrap());

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.fetch_latest_readings(2).await })
        })
        .collect();
    for task in tasks {
        let readings = task.await.unwrap().unwrap();
        assert_eq!(readings.len(), 2);
    }

    assert_eq!(share.logins.load(Ordering::SeqCst), 1);
    assert_eq!(share.fetches.load(Ordering::SeqCst), 8);
    assert!(client.is_authenticated().await);
}

#[tokio::test]
async fn test_wait_then_fetch_spaces_requests() {
    let (share, url) = spawn_fake().await;
    let client = client(&url)
        .min_fetch_interval(Duration::from_millis(300))
        .rate_limit_policy(RateLimitPolicy::WaitThenFetch)
        .build()
        .unwrap();

    let start = std::time::Instant::now();
    client.fetch_latest_readings(1).await.unwrap();
    client.fetch_latest_readings(1).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(share.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_return_cached_skips_network() {
    let (share, url) = spawn_fake().await;
    let client = client(&url)
        .min_fetch_interval(Duration::from_secs(60))
        .rate_limit_policy(RateLimitPolicy::ReturnCached)
        .build()
        .unwrap();

    let first = client.fetch_latest_readings(2).await.unwrap();
    let second = client.fetch_latest_readings(2).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(share.fetches.load(Ordering::SeqCst), 1);

    // Invalidation clears throttle history and the cache.
    client.invalidate_session().await;
    assert!(!client.is_authenticated().await);
    client.fetch_latest_readings(2).await.unwrap();
    assert_eq!(share.fetches.load(Ordering::SeqCst), 2);
    assert_eq!(share.logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rejected_login() {
    let (share, url) = spawn_fake().await;
    share.reject_login.store(true, Ordering::SeqCst);
    let client = client(&url).build().unwrap();

    let err = client.authenticate().await.unwrap_err();
    assert!(matches!(err, Error::Login(ref code) if code == "SSO_AuthenticatePasswordInvalid"));

    let err = client.fetch_latest_readings(2).await.unwrap_err();
    assert!(matches!(err, Error::Login(_)));
    assert_eq!(share.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_expired_session_reauthenticates() {
    let (share, url) = spawn_fake().await;
    let client = client(&url).build().unwrap();
    client.authenticate().await.unwrap();
    share.expire_next.store(1, Ordering::SeqCst);

    let readings = client.fetch_latest_readings(2).await.unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(share.logins.load(Ordering::SeqCst), 2);
    assert_eq!(share.fetches.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_reauthentication_is_bounded() {
    let (share, url) = spawn_fake().await;
    share.expire_next.store(100, Ordering::SeqCst);
    let client = client(&url).build().unwrap();

    let err = client.fetch_latest_readings(2).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(ref code) if code == "SessionIdNotFound"));
    // One initial attempt plus two re-authentications.
    assert_eq!(share.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(share.logins.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_fetch_http_error() {
    let (share, url) = spawn_fake().await;
    share.fail_fetch.store(true, Ordering::SeqCst);
    let client = client(&url).build().unwrap();

    let err = client.fetch_latest_readings(2).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(ref code) if code == "503"));
}

#[tokio::test]
async fn test_bad_payload_fails_whole_batch() {
    let (share, url) = spawn_fake().await;
    share.bad_payload.store(true, Ordering::SeqCst);
    let client = client(&url).build().unwrap();

    let err = client.fetch_latest_readings(2).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)));
    assert!(err.to_string().contains("Decode Failed"));
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client(&url).build().unwrap();
    let err = client.fetch_latest_readings(2).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[tokio::test]
async fn test_monitor_over_live_client() {
    let (share, url) = spawn_fake().await;
    let client = client(&url).build().unwrap();
    let monitor = GlucoseMonitor::new(Arc::new(client), GlanceOptions::default());

    assert!(monitor.check_for_new_readings().await);
    assert_eq!(monitor.value_string(), "100");
    assert_eq!(monitor.trend_string(), "→");
    assert_eq!(monitor.delta_string(), "-12");
    assert!(!monitor.is_stale());

    share.fail_fetch.store(true, Ordering::SeqCst);
    assert!(!monitor.check_for_new_readings().await);
    assert_eq!(monitor.value_string(), "100");
    assert!(monitor.last_error().unwrap().contains("503"));
}
