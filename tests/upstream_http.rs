//! `HttpAnalyticsSource` against a local axum server standing in for the upstream.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use leadpulse::{
    fallback_daily_metrics, fallback_view_model, fetch_analytics, FetchError, HttpAnalyticsSource,
    HttpSourceConfig,
};

const SCENARIO_A: &str = r#"[{
    "total_conversations": 100,
    "hot_leads": { "total": 10 },
    "platform_distribution": {
        "messenger": { "count": 60, "appointments": 20, "conversion_rate": "33%" },
        "instagram": { "count": 40, "appointments": 10, "conversion_rate": "25%" }
    },
    "lead_distribution": {
        "grade_a": { "count": 10 },
        "grade_b": { "count": 20 },
        "grade_c": { "count": 30 },
        "grade_d": { "count": 40 }
    },
    "average_response_time_minutes": "3.0",
    "average_response_time_formatted": "N/A",
    "daily_metrics": []
}]"#;

type SeenHeaders = Arc<Mutex<Vec<HeaderMap>>>;

async fn analytics_ok(State(seen): State<SeenHeaders>, headers: HeaderMap) -> impl IntoResponse {
    seen.lock()
        .expect("header log lock should not be poisoned")
        .push(headers);
    ([("content-type", "application/json")], SCENARIO_A)
}

async fn analytics_unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down")
}

async fn analytics_slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "[]"
}

async fn analytics_garbage() -> impl IntoResponse {
    "<html>ngrok warning page</html>"
}

async fn spawn_upstream() -> (SocketAddr, SeenHeaders) {
    let seen: SeenHeaders = Arc::default();
    let app = Router::new()
        .route("/ok", get(analytics_ok))
        .route("/unavailable", get(analytics_unavailable))
        .route("/slow", get(analytics_slow))
        .route("/garbage", get(analytics_garbage))
        .with_state(Arc::clone(&seen));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, seen)
}

fn source(addr: SocketAddr, path: &str, timeout_ms: u64) -> HttpAnalyticsSource {
    HttpAnalyticsSource::new(&HttpSourceConfig {
        endpoint: format!("http://{addr}{path}"),
        timeout_ms,
        ngrok_skip_browser_warning: true,
    })
    .expect("client should build")
}

#[tokio::test]
async fn scenario_a_end_to_end_over_http() {
    let (addr, seen) = spawn_upstream().await;
    let src = source(addr, "/ok", 2_000);

    let outcome = fetch_analytics(&src, Duration::from_secs(2)).await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.view.total_conversations, 100);
    assert_eq!(outcome.view.appointments_booked, 30);
    assert_eq!(outcome.view.avg_response_time, "3.0m");
    assert_eq!(outcome.view.daily_metrics, fallback_daily_metrics());

    let seen = seen.lock().unwrap();
    let headers = seen.first().expect("upstream should see one request");
    assert_eq!(headers["accept"], "application/json");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["ngrok-skip-browser-warning"], "true");
}

#[tokio::test]
async fn non_success_status_falls_back_without_parsing() {
    let (addr, _) = spawn_upstream().await;
    let src = source(addr, "/unavailable", 2_000);

    let outcome = fetch_analytics(&src, Duration::from_secs(2)).await;

    assert_eq!(outcome.view, fallback_view_model());
    assert_eq!(outcome.error, Some(FetchError::Status(503)));
}

#[tokio::test]
async fn slow_upstream_is_cancelled_at_timeout() {
    let (addr, _) = spawn_upstream().await;
    let src = source(addr, "/slow", 10_000);

    let started = std::time::Instant::now();
    let outcome = fetch_analytics(&src, Duration::from_millis(100)).await;

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(outcome.view, fallback_view_model());
    assert_eq!(outcome.error, Some(FetchError::Timeout { timeout_ms: 100 }));
}

#[tokio::test]
async fn non_json_body_falls_back_with_decode_error() {
    let (addr, _) = spawn_upstream().await;
    let src = source(addr, "/garbage", 2_000);

    let outcome = fetch_analytics(&src, Duration::from_secs(2)).await;

    assert_eq!(outcome.view, fallback_view_model());
    assert!(matches!(outcome.error, Some(FetchError::Decode(_))));
}

#[tokio::test]
async fn unreachable_upstream_falls_back_with_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let src = source(addr, "/ok", 2_000);

    let outcome = fetch_analytics(&src, Duration::from_secs(2)).await;

    assert_eq!(outcome.view, fallback_view_model());
    assert!(matches!(
        outcome.error,
        Some(FetchError::Transport(_)) | Some(FetchError::Timeout { .. })
    ));
}
