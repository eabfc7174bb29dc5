//! HTTP routes exposing the published dashboard state and the upstream passthrough.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};

use crate::fetcher::fetch_raw_bounded;
use crate::poller::Poller;

pub fn dashboard_router(poller: Arc<Poller>) -> Router {
    Router::new()
        .route("/dashboard/state", get(get_dashboard_state))
        .route("/dashboard/refresh", post(post_dashboard_refresh))
        .route("/api/analytics", get(get_analytics_passthrough))
        .with_state(DashboardAppState { poller })
}

#[derive(Clone)]
struct DashboardAppState {
    poller: Arc<Poller>,
}

async fn get_dashboard_state(State(state): State<DashboardAppState>) -> impl IntoResponse {
    info!(
        component = "dashboard_server",
        event = "http.state.request"
    );
    Json(state.poller.state())
}

async fn post_dashboard_refresh(State(state): State<DashboardAppState>) -> Response {
    info!(
        component = "dashboard_server",
        event = "http.refresh.request"
    );

    match state.poller.refetch().await {
        Ok(()) => Json(state.poller.state()).into_response(),
        Err(err) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Relays the upstream body unchanged. Failures are not degraded to fallback
/// data here: callers get a 500 with a generic message.
async fn get_analytics_passthrough(State(state): State<DashboardAppState>) -> Response {
    info!(
        component = "dashboard_server",
        event = "http.analytics.request"
    );

    let source = state.poller.source();
    let timeout = state.poller.config().request_timeout;
    match fetch_raw_bounded(source.as_ref(), timeout).await {
        Ok(body) => Json(body).into_response(),
        Err(err) => {
            warn!(
                component = "dashboard_server",
                event = "http.analytics.error",
                error = %err
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to fetch data" })),
            )
                .into_response()
        }
    }
}
