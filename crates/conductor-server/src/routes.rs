//! `/health`, `/ready`, `/live` HTTP surface, plus the SSE streaming route.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;

use conductor_ports::{aggregate_health, HealthState};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let sse_routes = Router::new()
        .route("/api/v1/executions/:id/stream", get(conductor_sse::stream_execution))
        .with_state(state.sse.clone());

    let app_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/live", get(live_handler))
        .with_state(state);

    Router::new().merge(sse_routes).merge(app_routes)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let aggregate = aggregate_health(&state.health_checks).await;
    let status = match aggregate.status {
        HealthState::Healthy => StatusCode::OK,
        HealthState::Degraded => StatusCode::OK,
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(aggregate))
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    let aggregate = aggregate_health(&state.health_checks).await;
    let status = match aggregate.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(aggregate))
}

async fn live_handler() -> impl IntoResponse {
    StatusCode::OK
}
