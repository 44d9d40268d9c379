//! Status and operational HTTP endpoints.
//!
//! - `/`        : service message + model status (always 200)
//! - `/healthz` : liveness
//! - `/readyz`  : readiness (503 when the model is not loaded or draining)
//! - `/metrics` : Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use pops_core::protocol::RootStatus;

use crate::app_state::{AppState, SERVICE_MESSAGE};

pub async fn root(State(state): State<AppState>) -> Json<RootStatus> {
    Json(RootStatus {
        message: SERVICE_MESSAGE.to_string(),
        model_status: state.model().status().to_string(),
    })
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    if state.is_draining() {
        (StatusCode::SERVICE_UNAVAILABLE, "draining")
    } else if !state.model().is_loaded() {
        (StatusCode::SERVICE_UNAVAILABLE, "not loaded")
    } else {
        (StatusCode::OK, "ready")
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.telemetry().metrics().render(&extra);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response()
}
