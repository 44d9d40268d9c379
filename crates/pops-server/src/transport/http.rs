//! Predict routes and per-request HTTP metrics.
//!
//! `GET /predict/{text}` and `POST /predict` both build a `PredictInput` and
//! hand it to the inference handler. Extraction never rejects: an undecodable
//! path or a body that is not `{"text": string}` simply counts as absent.

use std::time::Instant;

use axum::{
    extract::{MatchedPath, Path, Request, State},
    middleware::Next,
    response::Response,
    Json,
};

use pops_core::protocol::{PredictInput, PredictResponse, TextInput};

use crate::app_state::AppState;

pub async fn predict_path(
    State(app): State<AppState>,
    path: Option<Path<String>>,
) -> Json<PredictResponse> {
    let input = PredictInput::from_parts(path.map(|Path(t)| t), None);
    Json(app.inference().handle(input).await)
}

pub async fn predict_body(
    State(app): State<AppState>,
    body: Option<Json<TextInput>>,
) -> Json<PredictResponse> {
    let input = PredictInput::from_parts(None, body.map(|Json(b)| b));
    Json(app.inference().handle(input).await)
}

/// Count and time every routed request by method, route template and status.
pub async fn track_http(
    State(app): State<AppState>,
    matched: Option<MatchedPath>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let endpoint = matched
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let started = Instant::now();

    let resp = next.run(req).await;

    let status = resp.status().as_u16().to_string();
    let metrics = app.telemetry().metrics();
    metrics.http_requests.inc(&[
        ("method", &method),
        ("endpoint", &endpoint),
        ("status", &status),
    ]);
    metrics
        .http_request_duration
        .observe(&[("method", &method), ("endpoint", &endpoint)], started.elapsed());
    resp
}
