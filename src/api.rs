//! HTTP control surface.
//!
//! | Route                      | Effect                                  |
//! |----------------------------|-----------------------------------------|
//! | `POST /api/round/sync`     | one full reconciliation pass            |
//! | `POST /api/round/close`    | close and reset the round named by `id` |
//! | `GET  /api/round/snapshot` | read the last published state           |
//!
//! Successful calls answer with the snapshot. Failed triggers answer with
//! `{"error": ..., "snapshot": ...}` where the snapshot is the last published one, never a
//! partially applied trigger.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    ErrorKind, EventSource, MetricSource, RoundsError, orchestrator::RoundKeeper, types::Snapshot,
};

type SharedKeeper<S, M> = Arc<RoundKeeper<S, M>>;

#[derive(Debug, Default, Deserialize)]
struct CloseRequest {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    snapshot: Snapshot,
}

/// Builds the router serving `keeper`.
pub fn router<S, M>(keeper: SharedKeeper<S, M>) -> Router
where
    S: EventSource + 'static,
    M: MetricSource + 'static,
{
    Router::new()
        .route("/api/round/sync", post(sync::<S, M>))
        .route("/api/round/close", post(close::<S, M>))
        .route("/api/round/snapshot", get(snapshot::<S, M>))
        .with_state(keeper)
}

async fn sync<S, M>(State(keeper): State<SharedKeeper<S, M>>) -> Response
where
    S: EventSource + 'static,
    M: MetricSource + 'static,
{
    match keeper.reconcile().await {
        Ok(report) if report.is_clean() => Json(report.snapshot).into_response(),
        Ok(report) => {
            let error = report
                .failures
                .iter()
                .map(|(id, e)| format!("{id}: {e}"))
                .collect::<Vec<_>>()
                .join("; ");
            failure(StatusCode::BAD_GATEWAY, error, report.snapshot)
        }
        Err(e) => failure(status_of(&e), e.to_string(), keeper.snapshot()),
    }
}

async fn close<S, M>(State(keeper): State<SharedKeeper<S, M>>, body: Bytes) -> Response
where
    S: EventSource + 'static,
    M: MetricSource + 'static,
{
    // An unreadable body is treated like a missing id.
    let request: CloseRequest = serde_json::from_slice(&body).unwrap_or_default();

    match keeper.close_round(&request.id).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => failure(status_of(&e), e.to_string(), keeper.snapshot()),
    }
}

async fn snapshot<S, M>(State(keeper): State<SharedKeeper<S, M>>) -> Json<Snapshot>
where
    S: EventSource + 'static,
    M: MetricSource + 'static,
{
    Json(keeper.snapshot())
}

fn status_of(error: &RoundsError) -> StatusCode {
    match error.kind() {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Upstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn failure(status: StatusCode, error: String, snapshot: Snapshot) -> Response {
    warn!(status = status.as_u16(), error = %error, "Control request failed");
    (status, Json(ErrorBody { error, snapshot })).into_response()
}
