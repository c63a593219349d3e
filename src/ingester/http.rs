//! Ingester HTTP endpoints, called by the ingester client.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::ingester::{Ingester, IngesterError};
use crate::model::{PushRequest, TraceId};
use crate::security::OrgId;

impl IntoResponse for IngesterError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngesterError::TooManyTraces { .. } => StatusCode::TOO_MANY_REQUESTS,
            IngesterError::Stopping => StatusCode::SERVICE_UNAVAILABLE,
            IngesterError::Ring(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn push(
    State(ingester): State<Arc<Ingester>>,
    org: OrgId,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, IngesterError> {
    ingester.push(&org, req)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn find_trace(
    State(ingester): State<Arc<Ingester>>,
    org: OrgId,
    Path(trace_id): Path<TraceId>,
) -> Response {
    match ingester.find_trace_by_id(&org, trace_id) {
        Some(trace) => Json(trace).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Routes behind the auth middleware.
pub fn routes(ingester: Arc<Ingester>) -> Router {
    Router::new()
        .route("/ingester/push", post(push))
        .route("/ingester/traces/{trace_id}", get(find_trace))
        .with_state(ingester)
}
