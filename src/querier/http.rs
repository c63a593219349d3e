use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use crate::model::TraceId;
use crate::querier::{Querier, QuerierError};
use crate::ring::RingError;
use crate::security::OrgId;

impl IntoResponse for QuerierError {
    fn into_response(self) -> Response {
        let status = match &self {
            QuerierError::Ring(RingError::Empty) => StatusCode::SERVICE_UNAVAILABLE,
            QuerierError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            QuerierError::Ring(_) | QuerierError::Ingester(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn find_trace(
    State(querier): State<Arc<Querier>>,
    org: OrgId,
    Path(trace_id): Path<TraceId>,
) -> Result<Response, QuerierError> {
    Ok(match querier.find_trace_by_id(&org, trace_id).await? {
        Some(trace) => Json(trace).into_response(),
        None => (StatusCode::NOT_FOUND, "trace not found").into_response(),
    })
}

/// `GET /api/traces/{trace_id}`, behind the auth middleware.
pub fn routes(querier: Arc<Querier>) -> Router {
    Router::new()
        .route("/api/traces/{trace_id}", get(find_trace))
        .with_state(querier)
}
