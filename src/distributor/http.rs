use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use crate::distributor::{Distributor, DistributorError};
use crate::model::PushRequest;
use crate::ring::RingError;
use crate::security::OrgId;

impl IntoResponse for DistributorError {
    fn into_response(self) -> Response {
        let status = match &self {
            DistributorError::NoSpans | DistributorError::TooManySpans { .. } => {
                StatusCode::BAD_REQUEST
            }
            DistributorError::Ring(RingError::Empty) => StatusCode::SERVICE_UNAVAILABLE,
            DistributorError::Ring(_) | DistributorError::Quorum { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

async fn push(
    State(distributor): State<Arc<Distributor>>,
    org: OrgId,
    Json(req): Json<PushRequest>,
) -> Result<StatusCode, DistributorError> {
    distributor.push(&org, req).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/traces`, behind the auth middleware.
pub fn routes(distributor: Arc<Distributor>) -> Router {
    Router::new()
        .route("/api/traces", post(push))
        .with_state(distributor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status() {
        assert_eq!(
            DistributorError::NoSpans.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            DistributorError::Ring(RingError::Empty).into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
