//! HTTP access control middleware.
//! Resolves the tenant of every authenticated HTTP request.

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};

use crate::security::auth::{AuthError, AuthStrategy, OrgId, ORG_ID_HEADER};

/// HTTP half of the selected auth bundle.
#[derive(Clone)]
pub struct HttpAuth {
    strategy: Arc<dyn AuthStrategy>,
}

impl HttpAuth {
    pub fn new(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Wrap every route of `router` in the org-id middleware.
    pub fn apply(&self, router: Router) -> Router {
        router.layer(middleware::from_fn_with_state(
            self.clone(),
            access_control_middleware,
        ))
    }
}

impl fmt::Debug for HttpAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HttpAuth").field(&self.strategy.name()).finish()
    }
}

pub async fn access_control_middleware(
    State(auth): State<HttpAuth>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let org_id = req
        .headers()
        .get(ORG_ID_HEADER)
        .and_then(|v| v.to_str().ok());

    match auth.strategy.authenticate(org_id) {
        Ok(org) => {
            req.extensions_mut().insert(org);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(path = %req.uri().path(), error = %e, "rejecting HTTP request");
            e.into_response()
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, self.to_string()).into_response()
    }
}

/// Handlers behind [`HttpAuth::apply`] extract the tenant directly.
impl<S: Send + Sync> FromRequestParts<S> for OrgId {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OrgId>()
            .cloned()
            .ok_or(AuthError::MissingOrgId)
    }
}
