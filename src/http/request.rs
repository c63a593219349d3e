//! Request correlation.
//!
//! # Responsibilities
//! - Give every request an `x-request-id` (UUID v4) unless the caller sent one
//! - Echo the id on the response
//! - Open one tracing span per request carrying the id
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Caller-supplied ids are kept so traces line up across hops

use axum::{body::Body, http::Request, Router};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Span;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Extract the request id set by [`with_request_id`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
    }
}

fn make_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = request.request_id().unwrap_or("-"),
    )
}

/// Layer request ids and a per-request trace span onto `router`.
///
/// Layers run outside-in, so the id is set before the span is opened.
pub fn with_request_id(router: Router) -> Router {
    router
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(make_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
