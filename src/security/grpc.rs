//! gRPC authentication hooks.
//!
//! # Responsibilities
//! - Unary and streaming interceptors usable with tonic services
//! - A tower layer that applies the right interceptor per gRPC method path
//!
//! # Design Decisions
//! - Both interceptors resolve the tenant once, at call start
//! - Rejections are `Unauthenticated` statuses, never transport errors
//! - The resolved [`OrgId`] travels in request extensions

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use futures_util::future::BoxFuture;
use tonic::service::Interceptor;
use tonic::Status;
use tower::{Layer, Service};

use crate::security::auth::{AuthStrategy, OrgId, ORG_ID_HEADER};

fn from_headers(strategy: &dyn AuthStrategy, headers: &HeaderMap) -> Result<OrgId, Status> {
    let org_id = headers.get(ORG_ID_HEADER).and_then(|v| v.to_str().ok());
    strategy.authenticate(org_id).map_err(|e| e.into_status())
}

fn intercept(
    strategy: &dyn AuthStrategy,
    kind: &'static str,
    mut request: tonic::Request<()>,
) -> Result<tonic::Request<()>, Status> {
    let org_id = request
        .metadata()
        .get(ORG_ID_HEADER)
        .and_then(|v| v.to_str().ok());
    match strategy.authenticate(org_id) {
        Ok(org) => {
            request.extensions_mut().insert(org);
            Ok(request)
        }
        Err(e) => {
            tracing::debug!(kind, error = %e, "rejecting gRPC call");
            Err(e.into_status())
        }
    }
}

/// Interceptor for unary gRPC calls.
#[derive(Clone)]
pub struct UnaryAuthInterceptor {
    strategy: Arc<dyn AuthStrategy>,
}

impl UnaryAuthInterceptor {
    pub fn new(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Resolve the tenant from raw HTTP/2 request headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<OrgId, Status> {
        from_headers(self.strategy.as_ref(), headers)
    }
}

impl Interceptor for UnaryAuthInterceptor {
    fn call(&mut self, request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        intercept(self.strategy.as_ref(), "unary", request)
    }
}

impl fmt::Debug for UnaryAuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("UnaryAuthInterceptor")
            .field(&self.strategy.name())
            .finish()
    }
}

/// Interceptor for streaming gRPC calls, run once when the stream opens.
#[derive(Clone)]
pub struct StreamAuthInterceptor {
    strategy: Arc<dyn AuthStrategy>,
}

impl StreamAuthInterceptor {
    pub fn new(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn authenticate(&self, headers: &HeaderMap) -> Result<OrgId, Status> {
        from_headers(self.strategy.as_ref(), headers)
    }
}

impl Interceptor for StreamAuthInterceptor {
    fn call(&mut self, request: tonic::Request<()>) -> Result<tonic::Request<()>, Status> {
        intercept(self.strategy.as_ref(), "stream", request)
    }
}

impl fmt::Debug for StreamAuthInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StreamAuthInterceptor")
            .field(&self.strategy.name())
            .finish()
    }
}

/// Applies the unary or stream interceptor depending on the method path.
#[derive(Clone, Debug)]
pub struct GrpcAuthLayer {
    unary: UnaryAuthInterceptor,
    stream: StreamAuthInterceptor,
    streaming_methods: Arc<HashSet<String>>,
}

impl GrpcAuthLayer {
    /// `streaming_methods` are full paths such as `/grpc.health.v1.Health/Watch`.
    pub fn new(
        unary: UnaryAuthInterceptor,
        stream: StreamAuthInterceptor,
        streaming_methods: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            unary,
            stream,
            streaming_methods: Arc::new(streaming_methods.into_iter().collect()),
        }
    }
}

impl<S> Layer<S> for GrpcAuthLayer {
    type Service = GrpcAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcAuth {
            inner,
            layer: self.clone(),
        }
    }
}

/// Service produced by [`GrpcAuthLayer`].
#[derive(Clone, Debug)]
pub struct GrpcAuth<S> {
    inner: S,
    layer: GrpcAuthLayer,
}

impl<S> Service<Request<Body>> for GrpcAuth<S>
where
    S: Service<Request<Body>, Response = Response<Body>, Error = Infallible>,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let streaming = self.layer.streaming_methods.contains(request.uri().path());
        let result = if streaming {
            self.layer.stream.authenticate(request.headers())
        } else {
            self.layer.unary.authenticate(request.headers())
        };

        match result {
            Ok(org) => {
                request.extensions_mut().insert(org);
                Box::pin(self.inner.call(request))
            }
            Err(status) => {
                tracing::debug!(
                    path = %request.uri().path(),
                    streaming,
                    error = %status.message(),
                    "rejecting gRPC call"
                );
                Box::pin(async move { Ok(status.into_http()) })
            }
        }
    }
}
