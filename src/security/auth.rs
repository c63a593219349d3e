//! Request authentication strategies.
//!
//! Exactly one strategy is chosen at startup from `auth_enabled` and shared
//! by the gRPC unary interceptor, the gRPC stream interceptor and the HTTP
//! middleware. Call sites never branch on the flag themselves.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::security::access_control::HttpAuth;
use crate::security::grpc::{StreamAuthInterceptor, UnaryAuthInterceptor};

/// Header (and gRPC metadata key) carrying the tenant id.
pub const ORG_ID_HEADER: &str = "x-scope-orgid";

/// Tenant id injected when authentication is disabled.
pub const FAKE_ORG_ID: &str = "fake";

const MAX_ORG_ID_LEN: usize = 150;

/// Authenticated tenant identity, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrgId(String);

impl OrgId {
    /// Validate and wrap a raw tenant id.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::MissingOrgId);
        }
        if raw.len() > MAX_ORG_ID_LEN {
            return Err(AuthError::InvalidOrgId(format!(
                "longer than {MAX_ORG_ID_LEN} characters"
            )));
        }
        if let Some(c) = raw.chars().find(|c| !is_valid_org_char(*c)) {
            return Err(AuthError::InvalidOrgId(format!("unsupported character {c:?}")));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_org_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '!' | '-' | '_' | '.' | '*' | '\'' | '(' | ')')
}

impl fmt::Display for OrgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no org id")]
    MissingOrgId,

    #[error("invalid org id: {0}")]
    InvalidOrgId(String),
}

impl AuthError {
    /// gRPC form of the rejection.
    pub fn into_status(self) -> tonic::Status {
        tonic::Status::unauthenticated(self.to_string())
    }
}

/// Resolves the caller's tenant from the raw org-id value, if any.
pub trait AuthStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn authenticate(&self, org_id: Option<&str>) -> Result<OrgId, AuthError>;
}

/// Requires every call to carry a valid `X-Scope-OrgID`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequireOrgId;

impl AuthStrategy for RequireOrgId {
    fn name(&self) -> &'static str {
        "org-id"
    }

    fn authenticate(&self, org_id: Option<&str>) -> Result<OrgId, AuthError> {
        OrgId::parse(org_id.ok_or(AuthError::MissingOrgId)?)
    }
}

/// Lets every call through as the placeholder tenant.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeOrgId;

impl AuthStrategy for FakeOrgId {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn authenticate(&self, _org_id: Option<&str>) -> Result<OrgId, AuthError> {
        Ok(OrgId(FAKE_ORG_ID.to_string()))
    }
}

/// The three request hooks handed to the server module.
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    pub grpc_unary: UnaryAuthInterceptor,
    pub grpc_stream: StreamAuthInterceptor,
    pub http: HttpAuth,
}

impl AuthMiddleware {
    fn from_strategy(strategy: Arc<dyn AuthStrategy>) -> Self {
        Self {
            grpc_unary: UnaryAuthInterceptor::new(strategy.clone()),
            grpc_stream: StreamAuthInterceptor::new(strategy.clone()),
            http: HttpAuth::new(strategy),
        }
    }
}

/// Pick the authentication bundle. Pure and infallible.
pub fn select(auth_enabled: bool) -> AuthMiddleware {
    let strategy: Arc<dyn AuthStrategy> = if auth_enabled {
        Arc::new(RequireOrgId)
    } else {
        Arc::new(FakeOrgId)
    };
    tracing::debug!(strategy = strategy.name(), "auth strategy selected");
    AuthMiddleware::from_strategy(strategy)
}
