//! HTTP client used by distributors and queriers to reach ingesters.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::IngesterClientConfig;
use crate::model::{PushRequest, Trace, TraceId};
use crate::security::{OrgId, ORG_ID_HEADER};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("invalid ingester address {addr}: {source}")]
    InvalidAddr {
        addr: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("ingester at {url} answered {status}: {body}")]
    Status {
        url: Url,
        status: StatusCode,
        body: String,
    },
}

/// Shared connection pool to every ingester.
#[derive(Debug, Clone)]
pub struct IngesterClient {
    http: reqwest::Client,
}

impl IngesterClient {
    pub fn new(config: &IngesterClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.remote_timeout_secs))
            .no_proxy()
            .build()
            .map_err(ClientError::Build)?;
        Ok(Self { http })
    }

    pub async fn push(&self, addr: &str, org: &OrgId, req: &PushRequest) -> Result<(), ClientError> {
        let url = endpoint(addr, "ingester/push")?;
        let response = self
            .http
            .post(url.clone())
            .header(ORG_ID_HEADER, org.as_str())
            .json(req)
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(status_error(url, response).await)
    }

    /// `Ok(None)` when the ingester holds no spans for the trace.
    pub async fn find_trace(
        &self,
        addr: &str,
        org: &OrgId,
        trace_id: TraceId,
    ) -> Result<Option<Trace>, ClientError> {
        let url = endpoint(addr, &format!("ingester/traces/{trace_id}"))?;
        let response = self
            .http
            .get(url.clone())
            .header(ORG_ID_HEADER, org.as_str())
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Trace>()
                .await
                .map(Some)
                .map_err(|source| ClientError::Transport { url, source }),
            _ => Err(status_error(url, response).await),
        }
    }
}

fn endpoint(addr: &str, path: &str) -> Result<Url, ClientError> {
    let invalid = |source| ClientError::InvalidAddr {
        addr: addr.to_string(),
        source,
    };
    Url::parse(addr).and_then(|base| base.join(path)).map_err(invalid)
}

async fn status_error(url: Url, response: reqwest::Response) -> ClientError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ClientError::Status { url, status, body }
}
