//! Write path: validate a push and replicate it to the trace's ingesters.
//!
//! # Data Flow
//! ```text
//! POST /api/traces (OrgId, PushRequest)
//!     → validate span count
//!     → token_for(org, trace_id) → ring.get → ReplicationSet
//!     → IngesterClient::push to every replica, concurrently
//!     → success once quorum replicas accepted
//! ```

pub mod http;

use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;

use crate::config::DistributorConfig;
use crate::ingester::{ClientError, IngesterClient};
use crate::model::PushRequest;
use crate::observability::metrics;
use crate::ring::{token_for, Ring, RingError};
use crate::security::OrgId;

#[derive(Debug, Error)]
pub enum DistributorError {
    #[error("push contains no spans")]
    NoSpans,

    #[error("push contains {count} spans, limit is {limit}")]
    TooManySpans { count: usize, limit: usize },

    #[error(transparent)]
    Ring(#[from] RingError),

    #[error("only {succeeded} of {required} required replicas accepted the push: {last_error}")]
    Quorum {
        succeeded: usize,
        required: usize,
        last_error: ClientError,
    },
}

#[derive(Debug)]
pub struct Distributor {
    ring: Arc<Ring>,
    client: IngesterClient,
    max_spans_per_push: usize,
}

impl Distributor {
    pub fn new(config: &DistributorConfig, ring: Arc<Ring>, client: IngesterClient) -> Self {
        Self {
            ring,
            client,
            max_spans_per_push: config.max_spans_per_push,
        }
    }

    /// Replicate `req` and return how many ingesters accepted it.
    pub async fn push(&self, org: &OrgId, req: PushRequest) -> Result<usize, DistributorError> {
        let spans = req.spans.len();
        let result = self.replicate(org, &req).await;
        let outcome = match &result {
            Ok(_) => "success",
            Err(DistributorError::NoSpans | DistributorError::TooManySpans { .. }) => "rejected",
            Err(_) => "failed",
        };
        metrics::record_push(outcome, spans);
        result
    }

    async fn replicate(&self, org: &OrgId, req: &PushRequest) -> Result<usize, DistributorError> {
        if req.spans.is_empty() {
            return Err(DistributorError::NoSpans);
        }
        if req.spans.len() > self.max_spans_per_push {
            return Err(DistributorError::TooManySpans {
                count: req.spans.len(),
                limit: self.max_spans_per_push,
            });
        }

        let replicas = self.ring.get(token_for(org, req.trace_id))?;
        let required = replicas.quorum();

        let results = join_all(
            replicas
                .instances
                .iter()
                .map(|instance| self.client.push(&instance.addr, org, req)),
        )
        .await;

        let mut succeeded = 0;
        let mut last_error = None;
        for (instance, result) in replicas.instances.iter().zip(results) {
            match result {
                Ok(()) => succeeded += 1,
                Err(e) => {
                    tracing::warn!(instance = %instance.id, org = %org, error = %e, "push to ingester failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(last_error) if succeeded < required => Err(DistributorError::Quorum {
                succeeded,
                required,
                last_error,
            }),
            _ => {
                tracing::debug!(org = %org, trace_id = %req.trace_id, replicas = succeeded, "push accepted");
                Ok(succeeded)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngesterClientConfig, RingConfig};
    use crate::model::TraceId;
    use crate::ring::{InstanceDesc, InstanceState};
    use serde_json::json;

    fn distributor(max_spans: usize) -> (Arc<Ring>, Distributor) {
        let ring = Arc::new(Ring::new(&RingConfig::default()));
        let client = IngesterClient::new(&IngesterClientConfig {
            remote_timeout_secs: 1,
        })
        .unwrap();
        let config = DistributorConfig {
            max_spans_per_push: max_spans,
        };
        (ring.clone(), Distributor::new(&config, ring, client))
    }

    fn request(spans: usize) -> PushRequest {
        PushRequest {
            trace_id: TraceId::new(7),
            spans: (0..spans).map(|i| json!({ "span_id": i })).collect(),
        }
    }

    #[tokio::test]
    async fn test_rejects_span_counts() {
        let (_, distributor) = distributor(2);
        let org = OrgId::parse("a").unwrap();

        assert!(matches!(
            distributor.push(&org, request(0)).await,
            Err(DistributorError::NoSpans)
        ));
        assert!(matches!(
            distributor.push(&org, request(3)).await,
            Err(DistributorError::TooManySpans { count: 3, limit: 2 })
        ));
    }

    #[tokio::test]
    async fn test_empty_ring() {
        let (_, distributor) = distributor(10);
        let org = OrgId::parse("a").unwrap();
        assert!(matches!(
            distributor.push(&org, request(1)).await,
            Err(DistributorError::Ring(RingError::Empty))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_replica_misses_quorum() {
        let (ring, distributor) = distributor(10);
        ring.register(InstanceDesc {
            id: "down".into(),
            addr: "http://127.0.0.1:9".into(),
            tokens: vec![1],
            state: InstanceState::Active,
        })
        .unwrap();

        let org = OrgId::parse("a").unwrap();
        let err = distributor.push(&org, request(1)).await.unwrap_err();
        assert!(matches!(
            err,
            DistributorError::Quorum {
                succeeded: 0,
                required: 1,
                ..
            }
        ));
    }
}
