//! Read path: look a trace up on every replica and merge the answers.

pub mod http;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use thiserror::Error;

use crate::config::QuerierConfig;
use crate::ingester::{ClientError, IngesterClient};
use crate::model::{Trace, TraceId};
use crate::observability::metrics;
use crate::ring::{token_for, Ring, RingError};
use crate::security::OrgId;

#[derive(Debug, Error)]
pub enum QuerierError {
    #[error(transparent)]
    Ring(#[from] RingError),

    #[error("trace lookup exceeded {0:?}")]
    Timeout(Duration),

    #[error("no replica answered: {0}")]
    Ingester(#[source] ClientError),
}

#[derive(Debug)]
pub struct Querier {
    ring: Arc<Ring>,
    client: IngesterClient,
    query_timeout: Duration,
}

impl Querier {
    pub fn new(config: &QuerierConfig, ring: Arc<Ring>, client: IngesterClient) -> Self {
        Self {
            ring,
            client,
            query_timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    /// Merged trace from every replica, or `None` when no replica has it.
    ///
    /// Failing replicas are tolerated as long as one of them answers.
    pub async fn find_trace_by_id(
        &self,
        org: &OrgId,
        trace_id: TraceId,
    ) -> Result<Option<Trace>, QuerierError> {
        let start = Instant::now();
        let result = tokio::time::timeout(self.query_timeout, self.query_replicas(org, trace_id))
            .await
            .unwrap_or(Err(QuerierError::Timeout(self.query_timeout)));

        let outcome = match &result {
            Ok(Some(_)) => "found",
            Ok(None) => "not_found",
            Err(_) => "failed",
        };
        metrics::record_query(outcome, start);
        result
    }

    async fn query_replicas(
        &self,
        org: &OrgId,
        trace_id: TraceId,
    ) -> Result<Option<Trace>, QuerierError> {
        let replicas = self.ring.get(token_for(org, trace_id))?;

        let results = join_all(
            replicas
                .instances
                .iter()
                .map(|instance| self.client.find_trace(&instance.addr, org, trace_id)),
        )
        .await;

        let mut merged: Option<Trace> = None;
        let mut answered = false;
        let mut last_error = None;
        for (instance, result) in replicas.instances.iter().zip(results) {
            match result {
                Ok(found) => {
                    answered = true;
                    if let Some(trace) = found {
                        merged
                            .get_or_insert_with(|| Trace::new(trace_id))
                            .merge_spans(trace.spans);
                    }
                }
                Err(e) => {
                    tracing::warn!(instance = %instance.id, org = %org, error = %e, "trace lookup on ingester failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !answered => Err(QuerierError::Ingester(e)),
            _ => Ok(merged),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IngesterClientConfig, RingConfig};
    use crate::ring::{InstanceDesc, InstanceState};

    fn querier(ring: Arc<Ring>) -> Querier {
        let client = IngesterClient::new(&IngesterClientConfig {
            remote_timeout_secs: 1,
        })
        .unwrap();
        Querier::new(&QuerierConfig::default(), ring, client)
    }

    #[tokio::test]
    async fn test_empty_ring() {
        let querier = querier(Arc::new(Ring::new(&RingConfig::default())));
        let org = OrgId::parse("a").unwrap();
        assert!(matches!(
            querier.find_trace_by_id(&org, TraceId::new(1)).await,
            Err(QuerierError::Ring(RingError::Empty))
        ));
    }

    #[tokio::test]
    async fn test_every_replica_failing_is_an_error() {
        let ring = Arc::new(Ring::new(&RingConfig::default()));
        ring.register(InstanceDesc {
            id: "down".into(),
            addr: "http://127.0.0.1:9".into(),
            tokens: vec![1],
            state: InstanceState::Active,
        })
        .unwrap();

        let org = OrgId::parse("a").unwrap();
        assert!(matches!(
            querier(ring).find_trace_by_id(&org, TraceId::new(1)).await,
            Err(QuerierError::Ingester(_))
        ));
    }
}
