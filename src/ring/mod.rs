//! In-memory token ring of ingester instances.
//!
//! # Data Flow
//! ```text
//! Ingester init  → register(InstanceDesc { tokens })
//! Distributor    → token_for(org, trace) → get(token) → ReplicationSet
//! Querier        → token_for(org, trace) → get(token) → ReplicationSet
//! Ingester stop  → set_state(Leaving) → unregister
//! ```
//!
//! # Design Decisions
//! - Instances live in a `DashMap`; the sorted token list is rebuilt per lookup
//! - Only `Active` instances own tokens during a lookup
//! - Process-local: there is no gossip or KV store behind this ring

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use crate::config::RingConfig;
use crate::model::TraceId;
use crate::security::OrgId;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Active,
    Leaving,
}

/// One ingester as seen by the ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceDesc {
    pub id: String,
    /// Base URL the ingester client talks to.
    pub addr: String,
    pub tokens: Vec<u32>,
    pub state: InstanceState,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RingError {
    #[error("empty ring")]
    Empty,

    #[error("instance {0} already registered")]
    AlreadyRegistered(String),

    #[error("instance {0} not found")]
    UnknownInstance(String),
}

/// Instances responsible for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSet {
    pub instances: Vec<InstanceDesc>,
    replication_factor: usize,
}

impl ReplicationSet {
    /// Successful replica calls needed for a write to count.
    pub fn quorum(&self) -> usize {
        (self.replication_factor / 2 + 1).min(self.instances.len())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Debug)]
pub struct Ring {
    instances: DashMap<String, InstanceDesc>,
    replication_factor: usize,
}

impl Ring {
    pub fn new(config: &RingConfig) -> Self {
        Self {
            instances: DashMap::new(),
            replication_factor: config.replication_factor.max(1),
        }
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn register(&self, desc: InstanceDesc) -> Result<(), RingError> {
        use dashmap::mapref::entry::Entry;

        match self.instances.entry(desc.id.clone()) {
            Entry::Occupied(_) => Err(RingError::AlreadyRegistered(desc.id)),
            Entry::Vacant(slot) => {
                tracing::info!(instance = %desc.id, addr = %desc.addr, tokens = desc.tokens.len(), "instance joined ring");
                slot.insert(desc);
                Ok(())
            }
        }
    }

    pub fn set_state(&self, id: &str, state: InstanceState) -> Result<(), RingError> {
        let mut desc = self
            .instances
            .get_mut(id)
            .ok_or_else(|| RingError::UnknownInstance(id.to_string()))?;
        desc.state = state;
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> Option<InstanceDesc> {
        let removed = self.instances.remove(id).map(|(_, desc)| desc);
        if removed.is_some() {
            tracing::info!(instance = %id, "instance left ring");
        }
        removed
    }

    /// Walk clockwise from `token`, collecting distinct active instances
    /// until the replication factor is reached.
    pub fn get(&self, token: u32) -> Result<ReplicationSet, RingError> {
        let mut owners: Vec<(u32, String)> = self
            .instances
            .iter()
            .filter(|entry| entry.state == InstanceState::Active)
            .flat_map(|entry| {
                let id = entry.id.clone();
                entry
                    .tokens
                    .iter()
                    .map(move |t| (*t, id.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        if owners.is_empty() {
            return Err(RingError::Empty);
        }
        owners.sort_unstable();

        let start = owners.partition_point(|(t, _)| *t < token);
        let mut picked: Vec<String> = Vec::with_capacity(self.replication_factor);
        for i in 0..owners.len() {
            let (_, id) = &owners[(start + i) % owners.len()];
            if !picked.contains(id) {
                picked.push(id.clone());
                if picked.len() == self.replication_factor {
                    break;
                }
            }
        }

        let instances = picked
            .iter()
            .filter_map(|id| self.instances.get(id).map(|d| d.clone()))
            .collect();
        Ok(ReplicationSet {
            instances,
            replication_factor: self.replication_factor,
        })
    }

    /// Every registered instance, sorted by id.
    pub fn instances(&self) -> Vec<InstanceDesc> {
        let mut all: Vec<_> = self.instances.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }
}

/// Ring token owning a tenant's trace: FNV-1a over org id then trace id.
pub fn token_for(org: &OrgId, trace_id: TraceId) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in org.as_str().bytes().chain(trace_id.to_be_bytes()) {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// `n` distinct random tokens, sorted.
pub fn random_tokens(n: u32) -> Vec<u32> {
    let mut tokens = Vec::with_capacity(n as usize);
    while tokens.len() < n as usize {
        let token = fastrand::u32(..);
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens.sort_unstable();
    tokens
}

#[derive(Serialize)]
struct RingStatus {
    replication_factor: usize,
    instances: Vec<InstanceDesc>,
}

async fn ring_status(State(ring): State<Arc<Ring>>) -> Json<RingStatus> {
    Json(RingStatus {
        replication_factor: ring.replication_factor(),
        instances: ring.instances(),
    })
}

/// `GET /ring`.
pub fn routes(ring: Arc<Ring>) -> Router {
    Router::new()
        .route("/ring", get(ring_status))
        .with_state(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn instance(id: &str, tokens: &[u32]) -> InstanceDesc {
        InstanceDesc {
            id: id.to_string(),
            addr: format!("http://{id}"),
            tokens: tokens.to_vec(),
            state: InstanceState::Active,
        }
    }

    fn ring(rf: usize) -> Ring {
        Ring::new(&RingConfig {
            replication_factor: rf,
        })
    }

    fn ids(set: &ReplicationSet) -> Vec<&str> {
        set.instances.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_empty_ring() {
        assert_eq!(ring(1).get(42), Err(RingError::Empty));
    }

    #[test]
    fn test_walks_clockwise_and_wraps() {
        let ring = ring(2);
        ring.register(instance("a", &[10, 40])).unwrap();
        ring.register(instance("b", &[20])).unwrap();
        ring.register(instance("c", &[30])).unwrap();

        assert_eq!(ids(&ring.get(15).unwrap()), ["b", "c"]);
        assert_eq!(ids(&ring.get(35).unwrap()), ["a", "b"]);
        // Past the last token wraps to the first.
        assert_eq!(ids(&ring.get(50).unwrap()), ["a", "b"]);
        // Exact token match belongs to that token's owner.
        assert_eq!(ids(&ring.get(30).unwrap()), ["c", "a"]);
    }

    #[test]
    fn test_replicas_are_distinct() {
        let ring = ring(3);
        ring.register(instance("a", &[1, 2, 3])).unwrap();
        ring.register(instance("b", &[4])).unwrap();

        let set = ring.get(0).unwrap();
        assert_eq!(ids(&set), ["a", "b"]);
        assert_eq!(set.quorum(), 2);
    }

    #[test]
    fn test_quorum() {
        let ring = ring(3);
        for (i, id) in ["a", "b", "c"].into_iter().enumerate() {
            ring.register(instance(id, &[i as u32 * 100])).unwrap();
        }
        let set = ring.get(0).unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.quorum(), 2);
    }

    #[test]
    fn test_leaving_instances_own_no_tokens() {
        let ring = ring(1);
        ring.register(instance("a", &[10])).unwrap();
        ring.register(instance("b", &[20])).unwrap();

        ring.set_state("a", InstanceState::Leaving).unwrap();
        assert_eq!(ids(&ring.get(5).unwrap()), ["b"]);

        assert!(ring.unregister("b").is_some());
        assert_eq!(ring.get(5), Err(RingError::Empty));
        assert_eq!(
            ring.set_state("b", InstanceState::Active),
            Err(RingError::UnknownInstance("b".into()))
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let ring = ring(1);
        ring.register(instance("a", &[1])).unwrap();
        assert_eq!(
            ring.register(instance("a", &[2])),
            Err(RingError::AlreadyRegistered("a".into()))
        );
    }

    #[test]
    fn test_token_for_is_stable_per_tenant() {
        let org = OrgId::parse("team-a").unwrap();
        let other = OrgId::parse("team-b").unwrap();
        let trace = TraceId::new(0xabc);

        assert_eq!(token_for(&org, trace), token_for(&org, trace));
        assert_ne!(token_for(&org, trace), token_for(&other, trace));
    }

    #[test]
    fn test_random_tokens() {
        let tokens = random_tokens(64);
        assert_eq!(tokens.len(), 64);
        assert!(tokens.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_ring_route() {
        let ring = Arc::new(ring(1));
        ring.register(instance("a", &[7])).unwrap();

        let response = routes(ring)
            .oneshot(Request::builder().uri("/ring").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["replication_factor"], 1);
        assert_eq!(body["instances"][0]["id"], "a");
        assert_eq!(body["instances"][0]["state"], "ACTIVE");
    }
}
