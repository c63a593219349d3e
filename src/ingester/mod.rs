//! Per-tenant in-memory trace store.
//!
//! # Responsibilities
//! - Accept spans pushed by distributors and group them by trace
//! - Answer trace lookups from queriers
//! - Join the ring on construction and leave it on shutdown
//!
//! # Design Decisions
//! - One `DashMap` entry per tenant; a tenant's traces share its shard lock
//! - The live-trace limit is per tenant, checked only when a new trace starts
//! - Once shutdown begins, pushes are refused but lookups still answer

pub mod client;
pub mod http;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::IngesterConfig;
use crate::model::{PushRequest, Trace, TraceId};
use crate::observability::metrics;
use crate::ring::{random_tokens, InstanceDesc, InstanceState, Ring, RingError};
use crate::security::OrgId;

pub use client::{ClientError, IngesterClient};

#[derive(Debug, Error)]
pub enum IngesterError {
    #[error("tenant {org} exceeded {limit} live traces")]
    TooManyTraces { org: OrgId, limit: usize },

    #[error("ingester is shutting down")]
    Stopping,

    #[error("ring error: {0}")]
    Ring(#[from] RingError),
}

#[derive(Debug)]
pub struct Ingester {
    id: String,
    max_traces_per_user: usize,
    ring: Arc<Ring>,
    tenants: DashMap<OrgId, HashMap<TraceId, Trace>>,
    stopping: AtomicBool,
}

impl Ingester {
    /// Build the store and register in `ring`, reachable at `addr`.
    pub fn new(config: &IngesterConfig, ring: Arc<Ring>, addr: String) -> Result<Self, IngesterError> {
        let lifecycler = &config.lifecycler;
        let id = if lifecycler.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            lifecycler.id.clone()
        };

        ring.register(InstanceDesc {
            id: id.clone(),
            addr,
            tokens: random_tokens(lifecycler.num_tokens),
            state: InstanceState::Active,
        })?;

        Ok(Self {
            id,
            max_traces_per_user: config.max_traces_per_user,
            ring,
            tenants: DashMap::new(),
            stopping: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn push(&self, org: &OrgId, req: PushRequest) -> Result<(), IngesterError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(IngesterError::Stopping);
        }

        {
            let mut traces = self.tenants.entry(org.clone()).or_default();
            if !traces.contains_key(&req.trace_id) && traces.len() >= self.max_traces_per_user {
                return Err(IngesterError::TooManyTraces {
                    org: org.clone(),
                    limit: self.max_traces_per_user,
                });
            }
            traces
                .entry(req.trace_id)
                .or_insert_with(|| Trace::new(req.trace_id))
                .merge_spans(req.spans);
        }

        metrics::record_live_traces(self.live_traces());
        Ok(())
    }

    pub fn find_trace_by_id(&self, org: &OrgId, trace_id: TraceId) -> Option<Trace> {
        self.tenants
            .get(org)
            .and_then(|traces| traces.get(&trace_id).cloned())
    }

    /// Traces held across every tenant.
    pub fn live_traces(&self) -> usize {
        self.tenants.iter().map(|t| t.len()).sum()
    }

    /// Refuse further pushes and leave the ring. Safe to call twice.
    pub fn shutdown(&self) {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.ring.set_state(&self.id, InstanceState::Leaving) {
            tracing::warn!(instance = %self.id, error = %e, "failed to mark instance leaving");
        }
        self.ring.unregister(&self.id);
        tracing::info!(
            instance = %self.id,
            live_traces = self.live_traces(),
            "ingester stopped"
        );
    }
}
