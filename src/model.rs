//! Wire types shared by the distributor, ingester and querier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const MAX_TRACE_ID_DIGITS: usize = 32;

/// 128-bit trace id, rendered as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TraceId(u128);

impl TraceId {
    pub fn new(id: u128) -> Self {
        Self(id)
    }

    pub fn to_be_bytes(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TraceIdError {
    #[error("trace id is empty")]
    Empty,

    #[error("trace id has {0} hex digits, at most {max} allowed", max = MAX_TRACE_ID_DIGITS)]
    TooLong(usize),

    #[error("trace id is not hexadecimal")]
    NotHex,
}

impl FromStr for TraceId {
    type Err = TraceIdError;

    /// Shorter ids are left-padded with zeros, as clients commonly trim them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TraceIdError::Empty);
        }
        if s.len() > MAX_TRACE_ID_DIGITS {
            return Err(TraceIdError::TooLong(s.len()));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TraceIdError::NotHex);
        }
        u128::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| TraceIdError::NotHex)
    }
}

impl TryFrom<String> for TraceId {
    type Error = TraceIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TraceId> for String {
    fn from(id: TraceId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Spans of one trace sent by a client. Spans are opaque JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub trace_id: TraceId,
    pub spans: Vec<Value>,
}

/// Everything known about one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub trace_id: TraceId,
    pub spans: Vec<Value>,
}

impl Trace {
    pub fn new(trace_id: TraceId) -> Self {
        Self {
            trace_id,
            spans: Vec::new(),
        }
    }

    /// Append spans not already present. Replicas hold overlapping copies.
    pub fn merge_spans(&mut self, spans: impl IntoIterator<Item = Value>) {
        for span in spans {
            if !self.spans.contains(&span) {
                self.spans.push(span);
            }
        }
    }
}
