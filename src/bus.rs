//! Message envelope and the capabilities the bus consumes from this crate.
//!
//! The bus itself (transport, queueing, retries) lives elsewhere. It only
//! needs two things from a subscriber-side component:
//!
//! - [`RequestFilter`]: decides whether a request is delivered to a subscriber
//! - [`RequestTransformer`]: rewrites a request immediately before dispatch
//!
//! Both return `Result`. A filter that fails has not said "no"; the dispatch
//! layer decides what a failure means.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message flowing through the bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Unique message identifier
    pub id: Uuid,
    /// Routing topic (e.g., "orders.created")
    pub topic: String,
    /// String headers, ordered for stable serialization
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Application payload
    #[serde(default)]
    pub body: serde_json::Value,
    /// UTC time the request was published
    pub created_at: DateTime<Utc>,
}

impl Request {
    /// Create a request with a fresh id, no headers and the current time.
    pub fn new(topic: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            headers: BTreeMap::new(),
            body,
            created_at: Utc::now(),
        }
    }

    /// Builder-style header setter.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Predicate admitting or rejecting delivery of a request to a subscriber.
///
/// Implementations must tolerate concurrent calls on one instance.
pub trait RequestFilter: Send + Sync {
    /// Failure raised when no decision could be made.
    type Error: std::error::Error + Send + Sync + 'static;

    /// `true` to deliver the request, `false` to skip it.
    fn include(&self, request: &Request) -> Result<bool, Self::Error>;
}

/// Pipeline stage rewriting a request before delivery.
///
/// Implementations must tolerate concurrent calls on one instance.
pub trait RequestTransformer: Send + Sync {
    /// Failure raised when no output request could be produced.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Consume `request` and return the one to dispatch.
    fn transform(&self, request: Request) -> Result<Request, Self::Error>;
}
