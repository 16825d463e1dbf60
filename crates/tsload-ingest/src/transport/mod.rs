//! Transport boundary to the database nodes
//!
//! The distributor only needs two operations from a node: accept a JSON
//! payload for a `(database, table)` binding, and flush whatever it has
//! buffered. Responses are interpreted as success or failure and nothing
//! more.

pub mod memory;
pub mod rest;

pub use memory::{MemoryTransport, SentUnit};
pub use rest::RestTransport;

use crate::binding::DestinationBinding;
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use async_trait::async_trait;

/// Write path to a set of nodes
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one serialized unit (a JSON object or a JSON array of objects).
    async fn put(
        &self,
        endpoint: &Endpoint,
        binding: &DestinationBinding,
        payload: String,
    ) -> Result<(), TransportError>;

    /// Ask `endpoint` to commit buffered rows.
    async fn flush(&self, endpoint: &Endpoint) -> Result<(), TransportError>;
}
