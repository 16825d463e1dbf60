//! In-memory transport
//!
//! Keeps every unit it is given instead of sending it anywhere. Backs the
//! `--dry-run` mode and lets tests inspect exactly what was dispatched, in
//! which order, to which endpoint. Failures can be injected per endpoint or
//! after a number of successful writes.

use super::Transport;
use crate::binding::DestinationBinding;
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// One unit accepted by a [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct SentUnit {
    pub endpoint: Endpoint,
    pub binding: DestinationBinding,
    pub payload: String,
}

impl SentUnit {
    /// Parse the payload back into JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Debug, Default)]
struct State {
    sent: Vec<SentUnit>,
    flushed: Vec<Endpoint>,
    failing: HashSet<Endpoint>,
    failing_flush: HashSet<Endpoint>,
    fail_after: Option<usize>,
}

/// Transport that records units in memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write and flush aimed at `endpoint`.
    pub fn fail_endpoint(self, endpoint: Endpoint) -> Self {
        self.lock().failing.insert(endpoint);
        self
    }

    /// Accept writes to `endpoint` but reject flushing it.
    pub fn fail_flush(self, endpoint: Endpoint) -> Self {
        self.lock().failing_flush.insert(endpoint);
        self
    }

    /// Accept `count` writes in total, then reject the rest.
    pub fn fail_after(self, count: usize) -> Self {
        self.lock().fail_after = Some(count);
        self
    }

    /// Every accepted unit, in arrival order
    pub fn sent(&self) -> Vec<SentUnit> {
        self.lock().sent.clone()
    }

    /// Accepted units for one table, in arrival order
    pub fn sent_to_table(&self, table: &str) -> Vec<SentUnit> {
        self.lock()
            .sent
            .iter()
            .filter(|unit| unit.binding.table == table)
            .cloned()
            .collect()
    }

    /// Every successful flush, in arrival order
    pub fn flushed(&self) -> Vec<Endpoint> {
        self.lock().flushed.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave State half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn put(
        &self,
        endpoint: &Endpoint,
        binding: &DestinationBinding,
        payload: String,
    ) -> Result<(), TransportError> {
        let mut state = self.lock();

        if state.failing.contains(endpoint) {
            return Err(TransportError::Rejected(format!(
                "endpoint {} is marked as failing",
                endpoint
            )));
        }
        if state.fail_after.is_some_and(|limit| state.sent.len() >= limit) {
            return Err(TransportError::Rejected(format!(
                "write limit of {} units reached",
                state.sent.len()
            )));
        }

        state.sent.push(SentUnit {
            endpoint: endpoint.clone(),
            binding: binding.clone(),
            payload,
        });
        Ok(())
    }

    async fn flush(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.failing.contains(endpoint) || state.failing_flush.contains(endpoint) {
            return Err(TransportError::Rejected(format!(
                "flush of {} is marked as failing",
                endpoint
            )));
        }
        state.flushed.push(endpoint.clone());
        Ok(())
    }
}
