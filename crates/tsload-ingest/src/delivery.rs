//! Delivery policy: how one file's records reach the endpoint pool
//!
//! - **Batch**: every record goes out in a single JSON array to one randomly
//!   chosen endpoint.
//! - **Per-row**: each record is its own unit. The first goes to a random
//!   endpoint and every following one to a random endpoint *other than* the
//!   previous, so consecutive rows of a file never share an endpoint while
//!   the pool has more than one member.
//!
//! Units are sent strictly one after another in record order. The first
//! failed send stops delivery for the file; nothing is retried.

use crate::binding::DestinationBinding;
use crate::endpoint::{Endpoint, EndpointPool};
use crate::error::{IngestError, Result};
use crate::source::Record;
use crate::transport::Transport;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// How records are grouped into units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    /// One unit per record
    #[default]
    PerRow,
    /// One unit holding every record of the file
    Batch,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMode::PerRow => f.write_str("per-row"),
            DeliveryMode::Batch => f.write_str("batch"),
        }
    }
}

/// What a successful delivery sent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryReport {
    /// Target endpoint of each unit, in dispatch order
    pub unit_endpoints: Vec<Endpoint>,
    /// Records carried across all units
    pub records: usize,
}

impl DeliveryReport {
    pub fn units(&self) -> usize {
        self.unit_endpoints.len()
    }

    /// Endpoints that received at least one unit, in first-use order
    pub fn distinct_endpoints(&self) -> Vec<Endpoint> {
        let mut distinct: Vec<Endpoint> = Vec::new();
        for endpoint in &self.unit_endpoints {
            if !distinct.contains(endpoint) {
                distinct.push(endpoint.clone());
            }
        }
        distinct
    }
}

/// Send `records` to `pool` according to `mode`.
///
/// An empty slice sends nothing and succeeds.
pub async fn deliver<T, R>(
    records: &[Record],
    pool: &EndpointPool,
    binding: &DestinationBinding,
    mode: DeliveryMode,
    transport: &T,
    rng: &mut R,
) -> Result<DeliveryReport>
where
    T: Transport + ?Sized,
    R: Rng + ?Sized,
{
    if records.is_empty() {
        return Ok(DeliveryReport::default());
    }

    match mode {
        DeliveryMode::Batch => deliver_batch(records, pool, binding, transport, rng).await,
        DeliveryMode::PerRow => deliver_rows(records, pool, binding, transport, rng).await,
    }
}

async fn deliver_batch<T, R>(
    records: &[Record],
    pool: &EndpointPool,
    binding: &DestinationBinding,
    transport: &T,
    rng: &mut R,
) -> Result<DeliveryReport>
where
    T: Transport + ?Sized,
    R: Rng + ?Sized,
{
    let payload = serde_json::to_string(records)?;
    let endpoint = pool.pick_any(rng).clone();

    debug!(
        endpoint = %endpoint,
        binding = %binding,
        records = records.len(),
        bytes = payload.len(),
        "Sending batch"
    );

    send(transport, 0, &endpoint, binding, payload).await?;

    Ok(DeliveryReport {
        unit_endpoints: vec![endpoint],
        records: records.len(),
    })
}

async fn deliver_rows<T, R>(
    records: &[Record],
    pool: &EndpointPool,
    binding: &DestinationBinding,
    transport: &T,
    rng: &mut R,
) -> Result<DeliveryReport>
where
    T: Transport + ?Sized,
    R: Rng + ?Sized,
{
    let mut unit_endpoints: Vec<Endpoint> = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let endpoint = match unit_endpoints.last() {
            None => pool.pick_any(rng),
            Some(previous) => pool.pick_different(previous, rng),
        }
        .clone();

        let payload = serde_json::to_string(record)?;
        trace!(index, endpoint = %endpoint, "Sending row");

        send(transport, index, &endpoint, binding, payload).await?;
        unit_endpoints.push(endpoint);
    }

    debug!(
        binding = %binding,
        rows = records.len(),
        "Rows delivered"
    );

    Ok(DeliveryReport {
        records: unit_endpoints.len(),
        unit_endpoints,
    })
}

async fn send<T: Transport + ?Sized>(
    transport: &T,
    index: usize,
    endpoint: &Endpoint,
    binding: &DestinationBinding,
    payload: String,
) -> Result<()> {
    transport
        .put(endpoint, binding, payload)
        .await
        .map_err(|source| IngestError::DeliveryFailed {
            index,
            endpoint: endpoint.clone(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::endpoint::parse_endpoint_list;
    use crate::transport::MemoryTransport;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn pool(list: &str) -> EndpointPool {
        EndpointPool::new(parse_endpoint_list(list).unwrap()).unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| json!({ "row": i }).as_object().unwrap().clone())
            .collect()
    }

    fn binding() -> DestinationBinding {
        DestinationBinding::new("db1", "users")
    }

    #[tokio::test]
    async fn test_per_row_sends_one_unit_per_record_in_order() {
        let transport = MemoryTransport::new();
        let mut rng = StdRng::seed_from_u64(11);
        let report = deliver(
            &records(6),
            &pool("a:1,b:2,c:3"),
            &binding(),
            DeliveryMode::PerRow,
            &transport,
            &mut rng,
        )
        .await
        .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 6);
        assert_eq!(report.units(), 6);
        assert_eq!(report.records, 6);
        for (i, unit) in sent.iter().enumerate() {
            assert_eq!(unit.json(), json!({ "row": i }));
            assert_eq!(unit.binding, binding());
            assert_eq!(unit.endpoint, report.unit_endpoints[i]);
        }
    }

    #[tokio::test]
    async fn test_per_row_never_repeats_endpoint_consecutively() {
        for seed in 0..20 {
            let transport = MemoryTransport::new();
            let mut rng = StdRng::seed_from_u64(seed);
            deliver(
                &records(50),
                &pool("a:1,b:2"),
                &binding(),
                DeliveryMode::PerRow,
                &transport,
                &mut rng,
            )
            .await
            .unwrap();

            let sent = transport.sent();
            for pair in sent.windows(2) {
                assert_ne!(pair[0].endpoint, pair[1].endpoint);
            }
        }
    }

    #[tokio::test]
    async fn test_single_endpoint_gets_every_row_separately() {
        let transport = MemoryTransport::new();
        let mut rng = StdRng::seed_from_u64(5);
        deliver(
            &records(4),
            &pool("solo:1"),
            &binding(),
            DeliveryMode::PerRow,
            &transport,
            &mut rng,
        )
        .await
        .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|u| u.endpoint.as_str() == "solo:1"));
        assert!(sent.iter().all(|u| u.json().is_object()));
    }

    #[tokio::test]
    async fn test_batch_sends_single_array() {
        let transport = MemoryTransport::new();
        let mut rng = StdRng::seed_from_u64(9);
        let report = deliver(
            &records(5),
            &pool("solo:1"),
            &binding(),
            DeliveryMode::Batch,
            &transport,
            &mut rng,
        )
        .await
        .unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint.as_str(), "solo:1");
        let array = sent[0].json();
        let array = array.as_array().unwrap();
        assert_eq!(array.len(), 5);
        assert_eq!(array[3], json!({ "row": 3 }));
        assert_eq!(report.units(), 1);
        assert_eq!(report.records, 5);
    }

    #[tokio::test]
    async fn test_empty_sequence_sends_nothing() {
        for mode in [DeliveryMode::PerRow, DeliveryMode::Batch] {
            let transport = MemoryTransport::new();
            let mut rng = StdRng::seed_from_u64(1);
            let report = deliver(&[], &pool("a:1,b:2"), &binding(), mode, &transport, &mut rng)
                .await
                .unwrap();
            assert_eq!(report, DeliveryReport::default());
            assert!(transport.sent().is_empty());
        }
    }

    #[tokio::test]
    async fn test_failed_send_stops_delivery() {
        let transport = MemoryTransport::new().fail_after(3);
        let mut rng = StdRng::seed_from_u64(2);
        let err = deliver(
            &records(10),
            &pool("a:1,b:2"),
            &binding(),
            DeliveryMode::PerRow,
            &transport,
            &mut rng,
        )
        .await
        .unwrap_err();

        match err {
            IngestError::DeliveryFailed { index, .. } => assert_eq!(index, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.sent().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_send_names_target_endpoint() {
        let bad: Endpoint = "bad:1".parse().unwrap();
        let transport = MemoryTransport::new().fail_endpoint(bad.clone());
        let mut rng = StdRng::seed_from_u64(4);
        let err = deliver(
            &records(3),
            &pool("bad:1"),
            &binding(),
            DeliveryMode::Batch,
            &transport,
            &mut rng,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            IngestError::DeliveryFailed { index: 0, ref endpoint, .. } if *endpoint == bad
        ));
    }

    #[test]
    fn test_distinct_endpoints_keep_first_use_order() {
        let report = DeliveryReport {
            unit_endpoints: parse_endpoint_list("b:2,a:1,b:2,c:3,a:1").unwrap(),
            records: 5,
        };
        let distinct: Vec<String> = report
            .distinct_endpoints()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(distinct, vec!["b:2", "a:1", "c:3"]);
    }
}
