//! Write endpoints and the pool they are drawn from
//!
//! An [`Endpoint`] is an opaque connection descriptor for one node that
//! accepts writes, either `host:port` or a full `http(s)://` URL. The
//! [`EndpointPool`] is built once per run and shared read-only by every
//! worker. Selection takes the random source as an argument, so choosing an
//! endpoint never touches shared state.

use crate::error::{IngestError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Connection descriptor for one write target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL requests to this endpoint are sent to.
    ///
    /// Bare `host:port` descriptors are addressed over plain HTTP.
    pub fn url(&self) -> String {
        if self.0.contains("://") {
            self.0.clone()
        } else {
            format!("http://{}", self.0)
        }
    }
}

impl FromStr for Endpoint {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(IngestError::config("endpoint descriptor is empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(IngestError::config(format!(
                "endpoint descriptor '{}' contains whitespace",
                trimmed
            )));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for Endpoint {
    type Error = IngestError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parse a comma separated endpoint list such as `"10.0.0.1:32149,10.0.0.2:32149"`
pub fn parse_endpoint_list(list: &str) -> Result<Vec<Endpoint>> {
    list.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Non-empty, duplicate-free set of interchangeable write targets
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<Endpoint>,
}

// Construction rejects an empty pool, so there is no is_empty.
#[allow(clippy::len_without_is_empty)]
impl EndpointPool {
    /// Build a pool, keeping the first occurrence of any repeated endpoint.
    ///
    /// An empty list is a configuration error.
    pub fn new(endpoints: impl IntoIterator<Item = Endpoint>) -> Result<Self> {
        let mut unique: Vec<Endpoint> = Vec::new();
        for endpoint in endpoints {
            if unique.contains(&endpoint) {
                warn!(endpoint = %endpoint, "Ignoring duplicate endpoint");
                continue;
            }
            unique.push(endpoint);
        }

        if unique.is_empty() {
            return Err(IngestError::config(
                "at least one write endpoint is required",
            ));
        }

        Ok(Self { endpoints: unique })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Uniformly random member of the pool.
    pub fn pick_any<R: Rng + ?Sized>(&self, rng: &mut R) -> &Endpoint {
        &self.endpoints[rng.gen_range(0..self.endpoints.len())]
    }

    /// Uniformly random member other than `prior`.
    ///
    /// With a single endpoint there is nothing else to choose and the sole
    /// endpoint is returned. A `prior` that is not in the pool places no
    /// restriction on the draw.
    pub fn pick_different<R: Rng + ?Sized>(&self, prior: &Endpoint, rng: &mut R) -> &Endpoint {
        let Some(skip) = self.endpoints.iter().position(|e| e == prior) else {
            return self.pick_any(rng);
        };
        if self.endpoints.len() == 1 {
            return &self.endpoints[0];
        }

        // Draw from the n-1 other slots and step over the prior's index.
        let mut idx = rng.gen_range(0..self.endpoints.len() - 1);
        if idx >= skip {
            idx += 1;
        }
        &self.endpoints[idx]
    }
}
