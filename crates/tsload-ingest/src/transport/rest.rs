//! REST transport for node write endpoints
//!
//! Writes are a `PUT` to the endpoint root with the destination carried in
//! headers; control commands (flush, status) travel in a `command` header.

use super::Transport;
use crate::binding::DestinationBinding;
use crate::endpoint::Endpoint;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, trace};

// ============================================================================
// REST Transport Constants
// ============================================================================

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// User agent the nodes expect on REST calls.
pub const USER_AGENT: &str = "AnyLog/1.23";

/// Command that forces a node to commit its streaming buffers.
pub const FLUSH_COMMAND: &str = "flush buffers";

/// Command returning the node's status as JSON.
pub const STATUS_COMMAND: &str = "get status where format=json";

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// HTTP client speaking the node REST protocol
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: Client,
}

impl RestTransport {
    /// Create a transport whose requests time out after `timeout`.
    ///
    /// `None` lets a request wait indefinitely.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Fetch `get status` from one node and return the raw JSON body.
    pub async fn status(&self, endpoint: &Endpoint) -> Result<serde_json::Value, TransportError> {
        let response = self
            .command(self.client.get(endpoint.url()), STATUS_COMMAND)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    fn command(&self, request: RequestBuilder, command: &str) -> RequestBuilder {
        request.header("command", command)
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn put(
        &self,
        endpoint: &Endpoint,
        binding: &DestinationBinding,
        payload: String,
    ) -> Result<(), TransportError> {
        trace!(endpoint = %endpoint, binding = %binding, bytes = payload.len(), "PUT unit");

        let response = self
            .client
            .put(endpoint.url())
            .header("type", "json")
            .header("dbms", binding.database.as_str())
            .header("table", binding.table.as_str())
            .header("mode", "streaming")
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(payload)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    async fn flush(&self, endpoint: &Endpoint) -> Result<(), TransportError> {
        debug!(endpoint = %endpoint, "Flushing node buffers");

        let response = self
            .command(self.client.post(endpoint.url()), FLUSH_COMMAND)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push_str("...");
    }

    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
