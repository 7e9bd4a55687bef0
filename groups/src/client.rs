//! HTTP client for the ledger relay that submits batched root updates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::ledger::LedgerClient;
use crate::types::{LedgerEvent, LedgerReceipt, PendingUpdate};

/// Default timeout for a batch submission (covers waiting for the receipt).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for a ledger relay endpoint.
///
/// Sends `POST {endpoint}/groups/roots` with the whole batch and parses the
/// transaction receipt.
pub struct HttpLedgerClient {
    endpoint: String,
    /// HTTP client (reusable connection pool).
    http_client: reqwest::Client,
}

/// Request body: one entry per queued update, in queue order.
#[derive(Debug, Serialize)]
struct UpdateGroupsRequest<'a> {
    updates: &'a [PendingUpdate],
}

/// Raw JSON receipt returned by the relay.
///
/// The API contract: `{"status": bool, "events": [{"group_id", "root"}]}`.
#[derive(Debug, Deserialize)]
struct UpdateGroupsResponse {
    status: bool,
    #[serde(default)]
    events: Vec<LedgerEvent>,
}

impl HttpLedgerClient {
    /// Create a client with default timeout settings.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, LedgerError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| LedgerError::RequestFailed(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self) -> String {
        format!("{}/groups/roots", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn update_groups(&self, batch: &[PendingUpdate]) -> Result<LedgerReceipt, LedgerError> {
        let response = self
            .http_client
            .post(self.url())
            .json(&UpdateGroupsRequest { updates: batch })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    LedgerError::Unreachable(format!("connection failed: {e}"))
                } else {
                    LedgerError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LedgerError::RequestFailed(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let receipt: UpdateGroupsResponse = response.json().await.map_err(|e| {
            LedgerError::InvalidResponse(format!("failed to parse ledger receipt: {e}"))
        })?;

        Ok(LedgerReceipt {
            status: receipt.status,
            events: receipt.events,
        })
    }
}
