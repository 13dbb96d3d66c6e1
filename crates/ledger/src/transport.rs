//! Delivery of commit payloads.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::LedgerError;
use crate::payload::CommitPayload;

/// Sends one payload to the ledger. One call = one attempt; retries are the
/// dispatcher's job.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn send(&self, payload: &CommitPayload) -> Result<(), LedgerError>;
}

/// POSTs payloads as JSON to the agent API endpoint.
pub struct HttpTransport {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LedgerError::Network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.into(),
            timeout_secs,
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LedgerTransport for HttpTransport {
    async fn send(&self, payload: &CommitPayload) -> Result<(), LedgerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout(self.timeout_secs)
                } else {
                    LedgerError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(endpoint = %self.endpoint, status = status.as_u16(), "Ledger accepted commit");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_core::SessionRecord;

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        // Port 9 (discard) is closed on test hosts; connection is refused.
        let transport = HttpTransport::new("http://127.0.0.1:9/api/agent", 1).unwrap();
        let payload = CommitPayload::new("c", &SessionRecord::new("q", "a"), None);
        let err = transport.send(&payload).await.unwrap_err();
        assert!(matches!(err, LedgerError::Network(_) | LedgerError::Timeout(_)));
    }
}
