//! Background commit dispatcher.
//!
//! `commit` never waits on the network: it enqueues the payload and returns.
//! A single worker task drains the queue, retrying each payload with
//! exponential backoff. Failures end in the log, never in a response.

use curator_config::LedgerConfig;
use curator_core::SessionRecord;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::LedgerError;
use crate::payload::CommitPayload;
use crate::transport::{HttpTransport, LedgerTransport};

/// How many times to try a payload and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(1u32 << shift)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// What happened to a commit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Handed to the worker
    Enqueued,
    /// No ledger target configured
    Disabled,
    /// Queue full or worker gone; the record was dropped
    Dropped,
}

/// Best-effort, fire-and-forget committer of interaction fingerprints.
pub struct LedgerDispatcher {
    contract_id: String,
    tx: Mutex<Option<mpsc::Sender<CommitPayload>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LedgerDispatcher {
    /// A dispatcher that accepts and discards every commit.
    pub fn disabled() -> Self {
        Self {
            contract_id: String::new(),
            tx: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(
        transport: Arc<dyn LedgerTransport>,
        contract_id: impl Into<String>,
        policy: RetryPolicy,
        capacity: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, transport, policy));
        Self {
            contract_id: contract_id.into(),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Build from configuration; disabled when no contract is configured.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        if !config.is_enabled() {
            info!("Ledger commits disabled (no contract configured)");
            return Ok(Self::disabled());
        }

        let transport = HttpTransport::new(&config.api_url, config.timeout_secs)?;
        info!(
            endpoint = %config.api_url,
            contract = %config.contract_id,
            "Ledger commits enabled"
        );
        Ok(Self::spawn(
            Arc::new(transport),
            &config.contract_id,
            RetryPolicy {
                max_attempts: config.max_attempts,
                base_backoff: Duration::from_millis(config.backoff_ms),
            },
            config.queue_capacity,
        ))
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.lock().map(|tx| tx.is_some()).unwrap_or(false)
    }

    /// Queue the fingerprints of one interaction for commit.
    pub fn commit(&self, record: &SessionRecord, community_id: Option<&str>) -> CommitStatus {
        let Ok(guard) = self.tx.lock() else {
            return CommitStatus::Dropped;
        };
        let Some(tx) = guard.as_ref() else {
            return CommitStatus::Disabled;
        };

        let payload = CommitPayload::new(&self.contract_id, record, community_id);
        match tx.try_send(payload) {
            Ok(()) => {
                debug!(session_id = %record.session_id, "Ledger commit queued");
                CommitStatus::Enqueued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %record.session_id, "Ledger queue full; dropping commit");
                CommitStatus::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(session_id = %record.session_id, "Ledger worker stopped; dropping commit");
                CommitStatus::Dropped
            }
        }
    }

    /// Stop accepting commits and wait for queued ones to finish.
    pub async fn shutdown(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Ledger worker panicked");
            }
            debug!("Ledger queue drained");
        }
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<CommitPayload>,
    transport: Arc<dyn LedgerTransport>,
    policy: RetryPolicy,
) {
    while let Some(payload) = rx.recv().await {
        deliver(transport.as_ref(), &payload, policy).await;
    }
}

/// Try one payload up to `max_attempts` times.
async fn deliver(transport: &dyn LedgerTransport, payload: &CommitPayload, policy: RetryPolicy) {
    let session_id = payload.args.session_id.as_str();
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match transport.send(payload).await {
            Ok(()) => {
                info!(session_id, attempt, "Interaction logged to ledger");
                return;
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    session_id,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "Ledger commit failed; retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(session_id, attempts = attempt, error = %e, "Ledger commit abandoned");
            }
        }
    }
}
