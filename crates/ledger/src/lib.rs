//! Verifiable interaction logging for Curator.
//!
//! Each answered request is reduced to SHA-256 fingerprints of its query and
//! answer. The fingerprints are committed to an external ledger contract
//! through the agent API, in the background and on a best-effort basis.

pub mod dispatcher;
pub mod fingerprint;
pub mod payload;
pub mod transport;

pub use dispatcher::{CommitStatus, LedgerDispatcher, RetryPolicy};
pub use fingerprint::fingerprint;
pub use payload::{CommitArgs, CommitPayload};
pub use transport::{HttpTransport, LedgerTransport};

/// Ledger delivery errors. Logged, never surfaced to callers of `/chat`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger request failed: {0}")]
    Network(String),

    #[error("Ledger request timed out after {0}s")]
    Timeout(u64),

    #[error("Ledger endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}
