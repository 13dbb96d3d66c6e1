//! Per-request interaction record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fingerprints of one answered request.
///
/// Created once per request, never mutated, never stored locally: it is
/// returned to the caller and forwarded to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub query_hash: String,
    pub answer_hash: String,
}

impl SessionRecord {
    /// Record fingerprints under a freshly generated session id.
    pub fn new(query_hash: impl Into<String>, answer_hash: impl Into<String>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            query_hash: query_hash.into(),
            answer_hash: answer_hash.into(),
        }
    }
}
