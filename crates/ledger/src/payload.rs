//! The contract call sent to the ledger endpoint.

use curator_core::SessionRecord;
use serde::{Deserialize, Serialize};

/// Gas attached to every `log_interaction` call (100 Tgas).
pub const GAS: &str = "100000000000000";

/// Storage deposit attached to every call (0.01 NEAR in yoctoNEAR).
pub const ATTACHED_DEPOSIT: &str = "10000000000000000000000";

pub const METHOD_NAME: &str = "log_interaction";

/// `functionCall` request understood by the agent API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitPayload {
    pub method: String,
    pub contract_id: String,
    pub method_name: String,
    pub args: CommitArgs,
    pub gas: String,
    pub attached_deposit: String,
}

/// Arguments of `log_interaction`. Field names are the contract's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitArgs {
    pub session_id: String,
    pub query_hash: String,
    pub answer_hash: String,
    pub cost_microusd: u64,
    /// Serialized as `null` when the interaction is unscoped
    pub community_id: Option<String>,
}

impl CommitPayload {
    pub fn new(contract_id: &str, record: &SessionRecord, community_id: Option<&str>) -> Self {
        Self {
            method: "functionCall".into(),
            contract_id: contract_id.to_string(),
            method_name: METHOD_NAME.into(),
            args: CommitArgs {
                session_id: record.session_id.to_string(),
                query_hash: record.query_hash.clone(),
                answer_hash: record.answer_hash.clone(),
                cost_microusd: 0,
                community_id: community_id.map(String::from),
            },
            gas: GAS.into(),
            attached_deposit: ATTACHED_DEPOSIT.into(),
        }
    }
}
