//! Ledger-facing value types: calls, emitted events and finalized transactions.

use serde::{Deserialize, Serialize};

use crate::felt::{Address, Felt};

/// A single contract invocation inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub to: Address,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
}

impl Call {
    pub fn new(to: Address, entrypoint: impl Into<String>, calldata: Vec<Felt>) -> Self {
        Self {
            to,
            entrypoint: entrypoint.into(),
            calldata,
        }
    }
}

/// An event emitted during execution, already decoded by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub from_address: Address,
    /// Event name, e.g. `ContractDeployed` or `CreatePool`.
    pub name: String,
    /// Named fields in declaration order.
    #[serde(default)]
    pub fields: Vec<(String, Felt)>,
}

impl EmittedEvent {
    pub fn field(&self, name: &str) -> Option<Felt> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| *value)
    }

    /// Whether this event's name matches `signature`.
    ///
    /// Signatures may be fully qualified (`pkg::module::Contract::Event`);
    /// only the last path segment is compared against the event name.
    pub fn matches(&self, signature: &str) -> bool {
        let short = signature.rsplit("::").next().unwrap_or(signature);
        self.name == signature || self.name == short
    }
}

/// Hash identifying a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub Felt);

impl std::fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// Final outcome reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum TransactionStatus {
    Accepted,
    /// Included but execution failed; no call in the batch took effect.
    Reverted(String),
    /// Refused before execution.
    Rejected(String),
}

impl TransactionStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, TransactionStatus::Accepted)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            TransactionStatus::Accepted => None,
            TransactionStatus::Reverted(reason) | TransactionStatus::Rejected(reason) => {
                Some(reason)
            }
        }
    }
}

/// A finalized transaction with its emitted events in ledger order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub hash: TransactionHash,
    pub status: TransactionStatus,
    #[serde(default)]
    pub events: Vec<EmittedEvent>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

/// Compiled contract code ready to be declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCode {
    /// Logical contract name, e.g. `PoolFactory`.
    pub name: String,
    /// Contract class artifact (usually JSON).
    pub class: Vec<u8>,
    /// Optional lowered artifact some ledgers require alongside the class.
    #[serde(default)]
    pub compiled_class: Option<Vec<u8>>,
}

impl CompiledCode {
    /// Content digest over both artifacts; identical code yields identical digests.
    pub fn digest(&self) -> Felt {
        let compiled = self.compiled_class.as_deref().unwrap_or_default();
        Felt::hash_of(&[self.class.as_slice(), compiled])
    }
}
