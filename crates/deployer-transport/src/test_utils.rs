//! Test utilities for ledger results.
//!
//! Provides builders for finalized transactions so resolver and executor
//! tests don't need a running ledger.

use deployer_types::{
    Address, EmittedEvent, Felt, TransactionHash, TransactionResult, TransactionStatus,
};

use crate::{CONTRACT_DEPLOYED_EVENT, UNIVERSAL_DEPLOYER};

/// Builder for `TransactionResult` fixtures.
///
/// # Example
///
/// ```ignore
/// let result = TransactionResultBuilder::new()
///     .with_contract_deployed(address, salt)
///     .build();
/// assert!(result.status.is_accepted());
/// ```
pub struct TransactionResultBuilder {
    hash: TransactionHash,
    status: TransactionStatus,
    events: Vec<EmittedEvent>,
    block_number: Option<u64>,
}

impl Default for TransactionResultBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionResultBuilder {
    /// Accepted transaction with no events.
    pub fn new() -> Self {
        Self {
            hash: TransactionHash(Felt::from(0xabcu64)),
            status: TransactionStatus::Accepted,
            events: Vec::new(),
            block_number: Some(1),
        }
    }

    pub fn hash(mut self, hash: Felt) -> Self {
        self.hash = TransactionHash(hash);
        self
    }

    pub fn reverted(mut self, reason: &str) -> Self {
        self.status = TransactionStatus::Reverted(reason.to_string());
        self
    }

    pub fn rejected(mut self, reason: &str) -> Self {
        self.status = TransactionStatus::Rejected(reason.to_string());
        self
    }

    pub fn block_number(mut self, block: u64) -> Self {
        self.block_number = Some(block);
        self
    }

    /// Add an arbitrary event.
    pub fn with_event(mut self, from: Address, name: &str, fields: &[(&str, Felt)]) -> Self {
        self.events.push(EmittedEvent {
            from_address: from,
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        });
        self
    }

    /// Add a universal deployer `ContractDeployed` event.
    pub fn with_contract_deployed(self, address: Address, salt: Felt) -> Self {
        self.with_event(
            UNIVERSAL_DEPLOYER,
            CONTRACT_DEPLOYED_EVENT,
            &[
                ("address", address.felt()),
                ("deployer", Felt::ONE),
                ("unique", Felt::ONE),
                ("class_hash", Felt::from(0x77u64)),
                ("salt", salt),
            ],
        )
    }

    pub fn build(self) -> TransactionResult {
        TransactionResult {
            hash: self.hash,
            status: self.status,
            events: self.events,
            block_number: self.block_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let result = TransactionResultBuilder::new().build();
        assert!(result.status.is_accepted());
        assert!(result.events.is_empty());
    }

    #[test]
    fn test_builder_contract_deployed() {
        let address = Address::new(Felt::from(0x1234u64));
        let result = TransactionResultBuilder::new()
            .with_contract_deployed(address, Felt::from(9u64))
            .reverted("out of gas")
            .build();
        assert_eq!(result.events[0].field("address"), Some(address.felt()));
        assert_eq!(result.status.failure_reason(), Some("out of gas"));
    }
}
