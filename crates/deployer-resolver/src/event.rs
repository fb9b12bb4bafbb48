//! Creation events and address extraction.

use std::fmt;

use thiserror::Error;
use tracing::debug;

use deployer_types::{Address, EmittedEvent, Felt, TransactionHash, TransactionResult};

/// Event name emitted by the universal deployer.
const CONTRACT_DEPLOYED: &str = "ContractDeployed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The creating call was missing from the batch or ordered after its users.
    #[error("no {event} event for '{label}' in transaction {hash}")]
    EventNotFound {
        label: String,
        event: String,
        hash: TransactionHash,
    },

    #[error("{event} event for '{label}' has no '{field}' field")]
    MissingField {
        label: String,
        event: String,
        field: String,
    },

    #[error("{event} event for '{label}' reports the zero address")]
    ZeroAddress { label: String, event: String },

    /// A handle was read before its batch finalized.
    #[error("contract '{label}' is not deployed yet; its batch has not been executed")]
    Unresolved { label: String },

    /// A transaction failed, so none of its creation events exist.
    #[error("transaction {hash} did not succeed; '{label}' was never created")]
    NotAccepted { label: String, hash: TransactionHash },
}

/// Which emitted event announces a new contract, and where its address is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationEvent {
    /// Event name; fully qualified names match on the last path segment.
    pub signature: String,
    /// Field carrying the new address.
    pub address_field: String,
    /// Only events whose field equals this value match.
    pub filter: Option<(String, Felt)>,
}

impl CreationEvent {
    pub fn new(signature: impl Into<String>, address_field: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            address_field: address_field.into(),
            filter: None,
        }
    }

    /// `ContractDeployed` from the universal deployer, narrowed to one salt.
    pub fn contract_deployed(salt: Felt) -> Self {
        Self::new(CONTRACT_DEPLOYED, "address").with_filter("salt", salt)
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: Felt) -> Self {
        self.filter = Some((field.into(), value));
        self
    }

    pub fn matches(&self, event: &EmittedEvent) -> bool {
        if !event.matches(&self.signature) {
            return false;
        }
        match &self.filter {
            Some((field, value)) => event.field(field) == Some(*value),
            None => true,
        }
    }
}

impl fmt::Display for CreationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some((field, value)) => write!(f, "{}[{}={}]", self.signature, field, value),
            None => f.write_str(&self.signature),
        }
    }
}

/// Extract the address announced by `event` in a finalized transaction.
///
/// The first matching event in emission order wins. No match means the
/// creating call never ran in this transaction.
pub fn resolve_address(
    label: &str,
    result: &TransactionResult,
    event: &CreationEvent,
) -> Result<Address, ResolutionError> {
    if !result.status.is_accepted() {
        return Err(ResolutionError::NotAccepted {
            label: label.to_string(),
            hash: result.hash,
        });
    }

    let emitted = result
        .events
        .iter()
        .find(|emitted| event.matches(emitted))
        .ok_or_else(|| ResolutionError::EventNotFound {
            label: label.to_string(),
            event: event.to_string(),
            hash: result.hash,
        })?;

    let value = emitted
        .field(&event.address_field)
        .ok_or_else(|| ResolutionError::MissingField {
            label: label.to_string(),
            event: event.signature.clone(),
            field: event.address_field.clone(),
        })?;
    if value.is_zero() {
        return Err(ResolutionError::ZeroAddress {
            label: label.to_string(),
            event: event.signature.clone(),
        });
    }

    let address = Address::new(value);
    debug!(label, address = %address, event = %event, "resolved contract address");
    Ok(address)
}

/// Resolve every `(label, event)` pair against one result, preserving order.
///
/// Stops at the first failure.
pub fn resolve_all<'a, I>(
    result: &TransactionResult,
    pending: I,
) -> Result<Vec<Address>, ResolutionError>
where
    I: IntoIterator<Item = (&'a str, &'a CreationEvent)>,
{
    pending
        .into_iter()
        .map(|(label, event)| resolve_address(label, result, event))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployer_transport::test_utils::TransactionResultBuilder;

    fn addr(value: u64) -> Address {
        Address::new(Felt::from(value))
    }

    #[test]
    fn test_salt_filter_picks_the_right_deployment() {
        let result = TransactionResultBuilder::new()
            .with_contract_deployed(addr(0x10), Felt::from(1u64))
            .with_contract_deployed(addr(0x20), Felt::from(2u64))
            .build();

        let second = CreationEvent::contract_deployed(Felt::from(2u64));
        assert_eq!(resolve_address("asset", &result, &second).unwrap(), addr(0x20));
    }

    #[test]
    fn test_first_match_wins() {
        let pool_event = CreationEvent::new("CreatePool", "pool");
        let result = TransactionResultBuilder::new()
            .with_event(addr(1), "CreatePool", &[("pool", Felt::from(0xaau64))])
            .with_event(addr(1), "CreatePool", &[("pool", Felt::from(0xbbu64))])
            .build();
        assert_eq!(
            resolve_address("pool", &result, &pool_event).unwrap(),
            addr(0xaa)
        );
    }

    #[test]
    fn test_missing_event_names_the_label() {
        let result = TransactionResultBuilder::new()
            .with_contract_deployed(addr(0x10), Felt::from(1u64))
            .build();
        let err = resolve_address(
            "PoolFactory",
            &result,
            &CreationEvent::contract_deployed(Felt::from(9u64)),
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::EventNotFound { .. }));
        assert!(err.to_string().contains("PoolFactory"));
    }

    #[test]
    fn test_reverted_transaction_resolves_nothing() {
        let result = TransactionResultBuilder::new()
            .with_contract_deployed(addr(0x10), Felt::from(1u64))
            .reverted("boom")
            .build();
        let err = resolve_address(
            "asset",
            &result,
            &CreationEvent::contract_deployed(Felt::from(1u64)),
        )
        .unwrap_err();
        assert!(matches!(err, ResolutionError::NotAccepted { .. }));
    }

    #[test]
    fn test_missing_field_and_zero_address() {
        let event = CreationEvent::new("CreatePool", "pool");
        let no_field = TransactionResultBuilder::new()
            .with_event(addr(1), "CreatePool", &[("id", Felt::ONE)])
            .build();
        assert!(matches!(
            resolve_address("pool", &no_field, &event),
            Err(ResolutionError::MissingField { .. })
        ));

        let zero = TransactionResultBuilder::new()
            .with_event(addr(1), "CreatePool", &[("pool", Felt::ZERO)])
            .build();
        assert!(matches!(
            resolve_address("pool", &zero, &event),
            Err(ResolutionError::ZeroAddress { .. })
        ));
    }

    #[test]
    fn test_resolve_all_keeps_order() {
        let result = TransactionResultBuilder::new()
            .with_contract_deployed(addr(0x10), Felt::from(1u64))
            .with_contract_deployed(addr(0x20), Felt::from(2u64))
            .build();
        let a = CreationEvent::contract_deployed(Felt::from(2u64));
        let b = CreationEvent::contract_deployed(Felt::from(1u64));
        let resolved = resolve_all(&result, [("a", &a), ("b", &b)]).unwrap();
        assert_eq!(resolved, vec![addr(0x20), addr(0x10)]);
    }
}
