//! Contract handles.
//!
//! A [`ContractHandle`] names a contract whose address may not exist yet.
//! Handles created by deferral start pending and are resolved exactly once,
//! by the batch executor, after their batch finalizes. Reading the address of
//! a pending handle fails; it never yields a placeholder.

use std::fmt;
use std::sync::{Arc, OnceLock};

use deployer_resolver::{CreationEvent, ResolutionError};
use deployer_types::Address;

#[derive(Clone)]
pub struct ContractHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    label: String,
    creation: Option<CreationEvent>,
    address: OnceLock<Address>,
}

impl ContractHandle {
    /// A contract that will exist once the batch carrying its creation finalizes.
    pub fn pending(label: impl Into<String>, creation: CreationEvent) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                label: label.into(),
                creation: Some(creation),
                address: OnceLock::new(),
            }),
        }
    }

    /// An already deployed contract.
    pub fn resolved(label: impl Into<String>, address: Address) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(address);
        Self {
            inner: Arc::new(HandleInner {
                label: label.into(),
                creation: None,
                address: cell,
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    pub fn address(&self) -> Result<Address, ResolutionError> {
        self.inner
            .address
            .get()
            .copied()
            .ok_or_else(|| ResolutionError::Unresolved {
                label: self.inner.label.clone(),
            })
    }

    pub fn try_address(&self) -> Option<Address> {
        self.inner.address.get().copied()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.address.get().is_some()
    }

    pub fn creation_event(&self) -> Option<&CreationEvent> {
        self.inner.creation.as_ref()
    }

    /// Set the address. Returns `false` if the handle was already resolved.
    pub(crate) fn resolve(&self, address: Address) -> bool {
        self.inner.address.set(address).is_ok()
    }

    /// Whether both handles refer to the same underlying slot.
    pub fn same_as(&self, other: &ContractHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_address() {
            Some(address) => write!(f, "ContractHandle({} @ {})", self.label(), address),
            None => write!(f, "ContractHandle({} pending)", self.label()),
        }
    }
}

impl fmt::Display for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_address() {
            Some(address) => write!(f, "{} {}", self.label(), address),
            None => write!(f, "{} (pending)", self.label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployer_types::Felt;

    #[test]
    fn test_pending_handle_fails_fast() {
        let handle = ContractHandle::pending("Pool", CreationEvent::new("CreatePool", "pool"));
        let err = handle.address().unwrap_err();
        assert_eq!(
            err,
            ResolutionError::Unresolved {
                label: "Pool".to_string()
            }
        );
        assert!(!handle.is_resolved());
        assert_eq!(handle.try_address(), None);
        assert_eq!(handle.creation_event().map(|e| e.signature.as_str()), Some("CreatePool"));
    }

    #[test]
    fn test_resolves_exactly_once() {
        let handle =
            ContractHandle::pending("Oracle", CreationEvent::contract_deployed(Felt::ONE));
        let clone = handle.clone();
        assert!(handle.resolve(Address::new(Felt::from(5u64))));
        assert!(!handle.resolve(Address::new(Felt::from(6u64))));
        assert_eq!(clone.address().unwrap(), Address::new(Felt::from(5u64)));
        assert!(clone.same_as(&handle));
    }

    #[test]
    fn test_loaded_handle_is_resolved() {
        let handle = ContractHandle::resolved("PoolFactory", Address::new(Felt::from(9u64)));
        assert!(handle.is_resolved());
        assert!(handle.creation_event().is_none());
        assert_eq!(handle.to_string(), "PoolFactory 0x9");
    }
}
