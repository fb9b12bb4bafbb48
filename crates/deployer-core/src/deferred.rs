//! Deferred calls and batches.
//!
//! Nothing here talks to the ledger. Builders return a [`Deferred`] value:
//! the handles they promise plus the calls that will create them. Callers
//! fold deferred values into a [`Batch`] in dependency order and hand the
//! batch to `Deployer::execute`.

use deployer_resolver::ResolutionError;
use deployer_types::{Address, Call, Felt};

use crate::handle::ContractHandle;

#[derive(Debug, Clone)]
pub enum CallTarget {
    Address(Address),
    Handle(ContractHandle),
}

impl CallTarget {
    pub fn address(&self) -> Result<Address, ResolutionError> {
        match self {
            CallTarget::Address(address) => Ok(*address),
            CallTarget::Handle(handle) => handle.address(),
        }
    }
}

impl From<Address> for CallTarget {
    fn from(address: Address) -> Self {
        CallTarget::Address(address)
    }
}

impl From<ContractHandle> for CallTarget {
    fn from(handle: ContractHandle) -> Self {
        CallTarget::Handle(handle)
    }
}

impl From<&ContractHandle> for CallTarget {
    fn from(handle: &ContractHandle) -> Self {
        CallTarget::Handle(handle.clone())
    }
}

/// One pending ledger call.
#[derive(Debug, Clone)]
pub struct DeferredCall {
    pub target: CallTarget,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
}

impl DeferredCall {
    pub fn new(
        target: impl Into<CallTarget>,
        entrypoint: impl Into<String>,
        calldata: Vec<Felt>,
    ) -> Self {
        Self {
            target: target.into(),
            entrypoint: entrypoint.into(),
            calldata,
        }
    }

    /// Concrete call; the target must already be resolved.
    pub fn to_call(&self) -> Result<Call, ResolutionError> {
        Ok(Call::new(
            self.target.address()?,
            self.entrypoint.clone(),
            self.calldata.clone(),
        ))
    }
}

/// A value promised by a builder, with the calls that make it real.
#[derive(Debug, Clone)]
pub struct Deferred<T> {
    pub value: T,
    pub calls: Vec<DeferredCall>,
    /// Pending handles created by `calls`.
    pub handles: Vec<ContractHandle>,
}

impl<T> Deferred<T> {
    /// A value that needs no calls, e.g. a loaded contract.
    pub fn ready(value: T) -> Self {
        Self {
            value,
            calls: Vec::new(),
            handles: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Deferred<U> {
        Deferred {
            value: f(self.value),
            calls: self.calls,
            handles: self.handles,
        }
    }

    /// Append another deferred value's calls after ours.
    pub fn and<U>(mut self, other: Deferred<U>) -> Deferred<(T, U)> {
        self.calls.extend(other.calls);
        self.handles.extend(other.handles);
        Deferred {
            value: (self.value, other.value),
            calls: self.calls,
            handles: self.handles,
        }
    }
}

impl<T> Deferred<Vec<T>> {
    /// Concatenate in order.
    pub fn collect(parts: Vec<Deferred<T>>) -> Self {
        let mut out = Deferred::ready(Vec::with_capacity(parts.len()));
        for part in parts {
            out.value.push(part.value);
            out.calls.extend(part.calls);
            out.handles.extend(part.handles);
        }
        out
    }
}

/// Ordered calls submitted as one atomic transaction.
#[derive(Debug, Default)]
pub struct Batch {
    calls: Vec<DeferredCall>,
    pending: Vec<ContractHandle>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a deferred value's calls and return the value.
    pub fn push<T>(&mut self, deferred: Deferred<T>) -> T {
        self.calls.extend(deferred.calls);
        self.pending.extend(deferred.handles);
        deferred.value
    }

    pub fn push_call(&mut self, call: DeferredCall) {
        self.calls.push(call);
    }

    pub fn extend_calls(&mut self, calls: impl IntoIterator<Item = DeferredCall>) {
        self.calls.extend(calls);
    }

    pub fn calls(&self) -> &[DeferredCall] {
        &self.calls
    }

    pub fn pending(&self) -> &[ContractHandle] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<DeferredCall>, Vec<ContractHandle>) {
        (self.calls, self.pending)
    }
}

impl From<Vec<DeferredCall>> for Batch {
    fn from(calls: Vec<DeferredCall>) -> Self {
        Self {
            calls,
            pending: Vec::new(),
        }
    }
}
