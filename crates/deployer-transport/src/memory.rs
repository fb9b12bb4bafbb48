//! In-process ledger with atomic batch execution.
//!
//! `MemoryLedger` implements just enough ledger behaviour to run a full
//! deployment without a node:
//!
//! - `declare` registers a class under its content digest
//! - `deploy_contract` on [`UNIVERSAL_DEPLOYER`] instantiates a declared class
//!   and emits `ContractDeployed { address, deployer, unique, class_hash, salt }`
//! - `create_pool` on any contract instantiates a pool and emits `CreatePool { pool }`
//! - `upgrade` swaps the class of the target for another declared class
//! - every other call is recorded against its target
//!
//! A batch runs against a copy of the state. If any call fails the copy is
//! dropped, the transaction reports `Reverted` and emits no events.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use deployer_types::{
    Address, Call, CompiledCode, EmittedEvent, Felt, TransactionHash, TransactionResult,
    TransactionStatus,
};

use crate::{LedgerClient, CONTRACT_DEPLOYED_EVENT, DEPLOY_CONTRACT_ENTRYPOINT, UNIVERSAL_DEPLOYER};

/// Event emitted by `create_pool`.
pub const CREATE_POOL_EVENT: &str = "CreatePool";

/// A deployed contract instance.
#[derive(Debug, Clone)]
pub struct Instance {
    pub class_hash: Felt,
    /// Every call made against this instance, in execution order.
    pub invocations: Vec<(String, Vec<Felt>)>,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    /// class hash -> contract name
    classes: HashMap<Felt, String>,
    contracts: HashMap<Address, Instance>,
    /// Read-only results keyed by (address, method, args).
    views: HashMap<(Address, String, Vec<Felt>), Vec<Felt>>,
    block_number: u64,
}

/// Simulated ledger for `--simulate` runs and tests.
pub struct MemoryLedger {
    account: Address,
    state: Mutex<LedgerState>,
    /// Finalized results waiting to be collected by `wait_for_finality`.
    finalized: Mutex<HashMap<TransactionHash, TransactionResult>>,
    failing_entrypoints: Mutex<HashSet<String>>,
    declare_failures: AtomicUsize,
    declare_calls: AtomicUsize,
    submissions: AtomicUsize,
}

impl MemoryLedger {
    pub fn new(account: Address) -> Self {
        let mut state = LedgerState::default();
        state.contracts.insert(
            account,
            Instance {
                class_hash: Felt::ZERO,
                invocations: Vec::new(),
            },
        );
        state.contracts.insert(
            UNIVERSAL_DEPLOYER,
            Instance {
                class_hash: Felt::ZERO,
                invocations: Vec::new(),
            },
        );
        Self {
            account,
            state: Mutex::new(state),
            finalized: Mutex::new(HashMap::new()),
            failing_entrypoints: Mutex::new(HashSet::new()),
            declare_failures: AtomicUsize::new(0),
            declare_calls: AtomicUsize::new(0),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Make every call to `entrypoint` revert its batch.
    pub fn fail_entrypoint(&self, entrypoint: &str) {
        self.failing_entrypoints.lock().insert(entrypoint.to_string());
    }

    /// Make the next `count` declares fail before reaching the ledger state.
    pub fn fail_next_declares(&self, count: usize) {
        self.declare_failures.store(count, Ordering::SeqCst);
    }

    /// Register a contract at a fixed address, e.g. a pre-existing token.
    pub fn register_contract(&self, address: Address, class_hash: Felt) {
        self.state.lock().contracts.insert(
            address,
            Instance {
                class_hash,
                invocations: Vec::new(),
            },
        );
    }

    /// Stub the result of a read-only call.
    pub fn set_view(&self, address: Address, method: &str, args: Vec<Felt>, value: Vec<Felt>) {
        self.state
            .lock()
            .views
            .insert((address, method.to_string(), args), value);
    }

    /// Number of `declare` requests received, including failed ones.
    pub fn declare_calls(&self) -> usize {
        self.declare_calls.load(Ordering::SeqCst)
    }

    /// Number of transactions submitted.
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn instance(&self, address: Address) -> Option<Instance> {
        self.state.lock().contracts.get(&address).cloned()
    }

    pub fn contract_count(&self) -> usize {
        self.state.lock().contracts.len()
    }

    pub fn class_name(&self, class_hash: Felt) -> Option<String> {
        self.state.lock().classes.get(&class_hash).cloned()
    }

    fn execute_batch(
        &self,
        state: &mut LedgerState,
        calls: &[Call],
        nonce: usize,
    ) -> std::result::Result<Vec<EmittedEvent>, String> {
        let failing = self.failing_entrypoints.lock().clone();
        let mut events = Vec::new();
        for (index, call) in calls.iter().enumerate() {
            if failing.contains(&call.entrypoint) {
                return Err(format!(
                    "call {} ({}) failed: entrypoint reverted",
                    index, call.entrypoint
                ));
            }
            if !state.contracts.contains_key(&call.to) {
                return Err(format!(
                    "call {} ({}) failed: contract {} not found",
                    index, call.entrypoint, call.to
                ));
            }
            let emitted = match (call.to == UNIVERSAL_DEPLOYER, call.entrypoint.as_str()) {
                (true, DEPLOY_CONTRACT_ENTRYPOINT) => self.deploy_contract(state, call)?,
                (_, "create_pool") => Self::create_pool(state, call, nonce, index)?,
                (_, "upgrade") => {
                    Self::upgrade(state, call)?;
                    Vec::new()
                }
                _ => Vec::new(),
            };
            if let Some(instance) = state.contracts.get_mut(&call.to) {
                instance
                    .invocations
                    .push((call.entrypoint.clone(), call.calldata.clone()));
            }
            events.extend(emitted);
        }
        Ok(events)
    }

    fn deploy_contract(
        &self,
        state: &mut LedgerState,
        call: &Call,
    ) -> std::result::Result<Vec<EmittedEvent>, String> {
        let data = &call.calldata;
        if data.len() < 4 {
            return Err("deploy_contract: calldata too short".to_string());
        }
        let (class_hash, salt, unique) = (data[0], data[1], data[2]);
        if !state.classes.contains_key(&class_hash) {
            return Err(format!("class hash {} is not declared", class_hash));
        }
        let deployer = if unique.is_zero() {
            Felt::ZERO
        } else {
            self.account.felt()
        };
        let mut seed = Vec::with_capacity(data.len() * 32);
        for felt in [class_hash, salt, deployer].iter().chain(&data[3..]) {
            seed.extend_from_slice(&felt.to_bytes_be());
        }
        let address = Address::new(Felt::hash_of(&[b"deploy", &seed]));
        if state.contracts.contains_key(&address) {
            return Err(format!("contract already deployed at {}", address));
        }
        state.contracts.insert(
            address,
            Instance {
                class_hash,
                invocations: Vec::new(),
            },
        );
        Ok(vec![EmittedEvent {
            from_address: UNIVERSAL_DEPLOYER,
            name: CONTRACT_DEPLOYED_EVENT.to_string(),
            fields: vec![
                ("address".to_string(), address.felt()),
                ("deployer".to_string(), self.account.felt()),
                ("unique".to_string(), unique),
                ("class_hash".to_string(), class_hash),
                ("salt".to_string(), salt),
            ],
        }])
    }

    fn create_pool(
        state: &mut LedgerState,
        call: &Call,
        nonce: usize,
        index: usize,
    ) -> std::result::Result<Vec<EmittedEvent>, String> {
        let pool_class = state
            .classes
            .iter()
            .find(|(_, name)| name.as_str() == "Pool")
            .map(|(hash, _)| *hash)
            .unwrap_or(Felt::ZERO);
        let pool = Address::new(Felt::hash_of(&[
            b"pool",
            &call.to.felt().to_bytes_be(),
            &(nonce as u64).to_be_bytes(),
            &(index as u64).to_be_bytes(),
        ]));
        state.contracts.insert(
            pool,
            Instance {
                class_hash: pool_class,
                invocations: vec![("constructor".to_string(), call.calldata.clone())],
            },
        );
        Ok(vec![EmittedEvent {
            from_address: call.to,
            name: CREATE_POOL_EVENT.to_string(),
            fields: vec![("pool".to_string(), pool.felt())],
        }])
    }

    fn upgrade(state: &mut LedgerState, call: &Call) -> std::result::Result<(), String> {
        let class_hash = call
            .calldata
            .first()
            .copied()
            .ok_or_else(|| "upgrade: missing class hash".to_string())?;
        if !state.classes.contains_key(&class_hash) {
            return Err(format!("upgrade: class hash {} is not declared", class_hash));
        }
        if let Some(instance) = state.contracts.get_mut(&call.to) {
            instance.class_hash = class_hash;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn account(&self) -> Address {
        self.account
    }

    async fn declare(&self, code: &CompiledCode) -> Result<Felt> {
        self.declare_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.declare_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.declare_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(anyhow!("declare of {} failed: upload interrupted", code.name));
        }
        let class_hash = code.digest();
        self.state
            .lock()
            .classes
            .insert(class_hash, code.name.clone());
        debug!(name = %code.name, class_hash = %class_hash, "declared class");
        Ok(class_hash)
    }

    async fn submit(&self, calls: &[Call]) -> Result<TransactionHash> {
        if calls.is_empty() {
            return Err(anyhow!("refusing to submit an empty transaction"));
        }
        let nonce = self.submissions.fetch_add(1, Ordering::SeqCst);
        let hash = TransactionHash(Felt::hash_of(&[
            b"tx",
            &self.account.felt().to_bytes_be(),
            &(nonce as u64).to_be_bytes(),
        ]));

        let mut state = self.state.lock();
        let mut working = state.clone();
        let outcome = self.execute_batch(&mut working, calls, nonce);
        let (status, events) = match outcome {
            Ok(events) => {
                working.block_number += 1;
                *state = working;
                (TransactionStatus::Accepted, events)
            }
            Err(reason) => (TransactionStatus::Reverted(reason), Vec::new()),
        };
        let block_number = Some(state.block_number);
        drop(state);

        debug!(hash = %hash, calls = calls.len(), ?status, "executed batch");
        self.finalized.lock().insert(
            hash,
            TransactionResult {
                hash,
                status,
                events,
                block_number,
            },
        );
        Ok(hash)
    }

    async fn wait_for_finality(&self, hash: TransactionHash) -> Result<TransactionResult> {
        self.finalized
            .lock()
            .remove(&hash)
            .ok_or_else(|| anyhow!("unknown transaction {}", hash))
    }

    async fn read_state(&self, address: Address, method: &str, args: &[Felt]) -> Result<Vec<Felt>> {
        let state = self.state.lock();
        if !state.contracts.contains_key(&address) {
            return Err(anyhow!("contract {} not found", address));
        }
        state
            .views
            .get(&(address, method.to_string(), args.to_vec()))
            .cloned()
            .ok_or_else(|| anyhow!("no view {} on {}", method, address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(name: &str) -> CompiledCode {
        CompiledCode {
            name: name.to_string(),
            class: format!("{{\"contract\":\"{}\"}}", name).into_bytes(),
            compiled_class: None,
        }
    }

    fn deploy_call(class_hash: Felt, salt: u64) -> Call {
        Call::new(
            UNIVERSAL_DEPLOYER,
            DEPLOY_CONTRACT_ENTRYPOINT,
            vec![class_hash, Felt::from(salt), Felt::ZERO, Felt::ZERO],
        )
    }

    #[tokio::test]
    async fn test_deploy_emits_contract_deployed() {
        let ledger = MemoryLedger::new(Address::new(Felt::from(0x100u64)));
        let class_hash = ledger.declare(&code("Token")).await.unwrap();

        let hash = ledger.submit(&[deploy_call(class_hash, 1)]).await.unwrap();
        let result = ledger.wait_for_finality(hash).await.unwrap();

        assert!(result.status.is_accepted());
        assert_eq!(result.events.len(), 1);
        let address = Address::new(result.events[0].field("address").unwrap());
        assert_eq!(ledger.instance(address).unwrap().class_hash, class_hash);
    }

    #[tokio::test]
    async fn test_failed_call_reverts_whole_batch() {
        let ledger = MemoryLedger::new(Address::new(Felt::from(0x100u64)));
        let class_hash = ledger.declare(&code("Token")).await.unwrap();
        let before = ledger.contract_count();
        ledger.fail_entrypoint("approve");

        let calls = vec![
            deploy_call(class_hash, 1),
            Call::new(UNIVERSAL_DEPLOYER, "approve", vec![]),
        ];
        let hash = ledger.submit(&calls).await.unwrap();
        let result = ledger.wait_for_finality(hash).await.unwrap();

        assert!(matches!(result.status, TransactionStatus::Reverted(_)));
        assert!(result.events.is_empty());
        assert_eq!(ledger.contract_count(), before);
    }

    #[tokio::test]
    async fn test_undeclared_class_reverts() {
        let ledger = MemoryLedger::new(Address::new(Felt::from(0x100u64)));
        let hash = ledger
            .submit(&[deploy_call(Felt::from(7u64), 1)])
            .await
            .unwrap();
        let result = ledger.wait_for_finality(hash).await.unwrap();
        assert!(result
            .status
            .failure_reason()
            .unwrap()
            .contains("not declared"));
    }

    #[tokio::test]
    async fn test_declare_failures_are_counted() {
        let ledger = MemoryLedger::new(Address::new(Felt::from(0x100u64)));
        ledger.fail_next_declares(1);
        assert!(ledger.declare(&code("Pool")).await.is_err());
        assert!(ledger.declare(&code("Pool")).await.is_ok());
        assert_eq!(ledger.declare_calls(), 2);
    }

    #[tokio::test]
    async fn test_read_state_uses_stubbed_views() {
        let account = Address::new(Felt::from(0x100u64));
        let ledger = MemoryLedger::new(account);
        ledger.set_view(account, "balance_of", vec![], vec![Felt::from(5u64)]);
        assert_eq!(
            ledger.read_state(account, "balance_of", &[]).await.unwrap(),
            vec![Felt::from(5u64)]
        );
        assert!(ledger.read_state(account, "owner", &[]).await.is_err());
    }
}
