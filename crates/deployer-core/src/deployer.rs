//! Declaring, deferring and executing.
//!
//! [`Deployer`] owns the per-run context: the ledger client, the declaration
//! cache, the artifact store and a run nonce from which deployment salts are
//! derived. Salts are unique per deployment, so every `ContractDeployed`
//! event in a batch can be matched to exactly one pending handle.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use deployer_cache::{ArtifactStore, DeclarationCache};
use deployer_resolver::{resolve_all, CreationEvent};
use deployer_transport::{LedgerClient, DEPLOY_CONTRACT_ENTRYPOINT, UNIVERSAL_DEPLOYER};
use deployer_types::{Address, Calldata, Felt, TransactionResult};

use crate::deferred::{Batch, Deferred, DeferredCall};
use crate::error::DeployError;
use crate::handle::ContractHandle;

pub struct Deployer {
    client: Arc<dyn LedgerClient>,
    cache: Arc<DeclarationCache>,
    artifacts: ArtifactStore,
    run_nonce: [u8; 16],
    deployments: AtomicU64,
}

impl Deployer {
    pub fn new(
        client: Arc<dyn LedgerClient>,
        cache: Arc<DeclarationCache>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            client,
            cache,
            artifacts,
            run_nonce: *uuid::Uuid::new_v4().as_bytes(),
            deployments: AtomicU64::new(0),
        }
    }

    /// Account that signs every batch.
    pub fn account(&self) -> Address {
        self.client.account()
    }

    pub fn client(&self) -> &Arc<dyn LedgerClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<DeclarationCache> {
        &self.cache
    }

    /// Declare contract `name` once per run and return its class hash.
    pub async fn declare_cached(&self, name: &str) -> Result<Felt, DeployError> {
        let declared = self
            .cache
            .get_or_declare(name, || async {
                let code = self.artifacts.load(name)?;
                self.client.declare(&code).await
            })
            .await
            .map_err(|error| DeployError::DeclareFailed {
                name: name.to_string(),
                error,
            })?;
        Ok(declared.class_hash)
    }

    fn next_salt(&self) -> Felt {
        let counter = self.deployments.fetch_add(1, Ordering::Relaxed);
        Felt::hash_of(&[&self.run_nonce, &counter.to_be_bytes()])
    }

    /// Declare `name` and build the call that instantiates it.
    ///
    /// Nothing is submitted; the returned handle stays pending until the
    /// batch carrying the call is executed.
    pub async fn defer_contract(
        &self,
        name: &str,
        constructor_calldata: Vec<Felt>,
    ) -> Result<Deferred<ContractHandle>, DeployError> {
        let class_hash = self.declare_cached(name).await?;
        let salt = self.next_salt();
        let calldata = Calldata::new()
            .arg(class_hash)
            .arg(salt)
            .arg(false)
            .arg(constructor_calldata)
            .build();
        let handle = ContractHandle::pending(name, CreationEvent::contract_deployed(salt));
        debug!(name, salt = %salt, "deferred deployment");
        Ok(Deferred {
            value: handle.clone(),
            calls: vec![DeferredCall::new(
                UNIVERSAL_DEPLOYER,
                DEPLOY_CONTRACT_ENTRYPOINT,
                calldata,
            )],
            handles: vec![handle],
        })
    }

    /// Handle for a contract that already exists. No call is needed.
    pub fn load_contract(&self, label: impl Into<String>, address: Address) -> ContractHandle {
        ContractHandle::resolved(label, address)
    }

    /// Submit the batch as one transaction, wait for finality and resolve
    /// every pending handle it introduced.
    ///
    /// Handles are resolved only if all of them can be; a rejected batch
    /// leaves every handle pending.
    pub async fn execute(&self, batch: Batch) -> Result<TransactionResult, DeployError> {
        if batch.is_empty() {
            return Err(DeployError::EmptyBatch);
        }
        let (deferred_calls, pending) = batch.into_parts();
        let calls = deferred_calls
            .iter()
            .map(DeferredCall::to_call)
            .collect::<Result<Vec<_>, _>>()?;

        let hash = self
            .client
            .submit(&calls)
            .await
            .map_err(DeployError::from_transport)?;
        info!(hash = %hash, calls = calls.len(), "batch submitted");

        let result = self
            .client
            .wait_for_finality(hash)
            .await
            .map_err(DeployError::from_transport)?;
        if let Some(reason) = result.status.failure_reason() {
            return Err(DeployError::TransactionRejected {
                hash,
                reason: reason.to_string(),
            });
        }
        info!(
            hash = %hash,
            events = result.events.len(),
            block = ?result.block_number,
            "batch finalized"
        );

        let unresolved: Vec<(&ContractHandle, &CreationEvent)> = pending
            .iter()
            .filter(|handle| !handle.is_resolved())
            .filter_map(|handle| handle.creation_event().map(|event| (handle, event)))
            .collect();
        let addresses = resolve_all(
            &result,
            unresolved.iter().map(|(handle, event)| (handle.label(), *event)),
        )?;
        for ((handle, _), address) in unresolved.into_iter().zip(addresses) {
            handle.resolve(address);
            info!(label = handle.label(), address = %address, "contract deployed");
        }
        Ok(result)
    }

    /// Execute plain calls that create no handles.
    pub async fn execute_calls(
        &self,
        calls: Vec<DeferredCall>,
    ) -> Result<TransactionResult, DeployError> {
        self.execute(Batch::from(calls)).await
    }

    /// Read-only call against a resolved contract.
    pub async fn read_state(
        &self,
        target: &ContractHandle,
        method: &str,
        args: &[Felt],
    ) -> Result<Vec<Felt>, DeployError> {
        let address = target.address()?;
        self.client
            .read_state(address, method, args)
            .await
            .map_err(DeployError::from_transport)
    }
}
