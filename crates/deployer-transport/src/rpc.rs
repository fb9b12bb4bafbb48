//! JSON-RPC ledger client.
//!
//! Talks to a node (or devnet) exposing the account-scoped deployment methods:
//!
//! | method                          | params                                   | result                     |
//! |---------------------------------|------------------------------------------|----------------------------|
//! | `deployer_declare`              | `{account, name, class, compiled_class}` | class hash                 |
//! | `deployer_submit`               | `{account, calls}`                       | transaction hash           |
//! | `deployer_getTransactionResult` | `{hash}`                                 | result or `null` (pending) |
//! | `deployer_call`                 | `{address, method, args}`                | `[felt]`                   |
//!
//! Artifacts travel base64-encoded. `ureq` is blocking, so every request runs
//! on the blocking pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;

use deployer_types::{
    env_utils::env_var_or, Address, Call, CompiledCode, Felt, PollConfig, TransactionHash,
    TransactionResult,
};

use crate::{FinalityTimeout, LedgerClient};

#[derive(Clone)]
pub struct RpcLedgerClient {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    account: Address,
    agent: ureq::Agent,
    poll: PollConfig,
    next_id: AtomicU64,
}

impl RpcLedgerClient {
    /// Default request timeout in seconds (can be overridden by env).
    const DEFAULT_TIMEOUT_SECS: u64 = 60;
    /// Default connect timeout in seconds (can be overridden by env).
    const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    fn default_timeouts() -> (Duration, Duration) {
        let timeout_secs = env_var_or("DEPLOYER_RPC_TIMEOUT_SECS", Self::DEFAULT_TIMEOUT_SECS);
        let connect_secs = env_var_or(
            "DEPLOYER_RPC_CONNECT_TIMEOUT_SECS",
            Self::DEFAULT_CONNECT_TIMEOUT_SECS,
        );
        (
            Duration::from_secs(timeout_secs),
            Duration::from_secs(connect_secs),
        )
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build()
    }

    pub fn new(endpoint: &str, account: Address, poll: PollConfig) -> Self {
        let (timeout, connect_timeout) = Self::default_timeouts();
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.to_string(),
                account,
                agent: Self::build_agent(timeout, connect_timeout),
                poll,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    async fn request<T>(&self, method: &'static str, params: Value) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.request_blocking(method, params))
            .await
            .map_err(|e| anyhow!("RPC task for {} panicked: {}", method, e))?
    }
}

impl Inner {
    fn request_blocking<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| anyhow!("RPC request {} failed: {}", method, e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse {} response: {}", method, e))?;

        parse_response(method, response)
    }
}

fn parse_response<T: DeserializeOwned>(method: &str, response: Value) -> Result<T> {
    if let Some(error) = response.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        return Err(anyhow!("RPC error from {}: {}", method, message));
    }
    let result = response
        .get("result")
        .cloned()
        .ok_or_else(|| anyhow!("No result in {} response", method))?;
    serde_json::from_value(result).with_context(|| format!("Unexpected {} result shape", method))
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    fn account(&self) -> Address {
        self.inner.account
    }

    async fn declare(&self, code: &CompiledCode) -> Result<Felt> {
        let engine = base64::engine::general_purpose::STANDARD;
        let params = json!({
            "account": self.inner.account,
            "name": code.name,
            "class": engine.encode(&code.class),
            "compiled_class": code.compiled_class.as_ref().map(|c| engine.encode(c)),
        });
        let class_hash: Felt = self.request("deployer_declare", params).await?;
        debug!(name = %code.name, class_hash = %class_hash, "declared class");
        Ok(class_hash)
    }

    async fn submit(&self, calls: &[Call]) -> Result<TransactionHash> {
        let params = json!({
            "account": self.inner.account,
            "calls": calls,
        });
        self.request("deployer_submit", params).await
    }

    async fn wait_for_finality(&self, hash: TransactionHash) -> Result<TransactionResult> {
        let started = Instant::now();
        loop {
            let result: Option<TransactionResult> = self
                .request("deployer_getTransactionResult", json!({ "hash": hash }))
                .await?;
            if let Some(result) = result {
                return Ok(result);
            }
            let waited = started.elapsed();
            if waited >= self.inner.poll.timeout {
                return Err(FinalityTimeout { hash, waited }.into());
            }
            debug!(hash = %hash, waited_ms = waited.as_millis() as u64, "transaction pending");
            tokio::time::sleep(self.inner.poll.interval).await;
        }
    }

    async fn read_state(&self, address: Address, method: &str, args: &[Felt]) -> Result<Vec<Felt>> {
        let params = json!({
            "address": address,
            "method": method,
            "args": args,
        });
        self.request("deployer_call", params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_result() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": "0x2a"});
        let felt: Felt = parse_response("deployer_declare", value).unwrap();
        assert_eq!(felt, Felt::from(42u64));
    }

    #[test]
    fn test_parse_response_error_message() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "class already declared"}});
        let err = parse_response::<Felt>("deployer_declare", value).unwrap_err();
        assert!(err.to_string().contains("class already declared"));
    }

    #[test]
    fn test_parse_pending_result() {
        let value = json!({"jsonrpc": "2.0", "id": 1, "result": null});
        let result: Option<TransactionResult> =
            parse_response("deployer_getTransactionResult", value).unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_errors() {
        let client = RpcLedgerClient::new(
            "http://127.0.0.1:9",
            Address::new(Felt::ONE),
            PollConfig::new(10, 1),
        );
        let err = client
            .read_state(Address::new(Felt::ONE), "owner", &[])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deployer_call"));
    }
}
