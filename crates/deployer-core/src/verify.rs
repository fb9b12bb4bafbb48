//! On-ledger verification of a created pool.
//!
//! Every check runs; a failed read or a differing value is recorded as a
//! [`VerificationMismatch`] and the remaining checks continue.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use deployer_config::CompiledPool;
use deployer_types::{Address, Felt, U256};

use crate::deployer::Deployer;
use crate::handle::ContractHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationMismatch {
    /// Read that produced the value, e.g. `asset_config(ETH)`.
    pub check: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl fmt::Display for VerificationMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: expected {}, got {}",
            self.check, self.field, self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationReport {
    pub pool: String,
    pub checks: usize,
    pub mismatches: Vec<VerificationMismatch>,
}

impl VerificationReport {
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    fn expect_eq(
        &mut self,
        check: &str,
        field: &str,
        expected: impl fmt::Display,
        actual: impl fmt::Display,
    ) {
        let (expected, actual) = (expected.to_string(), actual.to_string());
        self.checks += 1;
        if expected != actual {
            self.mismatch(check, field, expected, actual);
        }
    }

    fn expect_positive(&mut self, check: &str, field: &str, actual: u128) {
        self.checks += 1;
        if actual == 0 {
            self.mismatch(check, field, "> 0".to_string(), actual.to_string());
        }
    }

    fn mismatch(&mut self, check: &str, field: &str, expected: String, actual: String) {
        let mismatch = VerificationMismatch {
            check: check.to_string(),
            field: field.to_string(),
            expected,
            actual,
        };
        warn!(pool = %self.pool, %mismatch, "verification mismatch");
        self.mismatches.push(mismatch);
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "pool {}: {} checks passed", self.pool, self.checks);
        }
        writeln!(
            f,
            "pool {}: {} of {} checks failed",
            self.pool,
            self.mismatches.len(),
            self.checks
        )?;
        for mismatch in &self.mismatches {
            writeln!(f, "  {}", mismatch)?;
        }
        Ok(())
    }
}

/// Cursor over a view's return values.
struct Words<'a> {
    values: &'a [Felt],
    position: usize,
}

impl<'a> Words<'a> {
    fn new(values: &'a [Felt]) -> Self {
        Self { values, position: 0 }
    }

    fn felt(&mut self) -> Option<Felt> {
        let value = self.values.get(self.position).copied();
        self.position += 1;
        value
    }

    fn u128(&mut self) -> Option<u128> {
        self.felt()?.to_u128()
    }

    fn u256(&mut self) -> Option<u128> {
        let low = self.felt()?;
        let high = self.felt()?;
        let value = U256::from_felts(low, high).ok()?;
        (value.high == 0).then_some(value.low)
    }
}

/// Read back `pool` and compare it with the parameters it was created from.
///
/// `oracle` is the oracle adapter the pool is expected to use.
pub async fn verify_pool(
    deployer: &Deployer,
    pool: &ContractHandle,
    oracle: &ContractHandle,
    params: &CompiledPool,
) -> VerificationReport {
    let mut report = VerificationReport {
        pool: params.key.clone(),
        ..Default::default()
    };

    if let Some(values) = read(deployer, &mut report, pool, "oracle", &[], 1).await {
        let expected = oracle
            .try_address()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "(unresolved oracle)".to_string());
        report.expect_eq("oracle", "address", expected, Address::new(values[0]));
    }
    if let Some(values) = read(deployer, &mut report, pool, "fee_recipient", &[], 1).await {
        report.expect_eq(
            "fee_recipient",
            "address",
            params.fee_params.fee_recipient,
            Address::new(values[0]),
        );
    }

    for (index, asset) in params.asset_params.iter().enumerate() {
        let symbol = params
            .v_token_params
            .get(index)
            .map(|v| v.v_token_symbol.trim_start_matches('v').to_string())
            .unwrap_or_else(|| asset.asset.to_string());
        let args = [asset.asset.felt()];

        let check = format!("oracle_config({})", symbol);
        let oracle_params = &params.pragma_oracle_params[index];
        let expected = oracle_params.config_calldata();
        let values = read(deployer, &mut report, oracle, "oracle_config", &args, expected.len()).await;
        if let Some(values) = values {
            let names = [
                "pragma_key",
                "timeout",
                "number_of_sources",
                "start_time_offset",
                "time_window",
                "aggregation_mode",
            ];
            for ((name, want), got) in names.iter().zip(&expected).zip(values.iter()) {
                report.expect_eq(&check, name, want, got);
            }
        }

        let check = format!("interest_rate_config({})", symbol);
        let expected = params.interest_rate_configs[index].fields();
        let values = read(deployer, &mut report, pool, "interest_rate_config", &args, 16).await;
        if let Some(values) = values {
            let mut words = Words::new(&values);
            for (name, want) in expected {
                report.expect_eq(&check, name, want, show(words.u256()));
            }
        }

        let check = format!("asset_config({})", symbol);
        if let Some(values) = read(deployer, &mut report, pool, "asset_config", &args, 20).await {
            let mut words = Words::new(&values);
            let _total_collateral_shares = words.u256();
            let _total_nominal_debt = words.u256();
            let _reserve = words.u256();
            report.expect_eq(
                &check,
                "max_utilization",
                asset.max_utilization,
                show(words.u256()),
            );
            report.expect_eq(&check, "floor", asset.floor, show(words.u256()));
            report.expect_positive(&check, "scale", words.u256().unwrap_or(0));
            report.expect_eq(&check, "is_legacy", asset.is_legacy, show_bool(words.felt()));
            report.expect_positive(&check, "last_updated", words.u128().unwrap_or(0));
            for field in ["last_rate_accumulator", "last_full_utilization_rate"] {
                report.expect_positive(&check, field, words.u256().unwrap_or(0));
            }
            report.expect_eq(&check, "fee_rate", asset.fee_rate, show(words.u256()));
        }
    }

    for pair in &params.pair_params {
        let collateral = params.asset_params[pair.collateral_asset_index as usize].asset;
        let debt = params.asset_params[pair.debt_asset_index as usize].asset;
        let check = format!(
            "pair_config({}, {})",
            pair.collateral_asset_index, pair.debt_asset_index
        );
        let args = [collateral.felt(), debt.felt()];
        if let Some(values) = read(deployer, &mut report, pool, "pair_config", &args, 3).await {
            let mut words = Words::new(&values);
            report.expect_eq(&check, "max_ltv", pair.max_ltv, show(words.u128()));
            report.expect_eq(
                &check,
                "liquidation_factor",
                pair.liquidation_factor,
                show(words.u128()),
            );
            report.expect_eq(&check, "debt_cap", pair.debt_cap, show(words.u128()));
        }
    }

    debug!(
        pool = %report.pool,
        checks = report.checks,
        mismatches = report.mismatches.len(),
        "verified pool"
    );
    report
}

/// Run a view, recording a mismatch if it fails or returns too few values.
async fn read(
    deployer: &Deployer,
    report: &mut VerificationReport,
    target: &ContractHandle,
    method: &str,
    args: &[Felt],
    min_len: usize,
) -> Option<Vec<Felt>> {
    report.checks += 1;
    match deployer.read_state(target, method, args).await {
        Ok(values) if values.len() >= min_len => Some(values),
        Ok(values) => {
            report.mismatch(
                method,
                "length",
                format!("{} values", min_len),
                format!("{} values", values.len()),
            );
            None
        }
        Err(e) => {
            report.mismatch(method, "read", "readable".to_string(), e.to_string());
            None
        }
    }
}

fn show(value: Option<u128>) -> String {
    value.map_or_else(|| "(invalid)".to_string(), |v| v.to_string())
}

fn show_bool(value: Option<Felt>) -> String {
    match value {
        Some(f) if f.is_zero() => "false".to_string(),
        Some(f) if f == Felt::ONE => "true".to_string(),
        _ => "(invalid)".to_string(),
    }
}
