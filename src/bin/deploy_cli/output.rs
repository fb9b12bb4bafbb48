//! Output formatting for pool-deployer CLI
//!
//! Provides human-readable and JSON output formatting for all commands.

use serde::Serialize;
use std::path::Path;

use deployer_cache::{DeploymentRecord, MetricsSnapshot};
use deployer_core::{CreatedPool, UpgradeSummary, VerificationReport};

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Addresses written to the deployment record.
pub fn format_record(
    title: &str,
    record: &DeploymentRecord,
    path: &Path,
    declares: MetricsSnapshot,
    json_output: bool,
) -> String {
    if json_output {
        return to_json(&serde_json::json!({
            "success": true,
            "record": path.display().to_string(),
            "deployment": record,
            "declares": declares,
        }));
    }

    let mut out = format!("\x1b[32m✓ {}\x1b[0m\n\n", title);
    let show = |address: Option<deployer_types::Address>| {
        address.map_or_else(|| "-".to_string(), |a| a.to_hex_full())
    };
    out.push_str(&format!("Network:        {}\n", record.network));
    out.push_str(&format!("Pool factory:   {}\n", show(record.pool_factory)));
    out.push_str(&format!("Oracle:         {}\n", show(record.oracle)));
    out.push_str(&format!("Pragma oracle:  {}\n", show(record.pragma.oracle)));
    out.push_str(&format!("Pragma summary: {}\n", show(record.pragma.summary_stats)));
    if !record.assets.is_empty() {
        out.push_str("\x1b[1mAssets:\x1b[0m\n");
        for (index, asset) in record.assets.iter().enumerate() {
            out.push_str(&format!("  [{}] \x1b[36m{}\x1b[0m\n", index, asset.to_hex_full()));
        }
    }
    if !record.pools.is_empty() {
        out.push_str("\x1b[1mPools:\x1b[0m\n");
        for (name, pool) in &record.pools {
            out.push_str(&format!("  {} \x1b[36m{}\x1b[0m\n", name, pool.to_hex_full()));
        }
    }
    out.push_str(&format!("\n{}\n", declares.summary()));
    out.push_str(&format!("Record: {}", path.display()));
    out
}

pub fn format_created_pools(pools: &[CreatedPool], print_params: bool, json_output: bool) -> String {
    if json_output {
        let entries: Vec<_> = pools
            .iter()
            .map(|pool| {
                let mut entry = serde_json::json!({
                    "pool": pool.params.key,
                    "address": pool.handle.try_address(),
                    "transaction": pool.transaction,
                    "existed": pool.existed(),
                });
                if print_params {
                    entry["params"] = serde_json::to_value(&pool.params).unwrap_or_default();
                }
                entry
            })
            .collect();
        return to_json(&serde_json::json!({ "success": true, "pools": entries }));
    }

    let mut out = String::new();
    for pool in pools {
        let address = pool
            .handle
            .try_address()
            .map_or_else(|| "(pending)".to_string(), |a| a.to_hex_full());
        match pool.transaction {
            Some(hash) => out.push_str(&format!(
                "\x1b[32m✓ Created pool {}\x1b[0m at \x1b[36m{}\x1b[0m (tx {})\n",
                pool.params.key, address, hash
            )),
            None => out.push_str(&format!(
                "\x1b[33m• Pool {} already exists\x1b[0m at \x1b[36m{}\x1b[0m\n",
                pool.params.key, address
            )),
        }
        if print_params {
            out.push_str(&to_json(&pool.params));
            out.push('\n');
        }
    }
    out
}

pub fn format_report(report: &VerificationReport, json_output: bool) -> String {
    if json_output {
        return to_json(&serde_json::json!({
            "success": report.is_ok(),
            "report": report,
        }));
    }
    if report.is_ok() {
        format!("\x1b[32m✓ {}\x1b[0m", report)
    } else {
        format!("\x1b[31m✗ {}\x1b[0m", report.to_string().trim_end())
    }
}

pub fn format_upgrade(summary: &UpgradeSummary, json_output: bool) -> String {
    if json_output {
        return to_json(&serde_json::json!({
            "success": true,
            "class_hashes": summary.class_hashes,
            "factory_transaction": summary.factory_transaction,
            "pool_transaction": summary.pool_transaction,
            "pools": summary.pools,
        }));
    }

    let mut out = String::from("\x1b[32m✓ Upgrade complete\x1b[0m\n\n");
    out.push_str("\x1b[1mClass hashes:\x1b[0m\n");
    for (name, hash) in &summary.class_hashes {
        out.push_str(&format!("  {:<12} {}\n", name, hash));
    }
    out.push_str(&format!("Factory tx: {}\n", summary.factory_transaction));
    match summary.pool_transaction {
        Some(hash) => out.push_str(&format!(
            "Pools tx:   {} ({})",
            hash,
            summary.pools.join(", ")
        )),
        None => out.push_str("No pools to upgrade"),
    }
    out
}

/// Failure of `command`, with the full context chain.
pub fn format_error(command: &str, error: &anyhow::Error, json_output: bool) -> String {
    let causes: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if json_output {
        return to_json(&serde_json::json!({
            "success": false,
            "command": command,
            "error": error.to_string(),
            "causes": causes,
        }));
    }

    let mut out = format!("\x1b[31m✗ {} failed:\x1b[0m {}\n", command, error);
    if !causes.is_empty() {
        out.push_str("Caused by:\n");
        for (depth, cause) in causes.iter().enumerate() {
            out.push_str(&format!("  {}: {}\n", depth + 1, cause));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    fn failure() -> anyhow::Error {
        anyhow!("unknown pool 'missing'").context("failed to compile pools")
    }

    #[test]
    fn test_error_names_the_command_and_its_causes() {
        let text = format_error("create-pool", &failure(), false);
        assert!(text.contains("create-pool failed:"));
        assert!(text.contains("failed to compile pools"));
        assert!(text.contains("Caused by:\n  1: unknown pool 'missing'"));
    }

    #[test]
    fn test_json_error_keeps_the_whole_chain() {
        let text = format_error("verify-pool", &failure(), true);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["command"], "verify-pool");
        assert_eq!(value["error"], "failed to compile pools");
        assert_eq!(value["causes"], serde_json::json!(["unknown pool 'missing'"]));
    }

    #[test]
    fn test_error_without_context_has_no_cause_section() {
        let text = format_error("compile", &anyhow!("config not found"), false);
        assert!(!text.contains("Caused by"));
        assert!(text.ends_with("config not found\n"));
    }
}
