//! Endpoint defaults and network inference.

/// Local devnet endpoint used when neither `--rpc-url` nor `RPC_URL` is given.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:5050";

/// Network names accepted by the deployment record and the `--network` guard.
pub const KNOWN_NETWORKS: &[&str] = &["mainnet", "sepolia", "devnet"];

pub fn infer_network_from_url(url: &str) -> Option<&'static str> {
    let lower = url.to_lowercase();
    if lower.contains("sepolia") {
        Some("sepolia")
    } else if lower.contains("mainnet") {
        Some("mainnet")
    } else if lower.contains("devnet")
        || lower.contains("127.0.0.1")
        || lower.contains("localhost")
    {
        Some("devnet")
    } else {
        None
    }
}

/// Explicit network name wins; otherwise infer from the endpoint, defaulting to devnet.
pub fn resolve_network(explicit: Option<&str>, rpc_url: &str) -> String {
    explicit
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .or_else(|| infer_network_from_url(rpc_url).map(String::from))
        .unwrap_or_else(|| "devnet".to_string())
}

pub fn is_known_network(network: &str) -> bool {
    KNOWN_NETWORKS.contains(&network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_network() {
        assert_eq!(
            infer_network_from_url("https://starknet-sepolia.example.io/rpc/v0_7"),
            Some("sepolia")
        );
        assert_eq!(infer_network_from_url(DEFAULT_RPC_URL), Some("devnet"));
        assert_eq!(infer_network_from_url("https://rpc.example.com"), None);
    }

    #[test]
    fn test_resolve_network_prefers_explicit() {
        assert_eq!(resolve_network(Some("Mainnet"), DEFAULT_RPC_URL), "mainnet");
        assert_eq!(resolve_network(None, "https://rpc.example.com"), "devnet");
        assert!(is_known_network("sepolia"));
        assert!(!is_known_network("testnet"));
    }
}
