//! Environment variable helpers.
//!
//! Runtime knobs (poll intervals, finality timeouts) fall back to environment
//! variables so operators can tune a run without editing the config document.
//!
//! # Example
//!
//! ```
//! use deployer_types::env_utils::{env_string, env_var_or};
//!
//! let timeout: u64 = env_var_or("DEPLOYER_FINALITY_TIMEOUT_SECS", 300);
//! let network = env_string("NETWORK").unwrap_or_else(|| "devnet".to_string());
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Non-empty string value of an environment variable.
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
