//! Deployment errors.
//!
//! | variant               | when                                          | retry?              |
//! |-----------------------|-----------------------------------------------|---------------------|
//! | `Config`              | bad config, before any ledger call            | after fixing config |
//! | `DeclareFailed`       | upload failed; nothing cached                 | yes, rerun          |
//! | `TransactionRejected` | the ledger reverted or refused a batch        | no                  |
//! | `Resolution`          | creation event missing, pending handle read   | no (ordering bug)   |
//! | `FinalityTimeout`     | gave up waiting; may still finalize later     | check by hand       |
//! | `Transport`           | raw transport failure                         | depends             |

use thiserror::Error;

use deployer_config::ConfigError;
use deployer_resolver::ResolutionError;
use deployer_transport::FinalityTimeout;
use deployer_types::TransactionHash;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("declare of {name} failed: {error:#}")]
    DeclareFailed { name: String, error: anyhow::Error },

    #[error("transaction {hash} rejected: {reason}")]
    TransactionRejected {
        hash: TransactionHash,
        reason: String,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("{0}; the transaction may still finalize, check it before rerunning")]
    FinalityTimeout(FinalityTimeout),

    #[error("refusing to submit an empty batch")]
    EmptyBatch,

    #[error("ledger transport error: {0:#}")]
    Transport(anyhow::Error),
}

impl DeployError {
    /// Classify a transport failure, keeping finality timeouts distinct.
    pub fn from_transport(error: anyhow::Error) -> Self {
        match error.downcast::<FinalityTimeout>() {
            Ok(timeout) => DeployError::FinalityTimeout(timeout),
            Err(error) => DeployError::Transport(error),
        }
    }

    /// Safe to rerun the whole flow as is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeployError::DeclareFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use deployer_types::Felt;
    use std::time::Duration;

    #[test]
    fn test_finality_timeout_is_recognized() {
        let timeout = FinalityTimeout {
            hash: TransactionHash(Felt::from(0xabu64)),
            waited: Duration::from_secs(300),
        };
        let err = DeployError::from_transport(anyhow::Error::new(timeout));
        assert!(matches!(err, DeployError::FinalityTimeout(_)));
        assert!(err.to_string().contains("0xab"));
    }

    #[test]
    fn test_transport_error_keeps_message() {
        let err = DeployError::from_transport(anyhow!("connection refused"));
        assert!(matches!(err, DeployError::Transport(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(!err.is_retryable());
    }
}
