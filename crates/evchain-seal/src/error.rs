//! # Seal Error Types

use thiserror::Error;

use evchain_core::{ChainError, StructuralError};

/// Errors from sealing, ledger and version-control operations.
#[derive(Error, Debug)]
pub enum SealError {
    /// The chain being sealed failed a stage or the enforcer.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// Ledger file I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A ledger line or seal record is not valid JSON for its type.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Commit or tag lookup failed.
    #[error("version control error: {0}")]
    Vcs(String),

    /// A seal record's own hashes do not recompute.
    #[error("seal verification failed: {0}")]
    Verification(String),

    /// A ledger entry breaks density, linkage or its own hash.
    #[error("ledger corrupted at position {position}: {reason}")]
    LedgerCorrupted {
        /// Position of the first bad entry.
        position: u64,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<StructuralError> for SealError {
    fn from(e: StructuralError) -> Self {
        Self::Chain(ChainError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupted_display_names_position() {
        let err = SealError::LedgerCorrupted {
            position: 3,
            reason: "entry_hash mismatch".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("position 3"));
        assert!(msg.contains("entry_hash mismatch"));
    }

    #[test]
    fn chain_errors_stay_transparent() {
        let err = SealError::from(ChainError::InvalidInput("no payload".into()));
        assert_eq!(format!("{err}"), "invalid input: no payload");
    }

    #[test]
    fn structural_errors_wrap_as_chain_errors() {
        let err = SealError::from(StructuralError::DepthExceeded { limit: 64 });
        assert!(matches!(err, SealError::Chain(ChainError::Structural(_))));
    }
}
