//! Graph engine error types.

use std::path::PathBuf;
use thiserror::Error;

use super::ident::IdFormat;

/// Errors that can occur in the graph layer.
///
/// The variants carry the failure taxonomy the rest of the engine relies
/// on: validation and structural errors are never retried, transient
/// conflicts are retried with backoff and only escalate once exhausted.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Malformed, deprecated or placeholder entity id. Rejected before any
    /// write; never coerced into something valid.
    #[error("Invalid entity id `{id}` ({format}): {message}")]
    Validation {
        id: String,
        format: IdFormat,
        message: String,
    },

    /// Concurrent-write conflict reported by the store. Expected to
    /// succeed on retry.
    #[error("Transient write conflict: {0}")]
    TransientConflict(String),

    /// Missing referenced node, malformed query or schema mismatch.
    /// Fails immediately, not retried.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Any other store failure.
    #[error("Database error: {0}")]
    Database(String),

    /// IO error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Graph store not initialized.
    #[error("Graph store not initialized. Run 'lattice init' first.")]
    NotInitialized,
}

impl GraphError {
    /// Whether the retry policy may attempt this operation again.
    pub fn is_transient(&self) -> bool {
        matches!(self, GraphError::TransientConflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_conflicts_are_transient() {
        assert!(GraphError::TransientConflict("busy".into()).is_transient());
        assert!(!GraphError::Structural("missing node".into()).is_transient());
        assert!(!GraphError::Database("boom".into()).is_transient());
        assert!(!GraphError::Validation {
            id: "x".into(),
            format: IdFormat::Malformed,
            message: "bad".into(),
        }
        .is_transient());
    }
}
