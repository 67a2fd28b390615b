//! Error types and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while building, finalizing or analyzing a network.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A construction call was rejected; the message names the offender.
    #[error("construction error: {0}")]
    Construction(String),

    /// A node has no driver and was not flagged as allowed to float.
    #[error("node '{0}' has no driver")]
    UndrivenNode(String),

    /// Two or more non-tristate devices drive the same node.
    #[error("node '{0}' is driven by multiple non-tristate outputs")]
    DriverConflict(String),

    /// The combinational graph contains a cycle through the named node.
    #[error("combinational cycle detected through node '{0}'")]
    CombinationalCycle(String),

    /// An operation that requires a finalized network was called early.
    #[error("network has not been finalized")]
    NotFinalized,

    /// A name lookup failed.
    #[error("unknown node '{0}'")]
    UnknownNode(String),
}

/// Cooperative cancellation handle for long simulation runs.
///
/// Cloned tokens share one flag. The kernel polls the token once per
/// processed event and stops cleanly at the current timestamp when it
/// trips, leaving the network resumable.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Requests cancellation; visible to every clone of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Rearms the token for another run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_shared_across_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
        other.reset();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_error_display() {
        let err = GraphError::UndrivenNode("net1".into());
        assert_eq!(err.to_string(), "node 'net1' has no driver");
    }
}
