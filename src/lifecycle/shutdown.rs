//! Shutdown coordination.

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// Owns the root cancellation token; long-running calls hold child tokens.
#[derive(Debug, Clone)]
pub struct Shutdown {
    root: CancellationToken,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            root: CancellationToken::new(),
        }
    }

    /// A token cancelled when shutdown triggers, or independently.
    pub fn child(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        if !self.root.is_cancelled() {
            tracing::info!("Shutdown triggered");
        }
        self.root.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once shutdown has been triggered.
    pub async fn triggered(&self) {
        self.root.cancelled().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_cancels_children() {
        let shutdown = Shutdown::new();
        let child = shutdown.child();
        assert!(!child.is_cancelled());

        shutdown.trigger();
        assert!(child.is_cancelled());
        assert!(shutdown.is_triggered());
        shutdown.triggered().await;
    }

    #[test]
    fn test_child_cancel_does_not_propagate_up() {
        let shutdown = Shutdown::new();
        shutdown.child().cancel();
        assert!(!shutdown.is_triggered());
    }
}
