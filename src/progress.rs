//! Progress reporting for long-running operations

use async_trait::async_trait;

/// Receives human-readable status updates while the orchestrator works
#[async_trait]
pub trait ProgressCallback: Send + Sync {
    /// A single status line
    async fn on_message(&self, message: &str);
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

#[async_trait]
impl ProgressCallback for NoProgress {
    async fn on_message(&self, _message: &str) {}
}
