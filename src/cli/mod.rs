//! Command implementations for the `relman` binary

pub mod context;
pub mod github_release;
pub mod release_pr;
pub mod style;

use anstream::println;
use async_trait::async_trait;
use release_manifest::progress::ProgressCallback;
use style::Stylize;

/// Prints orchestrator progress to the terminal, one muted line per step
pub struct CliProgress;

impl CliProgress {
    /// One line per step
    pub const fn compact() -> Self {
        Self
    }
}

#[async_trait]
impl ProgressCallback for CliProgress {
    async fn on_message(&self, message: &str) {
        println!("  {}", message.muted());
    }
}
