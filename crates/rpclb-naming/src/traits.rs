//! Resolver trait definitions

use async_trait::async_trait;
use rpclb_core::{LbResult, Update};
use std::sync::Arc;

/// Live subscription to the membership of one target
#[async_trait]
pub trait Watcher: Send + Sync {
    /// Wait for the next batch of membership updates
    ///
    /// Fails once the watcher has been closed or the underlying discovery
    /// mechanism gave up.
    async fn next(&self) -> LbResult<Vec<Update>>;

    /// Stop watching; pending and future `next` calls fail
    async fn close(&self) -> LbResult<()>;
}

/// Turns a target name into a membership subscription
pub trait Resolver: Send + Sync {
    /// Start watching `target`
    ///
    /// Discovery failures are reported through [`Watcher::next`].
    fn resolve(&self, target: &str) -> Arc<dyn Watcher>;
}
