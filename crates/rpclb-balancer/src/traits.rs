//! Balancer trait definitions

use async_trait::async_trait;
use rpclb_core::LbResult;
use std::sync::Arc;

use crate::balancer::DownHandle;

/// Hands out one backend connection per call for a single target
#[async_trait]
pub trait Balancer: Send + Sync {
    /// Connection type handed out by [`Balancer::get`]
    type Connection: Send + Sync;

    /// Start watching `target`; a second call is a no-op
    fn start(&self, target: &str) -> LbResult<()>;

    /// Mark `address` reachable; the handle marks it unreachable again
    fn up(&self, address: &str) -> LbResult<DownHandle>;

    /// Mark `address` unreachable
    fn down(&self, address: &str) -> LbResult<()>;

    /// Pick the next available connection
    fn get(&self) -> LbResult<Arc<Self::Connection>>;

    /// Wait until the first membership batch has been applied
    async fn wait_for_ready(&self) -> LbResult<()>;

    /// Stop watching and destroy every pooled connection
    async fn close(&self) -> LbResult<()>;
}
