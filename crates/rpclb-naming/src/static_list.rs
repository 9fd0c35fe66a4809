//! Resolver for a fixed list of backend addresses

use async_trait::async_trait;
use rpclb_core::{LbError, LbResult, Update};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::debug;

use crate::traits::{Resolver, Watcher};

/// Resolves every target to the same fixed address list
#[derive(Debug, Clone)]
pub struct StaticResolver {
    addresses: Vec<String>,
}

impl StaticResolver {
    /// Create a resolver for `addresses`
    pub fn new(addresses: Vec<String>) -> Self {
        Self { addresses }
    }
}

impl Resolver for StaticResolver {
    fn resolve(&self, target: &str) -> Arc<dyn Watcher> {
        debug!(target = %target, addresses = self.addresses.len(), "Resolving static target");
        let batch = self.addresses.iter().map(Update::add).collect();
        Arc::new(StaticWatcher::new(batch))
    }
}

/// Yields one batch of ADDs, then waits until closed
pub struct StaticWatcher {
    pending: Mutex<Option<Vec<Update>>>,
    closed: watch::Sender<bool>,
}

impl StaticWatcher {
    fn new(batch: Vec<Update>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            pending: Mutex::new(Some(batch)),
            closed,
        }
    }
}

#[async_trait]
impl Watcher for StaticWatcher {
    async fn next(&self) -> LbResult<Vec<Update>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(LbError::Closed);
        }

        if let Some(batch) = self.pending.lock().await.take() {
            return Ok(batch);
        }

        // Static membership never changes again.
        let _ = closed.wait_for(|closed| *closed).await;
        Err(LbError::Closed)
    }

    async fn close(&self) -> LbResult<()> {
        self.closed.send_replace(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_batch_adds_every_address() {
        let resolver = StaticResolver::new(vec![
            "10.0.0.1:50051".to_string(),
            "10.0.0.2:50051".to_string(),
        ]);
        let watcher = resolver.resolve("greeter");

        let batch = watcher.next().await.unwrap();
        assert_eq!(
            batch,
            vec![Update::add("10.0.0.1:50051"), Update::add("10.0.0.2:50051")]
        );
    }

    #[tokio::test]
    async fn test_second_next_waits_until_close() {
        let resolver = StaticResolver::new(vec!["10.0.0.1:50051".to_string()]);
        let watcher = resolver.resolve("greeter");
        watcher.next().await.unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(20), watcher.next()).await;
        assert!(pending.is_err());

        let waiter = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.next().await })
        };
        tokio::task::yield_now().await;
        watcher.close().await.unwrap();

        assert_eq!(waiter.await.unwrap(), Err(LbError::Closed));
    }

    #[tokio::test]
    async fn test_next_after_close_fails() {
        let resolver = StaticResolver::new(vec![]);
        let watcher = resolver.resolve("greeter");
        watcher.close().await.unwrap();

        assert_eq!(watcher.next().await, Err(LbError::Closed));
    }
}
