//! Resolver driven by explicitly pushed membership batches
//!
//! Embedders running their own discovery (a registry client, a config
//! watcher) push batches through an [`UpdateSender`]; the balancer sees
//! them through the watcher like any other resolver output.

use async_trait::async_trait;
use rpclb_core::{LbError, LbResult, Update};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::debug;

use crate::traits::{Resolver, Watcher};

type BatchReceiver = mpsc::UnboundedReceiver<LbResult<Vec<Update>>>;

/// Handle used to feed a [`ManualResolver`]
#[derive(Debug, Clone)]
pub struct UpdateSender {
    tx: mpsc::UnboundedSender<LbResult<Vec<Update>>>,
}

impl UpdateSender {
    /// Deliver a membership batch
    pub fn push(&self, batch: Vec<Update>) -> LbResult<()> {
        self.tx.send(Ok(batch)).map_err(|_| LbError::Closed)
    }

    /// Make the watcher fail as if discovery broke down
    pub fn fail(&self, reason: impl Into<String>) -> LbResult<()> {
        self.tx
            .send(Err(LbError::Resolver(reason.into())))
            .map_err(|_| LbError::Closed)
    }
}

/// Resolver whose membership comes from an [`UpdateSender`]
///
/// Every watcher resolved from the same resolver drains the same queue, so
/// a resolver is meant to back a single balancer.
pub struct ManualResolver {
    tx: mpsc::UnboundedSender<LbResult<Vec<Update>>>,
    rx: Arc<Mutex<BatchReceiver>>,
}

impl ManualResolver {
    /// Create a resolver with an empty queue
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Handle for pushing batches
    pub fn sender(&self) -> UpdateSender {
        UpdateSender {
            tx: self.tx.clone(),
        }
    }
}

impl Default for ManualResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver for ManualResolver {
    fn resolve(&self, target: &str) -> Arc<dyn Watcher> {
        debug!(target = %target, "Resolving manual target");
        let (closed, _) = watch::channel(false);
        Arc::new(ManualWatcher {
            rx: self.rx.clone(),
            closed,
        })
    }
}

/// Watcher over a [`ManualResolver`] queue
pub struct ManualWatcher {
    rx: Arc<Mutex<BatchReceiver>>,
    closed: watch::Sender<bool>,
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

#[async_trait]
impl Watcher for ManualWatcher {
    async fn next(&self) -> LbResult<Vec<Update>> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(LbError::Closed);
        }

        tokio::select! {
            biased;
            _ = wait_closed(&mut closed) => Err(LbError::Closed),
            batch = async { self.rx.lock().await.recv().await } => match batch {
                Some(batch) => batch,
                None => Err(LbError::Resolver("update queue dropped".to_string())),
            },
        }
    }

    async fn close(&self) -> LbResult<()> {
        self.closed.send_replace(true);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pushed_batches_arrive_in_order() {
        let resolver = ManualResolver::new();
        let sender = resolver.sender();
        let watcher = resolver.resolve("greeter");

        sender.push(vec![Update::add("10.0.0.1:50051")]).unwrap();
        sender.push(vec![Update::delete("10.0.0.1:50051")]).unwrap();

        assert_eq!(watcher.next().await.unwrap(), vec![Update::add("10.0.0.1:50051")]);
        assert_eq!(
            watcher.next().await.unwrap(),
            vec![Update::delete("10.0.0.1:50051")]
        );
    }

    #[tokio::test]
    async fn test_fail_surfaces_resolver_error() {
        let resolver = ManualResolver::new();
        let watcher = resolver.resolve("greeter");

        resolver.sender().fail("registry unreachable").unwrap();

        assert_eq!(
            watcher.next().await,
            Err(LbError::Resolver("registry unreachable".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_wakes_pending_next() {
        let resolver = ManualResolver::new();
        let watcher = resolver.resolve("greeter");

        let waiter = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.next().await })
        };
        tokio::task::yield_now().await;
        watcher.close().await.unwrap();

        assert_eq!(waiter.await.unwrap(), Err(LbError::Closed));
        assert_eq!(watcher.next().await, Err(LbError::Closed));
    }
}
