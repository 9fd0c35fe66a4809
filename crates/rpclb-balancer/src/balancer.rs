//! Round-robin balancer over a resolver-driven connection pool

use arc_swap::ArcSwap;
use async_trait::async_trait;
use rpclb_client::{ClientFactory, Connection};
use rpclb_core::{BalancerEvent, EventKind, LbError, LbResult, Update, UpdateOp};
use rpclb_naming::{Resolver, Watcher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::listeners::{ListenerId, Listeners};
use crate::traits::Balancer;

/// Lifecycle of a balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancerState {
    /// Constructed, not watching yet
    Created,
    /// Watching, no batch applied yet
    Started,
    /// At least one batch applied
    Ready,
    /// Terminal
    Closed,
}

impl std::fmt::Display for BalancerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalancerState::Created => write!(f, "Created"),
            BalancerState::Started => write!(f, "Started"),
            BalancerState::Ready => write!(f, "Ready"),
            BalancerState::Closed => write!(f, "Closed"),
        }
    }
}

/// Round-robin balancer for one target
///
/// Membership comes from the resolver's watcher and is applied by a
/// background task, the only writer of the pool. Selection reads a pool
/// snapshot without locking and skips connections that are disconnected or
/// whose circuit breaker is open.
pub struct RoundRobinBalancer<F: ClientFactory> {
    inner: Arc<Inner<F>>,
}

struct Inner<F: ClientFactory> {
    resolver: Arc<dyn Resolver>,
    factory: F,
    /// Pooled connections in ADD arrival order, one per address
    pool: ArcSwap<Vec<Arc<F::Connection>>>,
    cursor: AtomicUsize,
    state: watch::Sender<BalancerState>,
    /// Set by start, taken by close
    watcher: std::sync::Mutex<Option<Arc<dyn Watcher>>>,
    task: OnceLock<JoinHandle<()>>,
    /// Serializes batch application against close
    membership: Mutex<()>,
    listeners: Listeners,
}

impl<F: ClientFactory> RoundRobinBalancer<F> {
    /// Create a balancer that resolves through `resolver` and builds
    /// connections with `factory`
    pub fn new(resolver: Arc<dyn Resolver>, factory: F) -> Self {
        let (state, _) = watch::channel(BalancerState::Created);
        Self {
            inner: Arc::new(Inner {
                resolver,
                factory,
                pool: ArcSwap::from_pointee(Vec::new()),
                cursor: AtomicUsize::new(0),
                state,
                watcher: std::sync::Mutex::new(None),
                task: OnceLock::new(),
                membership: Mutex::new(()),
                listeners: Listeners::new(),
            }),
        }
    }

    /// Register `handler` for events of `kind`
    pub fn on<H>(&self, kind: EventKind, handler: H) -> ListenerId
    where
        H: Fn(&BalancerEvent) + Send + Sync + 'static,
    {
        self.inner.listeners.on(kind, handler)
    }

    /// Unregister a listener; returns whether it was registered
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.off(id)
    }

    /// Pooled addresses in pool order
    pub fn addresses(&self) -> Vec<String> {
        self.inner.addresses()
    }

    /// Number of pooled connections, available or not
    pub fn len(&self) -> usize {
        self.inner.pool.load().len()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current lifecycle state
    pub fn state(&self) -> BalancerState {
        *self.inner.state.borrow()
    }

    /// Whether the first batch has been applied and the balancer is open
    pub fn is_ready(&self) -> bool {
        self.state() == BalancerState::Ready
    }

    /// Whether [`Balancer::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

#[async_trait]
impl<F: ClientFactory> Balancer for RoundRobinBalancer<F> {
    type Connection = F::Connection;

    fn start(&self, target: &str) -> LbResult<()> {
        let mut previous = BalancerState::Created;
        let started = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if *state == BalancerState::Created {
                *state = BalancerState::Started;
                true
            } else {
                false
            }
        });

        if !started {
            if previous == BalancerState::Closed {
                return Err(LbError::Closed);
            }
            warn!(target = %target, state = %previous, "Balancer already started");
            return Ok(());
        }

        info!(target = %target, "Starting balancer");

        let watcher = self.inner.resolver.resolve(target);

        let mut slot = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // close() may have run while the target was resolving. It found no
        // watcher to close, so this one is closed here instead.
        if self.inner.is_closed() {
            drop(slot);
            debug!(target = %target, "Balancer closed during start, closing watcher");
            tokio::spawn(async move {
                if let Err(e) = watcher.close().await {
                    warn!(error = %e, "Failed to close watcher");
                }
            });
            return Err(LbError::Closed);
        }

        *slot = Some(watcher.clone());
        let inner = self.inner.clone();
        let task = tokio::spawn(async move { inner.watch_updates(watcher).await });
        let _ = self.inner.task.set(task);

        Ok(())
    }

    fn up(&self, address: &str) -> LbResult<DownHandle> {
        self.inner.set_connected(address, true)?;

        let inner: Arc<dyn MarkDown> = self.inner.clone();
        Ok(DownHandle {
            address: address.to_string(),
            balancer: Arc::downgrade(&inner),
        })
    }

    fn down(&self, address: &str) -> LbResult<()> {
        self.inner.set_connected(address, false)
    }

    fn get(&self) -> LbResult<Arc<F::Connection>> {
        if self.inner.is_closed() {
            return Err(LbError::Closed);
        }

        let pool = self.inner.pool.load();
        let available: Vec<&Arc<F::Connection>> = pool
            .iter()
            .filter(|client| client.is_available())
            .collect();

        if available.is_empty() {
            debug!(pool_size = pool.len(), "No backend available");
            return Err(LbError::NoBackendAvailable);
        }

        let next = self.inner.cursor.fetch_add(1, Ordering::Relaxed);
        let client = available[next % available.len()];

        debug!(
            address = %client.address(),
            available = available.len(),
            pool_size = pool.len(),
            "Selected backend"
        );

        Ok(Arc::clone(client))
    }

    async fn wait_for_ready(&self) -> LbResult<()> {
        let mut state = self.inner.state.subscribe();
        let reached = state
            .wait_for(|state| matches!(state, BalancerState::Ready | BalancerState::Closed))
            .await
            .map(|state| *state);

        match reached {
            Ok(BalancerState::Ready) => Ok(()),
            _ => Err(LbError::Closed),
        }
    }

    async fn close(&self) -> LbResult<()> {
        let _membership = self.inner.membership.lock().await;

        let closing = self.inner.state.send_if_modified(|state| {
            if *state == BalancerState::Closed {
                false
            } else {
                *state = BalancerState::Closed;
                true
            }
        });
        if !closing {
            return Err(LbError::Closed);
        }

        info!(pool_size = self.len(), "Closing balancer");

        let watcher = self
            .inner
            .watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let result = match watcher {
            Some(watcher) => watcher.close().await.map_err(resolver_failure),
            None => Ok(()),
        };
        if let Err(e) = &result {
            warn!(error = %e, "Failed to close watcher");
        }

        let pool = self.inner.pool.swap(Arc::new(Vec::new()));
        for client in pool.iter() {
            self.inner.factory.close_client(client);
        }
        self.inner.stop_task();

        debug!(closed_clients = pool.len(), "Balancer closed");

        result
    }
}

impl<F: ClientFactory> Drop for RoundRobinBalancer<F> {
    fn drop(&mut self) {
        if !self.inner.is_closed() && self.inner.task.get().is_some() {
            warn!(pool_size = self.len(), "Balancer dropped without close");
        }
        self.inner.stop_task();
    }
}

impl<F: ClientFactory> Inner<F> {
    async fn watch_updates(self: Arc<Self>, watcher: Arc<dyn Watcher>) {
        debug!("Watching membership updates");

        loop {
            let updates = match watcher.next().await {
                Ok(updates) => updates,
                Err(e) => {
                    if self.is_closed() {
                        debug!("Watcher closed, stopping update loop");
                    } else {
                        let err = resolver_failure(e);
                        warn!(error = %err, "Watcher failed, stopping update loop");
                        self.listeners.emit(&BalancerEvent::Error(err));
                    }
                    return;
                }
            };

            debug!(updates = ?updates, "Got membership updates");

            let _membership = self.membership.lock().await;
            if self.is_closed() {
                debug!(discarded = updates.len(), "Balancer closed, discarding updates");
                return;
            }

            for update in updates {
                self.apply(update);
            }

            let became_ready = self.state.send_if_modified(|state| {
                if *state == BalancerState::Started {
                    *state = BalancerState::Ready;
                    true
                } else {
                    false
                }
            });
            if became_ready {
                info!(pool_size = self.pool.load().len(), "Balancer ready");
                self.listeners.emit(&BalancerEvent::Ready);
            }

            self.listeners.emit(&BalancerEvent::Change(self.addresses()));
        }
    }

    fn apply(&self, update: Update) {
        match update.op {
            UpdateOp::Add => self.add_client(&update.addr),
            UpdateOp::Delete => self.remove_client(&update.addr),
            UpdateOp::Other(op) => {
                warn!(address = %update.addr, op = %op, "Unknown update op");
                self.listeners
                    .emit(&BalancerEvent::Error(LbError::UnknownUpdateOperation(op)));
            }
        }
    }

    fn add_client(&self, address: &str) {
        let pool = self.pool.load_full();
        if pool.iter().any(|client| client.address() == address) {
            warn!(address = %address, "Ignoring duplicate address");
            return;
        }

        match self.factory.create_client(address) {
            Ok(client) => {
                let mut next = Vec::with_capacity(pool.len() + 1);
                next.extend(pool.iter().cloned());
                next.push(Arc::new(client));
                self.pool.store(Arc::new(next));
                debug!(address = %address, pool_size = pool.len() + 1, "Added address");
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Failed to create client");
                self.listeners.emit(&BalancerEvent::Error(e));
            }
        }
    }

    fn remove_client(&self, address: &str) {
        let pool = self.pool.load_full();
        let Some(client) = pool.iter().find(|client| client.address() == address) else {
            debug!(address = %address, "Address not in pool");
            return;
        };

        // Unpublish before closing so get() never hands out a closed client.
        let next: Vec<_> = pool
            .iter()
            .filter(|client| client.address() != address)
            .cloned()
            .collect();
        let remaining = next.len();
        self.pool.store(Arc::new(next));
        self.factory.close_client(client);

        debug!(address = %address, pool_size = remaining, "Removed address");
    }

    fn set_connected(&self, address: &str, connected: bool) -> LbResult<()> {
        if self.is_closed() {
            return Err(LbError::Closed);
        }

        let pool = self.pool.load();
        let mut matched = 0;
        for client in pool.iter().filter(|client| client.address() == address) {
            client.set_connected(connected);
            matched += 1;
        }

        debug!(
            address = %address,
            connected = connected,
            matched = matched,
            "Updated backend connectivity"
        );
        Ok(())
    }

    fn addresses(&self) -> Vec<String> {
        self.pool
            .load()
            .iter()
            .map(|client| client.address().to_string())
            .collect()
    }

    fn is_closed(&self) -> bool {
        *self.state.borrow() == BalancerState::Closed
    }

    fn stop_task(&self) {
        if let Some(task) = self.task.get() {
            task.abort();
        }
    }
}

fn resolver_failure(err: LbError) -> LbError {
    match err {
        LbError::Resolver(_) => err,
        other => LbError::Resolver(other.to_string()),
    }
}

trait MarkDown: Send + Sync {
    fn mark_down(&self, address: &str) -> LbResult<()>;
}

impl<F: ClientFactory> MarkDown for Inner<F> {
    fn mark_down(&self, address: &str) -> LbResult<()> {
        self.set_connected(address, false)
    }
}

/// Reports a backend brought up with [`Balancer::up`] as down again
///
/// Holds only a weak reference; once the balancer is dropped, calling it
/// does nothing.
#[derive(Clone)]
pub struct DownHandle {
    address: String,
    balancer: Weak<dyn MarkDown>,
}

impl DownHandle {
    /// Address this handle reports on
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Same as calling `down` with this handle's address
    pub fn down(&self) -> LbResult<()> {
        match self.balancer.upgrade() {
            Some(balancer) => balancer.mark_down(&self.address),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for DownHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownHandle")
            .field("address", &self.address)
            .finish()
    }
}
