//! Event listener registry

use arc_swap::ArcSwap;
use rpclb_core::{BalancerEvent, EventKind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type Handler = Arc<dyn Fn(&BalancerEvent) + Send + Sync>;

/// Identifies a registered listener so it can be removed again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    kind: EventKind,
    handler: Handler,
}

/// Copy-on-write set of event handlers
///
/// Emission walks a snapshot, so handlers may register or unregister
/// listeners without deadlocking; such changes apply from the next event.
pub struct Listeners {
    next_id: AtomicU64,
    listeners: ArcSwap<Vec<Listener>>,
}

impl Listeners {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Register `handler` for events of `kind`
    pub fn on<H>(&self, kind: EventKind, handler: H) -> ListenerId
    where
        H: Fn(&BalancerEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener = Listener {
            id,
            kind,
            handler: Arc::new(handler),
        };
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
        id
    }

    /// Unregister a listener; returns whether it was registered
    pub fn off(&self, id: ListenerId) -> bool {
        let previous = self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|listener| listener.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|listener| listener.id == id)
    }

    /// Deliver `event` to every listener of its kind, in registration order
    pub fn emit(&self, event: &BalancerEvent) {
        let kind = event.kind();
        let listeners = self.listeners.load();
        for listener in listeners.iter().filter(|listener| listener.kind == kind) {
            (listener.handler)(event);
        }
    }
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}
