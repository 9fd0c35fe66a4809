//! Basic connection and factory implementations
//!
//! `BasicConnection` carries the health signal the balancer needs around an
//! arbitrary transport value. It is enough for embedders whose transport
//! reports reachability through `up`/`down` and for tests.

use rpclb_core::{LbError, LbResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::traits::{Brake, ClientFactory, Connection};

/// Brake that is tripped and reset explicitly
#[derive(Debug, Default)]
pub struct ManualBrake {
    open: AtomicBool,
}

impl ManualBrake {
    /// Create a closed brake
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the breaker
    pub fn trip(&self) {
        self.open.store(true, Ordering::Release);
    }

    /// Close the breaker
    pub fn reset(&self) {
        self.open.store(false, Ordering::Release);
    }
}

impl Brake for ManualBrake {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

/// Connection wrapping a transport value `T`
pub struct BasicConnection<T> {
    address: String,
    connected: AtomicBool,
    closed: AtomicBool,
    brake: Arc<dyn Brake>,
    transport: T,
}

impl<T> BasicConnection<T> {
    /// Create a disconnected connection with a fresh [`ManualBrake`]
    pub fn new(address: impl Into<String>, transport: T) -> Self {
        Self::with_brake(address, transport, Arc::new(ManualBrake::new()))
    }

    /// Create a disconnected connection guarded by `brake`
    pub fn with_brake(address: impl Into<String>, transport: T, brake: Arc<dyn Brake>) -> Self {
        Self {
            address: address.into(),
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            brake,
            transport,
        }
    }

    /// The wrapped transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Whether the factory has closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.connected.store(false, Ordering::Release);
        self.closed.store(true, Ordering::Release);
    }
}

impl<T: Send + Sync + 'static> Connection for BasicConnection<T> {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    fn brake(&self) -> &dyn Brake {
        self.brake.as_ref()
    }
}

impl<T> std::fmt::Debug for BasicConnection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicConnection")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .field("brake_open", &self.brake.is_open())
            .finish()
    }
}

type Connector<T> = dyn Fn(&str) -> Result<T, String> + Send + Sync;

/// Factory building [`BasicConnection`]s from a connector closure
pub struct BasicFactory<T> {
    connect: Box<Connector<T>>,
}

impl<T> BasicFactory<T> {
    /// Create a factory that calls `connect` for every new address
    pub fn new<F>(connect: F) -> Self
    where
        F: Fn(&str) -> Result<T, String> + Send + Sync + 'static,
    {
        Self {
            connect: Box::new(connect),
        }
    }
}

impl BasicFactory<()> {
    /// Factory for connections without a transport value
    pub fn unit() -> Self {
        Self::new(|_| Ok(()))
    }
}

impl<T: Send + Sync + 'static> ClientFactory for BasicFactory<T> {
    type Connection = BasicConnection<T>;

    fn create_client(&self, address: &str) -> LbResult<Self::Connection> {
        let transport = (self.connect)(address).map_err(|reason| LbError::Connection {
            address: address.to_string(),
            reason,
        })?;
        debug!(address = %address, "Created client");
        Ok(BasicConnection::new(address, transport))
    }

    fn close_client(&self, connection: &Self::Connection) {
        connection.mark_closed();
        debug!(address = %connection.address(), "Closed client");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_starts_disconnected() {
        let conn = BasicConnection::new("10.0.0.1:50051", ());
        assert_eq!(conn.address(), "10.0.0.1:50051");
        assert!(!conn.is_connected());
        assert!(!conn.is_available());

        conn.set_connected(true);
        assert!(conn.is_available());
    }

    #[test]
    fn test_tripped_brake_makes_unavailable() {
        let brake = Arc::new(ManualBrake::new());
        let conn = BasicConnection::with_brake("10.0.0.1:50051", (), brake.clone());
        conn.set_connected(true);

        brake.trip();
        assert!(conn.is_connected());
        assert!(!conn.is_available());

        brake.reset();
        assert!(conn.is_available());
    }

    #[test]
    fn test_factory_create_and_close() {
        let factory = BasicFactory::new(|addr: &str| Ok(addr.len()));
        let conn = factory.create_client("10.0.0.1:50051").unwrap();
        assert_eq!(*conn.transport(), 14);

        conn.set_connected(true);
        factory.close_client(&conn);
        assert!(conn.is_closed());
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_factory_connect_failure() {
        let factory: BasicFactory<()> = BasicFactory::new(|_| Err("refused".to_string()));
        let err = factory.create_client("10.0.0.1:50051").unwrap_err();
        assert_eq!(
            err,
            LbError::Connection {
                address: "10.0.0.1:50051".to_string(),
                reason: "refused".to_string(),
            }
        );
    }
}
