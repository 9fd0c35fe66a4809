//! Connection trait definitions

use rpclb_core::LbResult;

/// Circuit breaker guarding a single backend connection
pub trait Brake: Send + Sync {
    /// Whether the breaker has tripped and the backend must not be used
    fn is_open(&self) -> bool;
}

/// A connection to one backend address
///
/// The balancer only reads the address and breaker state and flips the
/// `connected` flag; everything else belongs to the transport.
pub trait Connection: Send + Sync + 'static {
    /// Backend address this connection is bound to
    fn address(&self) -> &str;

    /// Transport-level reachability
    fn is_connected(&self) -> bool;

    /// Update transport-level reachability
    fn set_connected(&self, connected: bool);

    /// Circuit breaker for this connection
    fn brake(&self) -> &dyn Brake;

    /// Connected and not tripped
    fn is_available(&self) -> bool {
        self.is_connected() && !self.brake().is_open()
    }
}

/// Creates and destroys backend connections
pub trait ClientFactory: Send + Sync + 'static {
    /// Connection type produced by this factory
    type Connection: Connection;

    /// Create a connection bound to `address`
    fn create_client(&self, address: &str) -> LbResult<Self::Connection>;

    /// Release the resources held by `connection`
    fn close_client(&self, connection: &Self::Connection);
}
