//! rpclb-client: Backend connection abstraction
//!
//! This crate defines what the balancer needs from a connection:
//! - The `Connection` health signal (connected flag and circuit breaker)
//! - The `ClientFactory` that creates and destroys connections
//! - A basic implementation of both

pub mod basic;
pub mod traits;

pub use basic::{BasicConnection, BasicFactory, ManualBrake};
pub use traits::{Brake, ClientFactory, Connection};
