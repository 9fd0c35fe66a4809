//! rpclb-balancer: Client-side load balancing
//!
//! This crate provides the balancer for one RPC target:
//! - Membership tracking driven by a resolver watcher
//! - Round-robin selection over connected, breaker-closed backends
//! - Readiness gating, up/down reporting and graceful close
//! - Ready/change/error event listeners

pub mod balancer;
pub mod listeners;
pub mod traits;

pub use balancer::{BalancerState, DownHandle, RoundRobinBalancer};
pub use listeners::{ListenerId, Listeners};
pub use traits::Balancer;
