//! rpclb-naming: Name resolution for rpclb
//!
//! This crate provides membership discovery:
//! - The `Resolver` and `Watcher` traits the balancer consumes
//! - A static address list resolver
//! - A manually fed resolver for embedders and tests

pub mod manual;
pub mod static_list;
pub mod traits;

pub use manual::{ManualResolver, ManualWatcher, UpdateSender};
pub use static_list::{StaticResolver, StaticWatcher};
pub use traits::{Resolver, Watcher};
