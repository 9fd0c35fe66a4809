//! rpclb-core: Core types for rpclb
//!
//! This crate provides the types shared by every rpclb crate:
//! - Membership updates and balancer events
//! - Configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod update;

pub use config::*;
pub use error::*;
pub use update::*;
