//! # Infrastructure Adapters
//!
//! Hosted-backend implementations of the guard registry, identity and
//! storage-signing interfaces.

pub mod backend;
pub mod unconfigured;

pub use backend::{BackendClient, BackendConfig};
pub use unconfigured::UnconfiguredBackend;
