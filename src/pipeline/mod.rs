//! Synchronization Pipeline Module
//!
//! Owns the registry of declared objects and drives the two-stage
//! prepare/execute synchronization against a live database.

pub mod options;
pub mod orchestrator;

pub use options::{AllowClean, SyncOptions};
pub use orchestrator::{Engine, SyncReport};
