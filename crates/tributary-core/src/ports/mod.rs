//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine depends
//! on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IInstanceAccessor`] - Typed reads and writes against one instance
//! - [`IAuditSink`] - Buffered storage for audit payloads

pub mod audit_sink;
pub mod instance;

pub use audit_sink::IAuditSink;
pub use instance::{IInstanceAccessor, InstanceError};
