//! Tributary Core - Domain types and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `ComponentKind`, `ConfigObject`, `DiffEntry`, `HomeworkList`,
//!   `ComponentFilter`, `TrackingIdMap`
//! - **Port definitions** - Traits for adapters: `IInstanceAccessor`, `IAuditSink`
//! - **Configuration** - YAML configuration with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure reconciliation bookkeeping with no I/O.
//! Ports define trait interfaces that adapter crates implement: the HTTP client
//! implements [`ports::IInstanceAccessor`], the audit crate implements
//! [`ports::IAuditSink`]. The sync crate drives both.

pub mod config;
pub mod domain;
pub mod ports;
