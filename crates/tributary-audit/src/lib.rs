//! Tributary Audit - Run output log and content archive
//!
//! Provides:
//! - `OutputLog`: Timestamped record of every remote call and decision in a run
//! - `ContentArchive`: Directory-tree implementation of `IAuditSink`
//! - `ReasonCode`: Structured reason codes for failed remote calls

pub mod archive;
pub mod error;
pub mod logger;
pub mod reason;

pub use archive::{sanitize_segment, ContentArchive};
pub use error::AuditError;
pub use logger::{LogLevel, OutputLog};
pub use reason::ReasonCode;
