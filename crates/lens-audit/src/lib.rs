//! # lens-audit
//!
//! The audit workflow for Sitelens: per-site serialized aggregation of the
//! upstream sources into versioned reports.
//!
//! - [`aggregator`]: concurrent fan-out with retries, deadline, cancellation
//! - [`orchestrator`]: submit, status, report, history, cancel, wait
//! - [`locks`]: keyed async locks, one per site

pub mod aggregator;
pub mod error;
pub mod locks;
pub mod orchestrator;
pub mod policy;

pub use error::AuditError;
pub use orchestrator::Orchestrator;
