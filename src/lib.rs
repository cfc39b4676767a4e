//! Course quality audit: collects engagement and content metrics per course,
//! derives a tiered rating and reconciles it with administrator overrides.

pub mod audit;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filters;
pub mod models;
pub mod rating;
pub mod reconcile;
pub mod report;
pub mod source;

pub use audit::Auditor;
pub use error::{AuditError, Result};
pub use source::AuditSource;
