//! Domain layer for the coverage verifier
//!
//! Observation records, query configuration, results, and the ports the
//! engine needs from the browser side.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, TaskConfigError};
