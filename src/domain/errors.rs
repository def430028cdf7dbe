//! Domain errors for the coverage verifier.

use thiserror::Error;

/// Errors raised while building a task from its query configuration.
///
/// These are fatal at session construction: a malformed group must never be
/// allowed to silently match (or fail to match) observations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskConfigError {
    #[error("Query {query}, group {group}: {reason}")]
    InvalidGroup {
        query: usize,
        group: usize,
        reason: String,
    },

    #[error("Query {0} has no alternative groups")]
    EmptyQuery(usize),

    #[error("Malformed task configuration: {0}")]
    Malformed(String),
}

/// Domain-level errors that can occur while evaluating coverage.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Invalid task configuration: {0}")]
    TaskConfig(#[from] TaskConfigError),

    #[error("Navigation fan-in is closed")]
    FanInClosed,
}

pub type DomainResult<T> = Result<T, DomainError>;
