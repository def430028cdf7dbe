//! Coverage Verifier - scoring for browsing-agent listing searches
//!
//! A browsing agent is asked to find listings (events, tickets, offers)
//! that satisfy one or more queries. While it navigates, every page it sees
//! is turned into observations, each observation is normalized into a
//! canonical record, and the record is matched against the queries. The
//! session score is the fraction of queries covered at least once.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): queries, observation records, results, config, ports
//! - **Service Layer** (`services`): canonicalization, matching, deduplication, coverage tracking
//! - **Application Layer** (`application`): shared session access and multi-tab navigation fan-in
//! - **Infrastructure Layer** (`infrastructure`): config loading, logging, task files
//! - **CLI Layer** (`cli`): offline replay of recorded navigation logs
//!
//! # Example
//!
//! ```ignore
//! use coverage_verifier::{MatchingConfig, PageSnapshot, Session};
//! use serde_json::json;
//!
//! let mut session = Session::from_value(
//!     &json!([[{"names": "lakers", "cities": "los angeles"}]]),
//!     &MatchingConfig::default(),
//! )?;
//! session.update(&PageSnapshot::new(
//!     "main",
//!     "https://tickets.example/e/1",
//!     vec![json!({"name": "Lakers vs Celtics", "city": "Los Angeles"})],
//! ));
//! assert!(session.compute().passed);
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use application::{FanInStats, NavigationFanIn, SessionHandle, TabHandle};
pub use domain::models::{
    Availability, CombineMode, Config, CoverageResult, EvaluationTask, MatchingConfig,
    ObservationRecord, PageSnapshot, PageView, QuerySet, SessionResult, TabId,
};
pub use domain::ports::{ExtractionError, PageExtractor, PassthroughExtractor};
pub use domain::{DomainError, DomainResult, TaskConfigError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{canonicalize, CandidateMatcher, QueryCoverageTracker, Session};
