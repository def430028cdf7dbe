pub mod candidate_matcher;
pub mod canonicalizer;
pub mod coverage_tracker;
pub mod dedup;
pub mod session_aggregator;

pub use candidate_matcher::{CandidateMatcher, Mismatch};
pub use canonicalizer::{canonicalize, ObservationContext};
pub use coverage_tracker::QueryCoverageTracker;
pub use dedup::{DedupKey, DedupSet};
pub use session_aggregator::{Session, UpdateSummary};
