use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::query::CombineMode;

/// Coverage of one query set at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub score: f64,
    pub n_queries: usize,
    pub n_covered: usize,
    /// The query input exactly as it was supplied.
    pub queries: Value,
    pub is_query_covered: Vec<bool>,
}

impl CoverageResult {
    #[allow(clippy::cast_precision_loss)]
    pub fn from_snapshot(queries: &Value, covered: &[bool]) -> Self {
        let n_queries = covered.len();
        let n_covered = covered.iter().filter(|c| **c).count();
        let score = if n_queries == 0 {
            1.0
        } else {
            n_covered as f64 / n_queries as f64
        };
        Self {
            score,
            n_queries,
            n_covered,
            queries: queries.clone(),
            is_query_covered: covered.to_vec(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.n_covered == self.n_queries
    }
}

/// Counters kept by a session since its last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub pages_seen: u64,
    pub observations_received: u64,
    pub duplicates_skipped: u64,
    /// Unique records that were run against the trackers.
    pub records_matched: u64,
}

/// Result of a whole session: every sub-task plus the combined verdict.
///
/// `n_queries`, `n_covered` and `is_query_covered` are flattened over the
/// sub-tasks in order, so for a single-set session they equal the one
/// sub-task's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub session_id: Uuid,
    pub mode: CombineMode,
    pub score: f64,
    pub passed: bool,
    pub n_queries: usize,
    pub n_covered: usize,
    pub is_query_covered: Vec<bool>,
    pub sub_tasks: Vec<CoverageResult>,
    pub stats: SessionStats,
}

impl SessionResult {
    pub fn combine(
        session_id: Uuid,
        mode: CombineMode,
        sub_tasks: Vec<CoverageResult>,
        stats: SessionStats,
    ) -> Self {
        let scores: Vec<f64> = sub_tasks.iter().map(|t| t.score).collect();
        let score = mode.combine(&scores);
        Self {
            session_id,
            mode,
            score,
            passed: score >= 1.0,
            n_queries: sub_tasks.iter().map(|t| t.n_queries).sum(),
            n_covered: sub_tasks.iter().map(|t| t.n_covered).sum(),
            is_query_covered: sub_tasks
                .iter()
                .flat_map(|t| t.is_query_covered.iter().copied())
                .collect(),
            sub_tasks,
            stats,
        }
    }
}
