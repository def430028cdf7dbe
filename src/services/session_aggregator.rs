//! Session Aggregator: owns the trackers of one evaluation session.
//!
//! `update()` canonicalizes and deduplicates raw observations before
//! feeding them to every tracker; `compute()` is a pure read. The session
//! itself is not synchronized: callers that share it across tasks go
//! through `application::SessionHandle`, which keeps a single writer.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::canonicalizer::{canonicalize, ObservationContext};
use super::coverage_tracker::QueryCoverageTracker;
use super::dedup::{DedupKey, DedupSet};
use crate::domain::errors::TaskConfigError;
use crate::domain::models::{
    CombineMode, EvaluationTask, MatchingConfig, PageSnapshot, SessionResult, SessionStats,
};

/// What one `update()` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub received: usize,
    pub duplicates: usize,
    pub processed: usize,
    pub newly_covered: usize,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    mode: CombineMode,
    trackers: Vec<QueryCoverageTracker>,
    dedup: DedupSet,
    stats: SessionStats,
    next_sequence: u64,
}

impl Session {
    pub fn new(task: EvaluationTask, config: &MatchingConfig) -> Self {
        let trackers = task
            .query_sets
            .into_iter()
            .map(|set| QueryCoverageTracker::new(set, config))
            .collect::<Vec<_>>();
        let session = Self {
            id: Uuid::new_v4(),
            mode: task.mode,
            trackers,
            dedup: DedupSet::new(),
            stats: SessionStats::default(),
            next_sequence: 0,
        };
        info!(
            session_id = %session.id,
            mode = %session.mode,
            sub_tasks = session.trackers.len(),
            "Session created"
        );
        session
    }

    /// Build a session straight from task configuration.
    pub fn from_value(task: &Value, config: &MatchingConfig) -> Result<Self, TaskConfigError> {
        Ok(Self::new(EvaluationTask::from_value(task)?, config))
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn mode(&self) -> CombineMode {
        self.mode
    }

    pub const fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Clear coverage, dedup memory, sold-out evidence and counters.
    pub fn reset(&mut self) {
        for tracker in &mut self.trackers {
            tracker.reset();
        }
        self.dedup.clear();
        self.stats = SessionStats::default();
        self.next_sequence = 0;
        info!(session_id = %self.id, "Session reset");
    }

    /// Apply one page's raw observations. Malformed observations degrade to
    /// unknown fields; nothing here fails.
    pub fn update(&mut self, snapshot: &PageSnapshot) -> UpdateSummary {
        let mut summary = UpdateSummary {
            received: snapshot.observations.len(),
            ..UpdateSummary::default()
        };
        self.stats.pages_seen += 1;

        for raw in &snapshot.observations {
            self.stats.observations_received += 1;
            let context = ObservationContext::new(snapshot.url.clone(), self.next_sequence);
            self.next_sequence += 1;

            let record = canonicalize(raw, &context);
            if !self.dedup.insert(DedupKey::for_record(&record)) {
                self.stats.duplicates_skipped += 1;
                summary.duplicates += 1;
                continue;
            }

            self.stats.records_matched += 1;
            summary.processed += 1;
            for tracker in &mut self.trackers {
                summary.newly_covered += tracker.record(&record).len();
            }
        }

        debug!(
            session_id = %self.id,
            tab = %snapshot.tab,
            url = %snapshot.url,
            received = summary.received,
            duplicates = summary.duplicates,
            newly_covered = summary.newly_covered,
            unique_records = self.dedup.len(),
            "Applied page snapshot"
        );
        summary
    }

    /// Current result. Before any update every query is uncovered.
    pub fn compute(&self) -> SessionResult {
        let sub_tasks = self.trackers.iter().map(QueryCoverageTracker::result).collect();
        SessionResult::combine(self.id, self.mode, sub_tasks, self.stats)
    }
}
