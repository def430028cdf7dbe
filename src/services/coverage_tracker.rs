//! Query Coverage Tracker: one covered bit per query, set at most once.

use tracing::{debug, info, trace};

use super::candidate_matcher::{CandidateMatcher, Mismatch};
use crate::domain::models::{
    Availability, CoverageResult, MatchingConfig, ObservationRecord, QueryGroup, QuerySet,
};

/// Tracks which queries of one query set have been satisfied.
///
/// Bits only ever go from `false` to `true`; only [`reset`](Self::reset)
/// clears them. With exhausted-query credit enabled, sold-out records that
/// failed a group only on availability are kept as evidence, and a query
/// whose every target was seen sold out counts as covered.
#[derive(Debug, Clone)]
pub struct QueryCoverageTracker {
    query_set: QuerySet,
    matcher: CandidateMatcher,
    credit_exhausted: bool,
    covered: Vec<bool>,
    /// Sold-out evidence per query, per group.
    sold_out: Vec<Vec<Vec<ObservationRecord>>>,
}

impl QueryCoverageTracker {
    pub fn new(query_set: QuerySet, config: &MatchingConfig) -> Self {
        let covered = vec![false; query_set.len()];
        let sold_out = query_set
            .queries
            .iter()
            .map(|q| vec![Vec::new(); q.groups.len()])
            .collect();
        Self {
            query_set,
            matcher: CandidateMatcher::new(config),
            credit_exhausted: config.credit_exhausted_queries,
            covered,
            sold_out,
        }
    }

    /// Match one observation against every uncovered query. Returns the
    /// indices of queries this observation newly covered.
    pub fn record(&mut self, observation: &ObservationRecord) -> Vec<usize> {
        let mut newly_covered = Vec::new();

        for (qi, query) in self.query_set.queries.iter().enumerate() {
            if self.covered[qi] {
                continue;
            }

            let mut new_evidence = false;
            for (gi, group) in query.groups.iter().enumerate() {
                match self.matcher.evaluate(observation, group) {
                    Ok(()) => {
                        info!(
                            query_index = qi,
                            group_index = gi,
                            source_url = %observation.source_url,
                            "Query covered"
                        );
                        self.covered[qi] = true;
                        newly_covered.push(qi);
                        break;
                    }
                    Err(Mismatch::Availability)
                        if self.credit_exhausted
                            && observation.availability == Availability::SoldOut =>
                    {
                        self.sold_out[qi][gi].push(observation.clone());
                        new_evidence = true;
                    }
                    Err(mismatch) => {
                        trace!(query_index = qi, group_index = gi, %mismatch, "Group rejected observation");
                    }
                }
            }

            if !self.covered[qi] && new_evidence && self.is_exhausted(qi) {
                info!(query_index = qi, "Query covered: every target observed sold out");
                self.covered[qi] = true;
                newly_covered.push(qi);
            }
        }

        newly_covered
    }

    /// Current covered bits, in query order.
    pub fn snapshot(&self) -> Vec<bool> {
        self.covered.clone()
    }

    pub fn n_covered(&self) -> usize {
        self.covered.iter().filter(|c| **c).count()
    }

    pub fn result(&self) -> CoverageResult {
        CoverageResult::from_snapshot(&self.query_set.raw, &self.covered)
    }

    /// Clear coverage and sold-out evidence.
    pub fn reset(&mut self) {
        self.covered.fill(false);
        for groups in &mut self.sold_out {
            for evidence in groups {
                evidence.clear();
            }
        }
        debug!(n_queries = self.covered.len(), "Coverage tracker reset");
    }

    fn is_exhausted(&self, qi: usize) -> bool {
        self.query_set.queries[qi]
            .groups
            .iter()
            .zip(&self.sold_out[qi])
            .all(|(group, evidence)| group_exhausted(group, evidence))
    }
}

/// Candidates of one field as combination options; an unset field is a
/// single wildcard.
fn options<T>(candidates: &[T]) -> Vec<Option<&T>> {
    if candidates.is_empty() {
        vec![None]
    } else {
        candidates.iter().map(Some).collect()
    }
}

/// Every candidate combination of the group has a sold-out record. A
/// combination is only provable through its date or time.
fn group_exhausted(group: &QueryGroup, evidence: &[ObservationRecord]) -> bool {
    if evidence.is_empty() || (group.dates.is_empty() && group.times.is_empty()) {
        return false;
    }

    let names = options(&group.names);
    let venues = options(&group.venues);
    let cities = options(&group.cities);
    let dates = options(&group.dates);
    let times = options(&group.times);

    for name in &names {
        for venue in &venues {
            for city in &cities {
                for date in &dates {
                    for time in &times {
                        let proven = evidence.iter().any(|record| {
                            let name_ok = name.is_none_or(|n| {
                                record.name.as_deref().is_some_and(|r| {
                                    let r = r.to_lowercase();
                                    r.contains(n.as_str()) || n.contains(r.as_str())
                                })
                            });
                            let venue_ok = venue.is_none_or(|v| {
                                record
                                    .venue
                                    .as_deref()
                                    .is_some_and(|r| r.to_lowercase().contains(v.as_str()))
                            });
                            let city_ok = city.is_none_or(|c| {
                                record
                                    .city
                                    .as_deref()
                                    .is_some_and(|r| r.to_lowercase().contains(c.as_str()))
                            });
                            let when_ok = date.is_some_and(|d| record.date == Some(*d))
                                || time.is_some_and(|t| record.time == Some(*t));
                            name_ok && venue_ok && city_ok && when_ok
                        });
                        if !proven {
                            return false;
                        }
                    }
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn tracker(raw: serde_json::Value) -> QueryCoverageTracker {
        let set = QuerySet::from_value(&raw).unwrap();
        QueryCoverageTracker::new(set, &MatchingConfig::default())
    }

    fn listing(name: &str, price: f64) -> ObservationRecord {
        let mut record = ObservationRecord::empty("https://tickets.example/e", 0);
        record.name = Some(name.to_string());
        record.city = Some("los angeles".to_string());
        record.price = Some(price);
        record.availability = Availability::Available;
        record
    }

    #[test]
    fn test_initial_snapshot_is_all_false() {
        let t = tracker(json!([[{"names": "lakers"}], [{"names": "kings"}]]));
        assert_eq!(t.snapshot(), vec![false, false]);
        assert!(t.result().score.abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_sets_bits_once() {
        let mut t = tracker(json!([[{"names": "lakers"}], [{"names": "kings"}]]));
        assert_eq!(t.record(&listing("lakers vs celtics", 100.0)), vec![0]);
        assert_eq!(t.record(&listing("lakers vs celtics", 100.0)), Vec::<usize>::new());
        assert_eq!(t.snapshot(), vec![true, false]);

        let result = t.result();
        assert!((result.score - 0.5).abs() < f64::EPSILON);
        assert_eq!(result.n_covered, 1);
    }

    #[test]
    fn test_any_group_covers_query() {
        let mut t = tracker(json!([[{"names": "lakers", "max_price": 50}, {"names": "lakers", "cities": "los angeles"}]]));
        assert_eq!(t.record(&listing("lakers", 100.0)), vec![0]);
    }

    #[test]
    fn test_failed_match_never_clears_bit() {
        let mut t = tracker(json!([[{"names": "lakers", "max_price": 150}]]));
        t.record(&listing("lakers", 100.0));
        t.record(&listing("lakers", 900.0));
        assert_eq!(t.snapshot(), vec![true]);
    }

    #[test]
    fn test_reset_clears_bits() {
        let mut t = tracker(json!([[{"names": "lakers"}]]));
        t.record(&listing("lakers", 100.0));
        t.reset();
        assert_eq!(t.snapshot(), vec![false]);
    }

    fn sold_out(name: &str, date: &str) -> ObservationRecord {
        let mut record = listing(name, 100.0);
        record.date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok();
        record.availability = Availability::SoldOut;
        record
    }

    fn exhausted_tracker(credit: bool) -> QueryCoverageTracker {
        let set = QuerySet::from_value(&json!([[{
            "names": ["lakers", "clippers"],
            "dates": "2025-12-20",
            "require_available": true
        }]]))
        .unwrap();
        let config = MatchingConfig {
            credit_exhausted_queries: credit,
            ..MatchingConfig::default()
        };
        QueryCoverageTracker::new(set, &config)
    }

    #[test]
    fn test_sold_out_everywhere_credits_query_when_enabled() {
        let mut t = exhausted_tracker(true);
        assert!(t.record(&sold_out("lakers at home", "2025-12-20")).is_empty());
        assert_eq!(t.record(&sold_out("la clippers", "2025-12-20")), vec![0]);
    }

    #[test]
    fn test_partial_sold_out_evidence_is_not_enough() {
        let mut t = exhausted_tracker(true);
        t.record(&sold_out("lakers at home", "2025-12-20"));
        t.record(&sold_out("clippers", "2025-12-21"));
        assert_eq!(t.snapshot(), vec![false]);
    }

    #[test]
    fn test_sold_out_is_not_credited_by_default() {
        let mut t = exhausted_tracker(false);
        t.record(&sold_out("lakers", "2025-12-20"));
        t.record(&sold_out("clippers", "2025-12-20"));
        assert_eq!(t.snapshot(), vec![false]);
    }

    #[test]
    fn test_group_without_date_or_time_is_never_exhausted() {
        let set = QuerySet::from_value(&json!([[{"names": "lakers", "require_available": true}]])).unwrap();
        let config = MatchingConfig {
            credit_exhausted_queries: true,
            ..MatchingConfig::default()
        };
        let mut t = QueryCoverageTracker::new(set, &config);
        t.record(&sold_out("lakers", "2025-12-20"));
        assert_eq!(t.snapshot(), vec![false]);
    }
}
