//! Duplicate detection for canonical observation records.
//!
//! Re-scraping an unchanged page must not change anything, and skipping a
//! record must never change a match outcome. The key therefore covers every
//! field the matcher can read: `(name, city, date)` in the clear, everything
//! else through a SHA-256 fingerprint. Only `source_url` and `observed_at`
//! are left out.

use std::collections::{BTreeMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::domain::models::{Availability, ObservationRecord};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub name: Option<String>,
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub fingerprint: String,
}

#[derive(Serialize)]
struct Fingerprinted<'a> {
    category: Option<&'a str>,
    time: Option<NaiveTime>,
    venue: Option<&'a str>,
    price: Option<f64>,
    ticket_count: Option<u32>,
    availability: Availability,
    extra: &'a BTreeMap<String, Value>,
}

impl DedupKey {
    pub fn for_record(record: &ObservationRecord) -> Self {
        let rest = Fingerprinted {
            category: record.category.as_deref(),
            time: record.time,
            venue: record.venue.as_deref(),
            price: record.price,
            ticket_count: record.ticket_count,
            availability: record.availability,
            extra: &record.extra,
        };
        let bytes = serde_json::to_vec(&rest).unwrap_or_else(|_| format!("{record:?}").into_bytes());

        let mut hasher = Sha256::new();
        hasher.update(&bytes);

        Self {
            name: record.name.clone(),
            city: record.city.clone(),
            date: record.date,
            fingerprint: format!("{:x}", hasher.finalize()),
        }
    }
}

/// Keys seen since the last reset.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<DedupKey>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is offered.
    pub fn insert(&mut self, key: DedupKey) -> bool {
        self.seen.insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(url: &str, at: u64) -> ObservationRecord {
        let mut record = ObservationRecord::empty(url, at);
        record.name = Some("lakers vs celtics".to_string());
        record.city = Some("los angeles".to_string());
        record.date = NaiveDate::from_ymd_opt(2025, 12, 20);
        record.price = Some(180.0);
        record
    }

    #[test]
    fn test_same_listing_from_another_page_is_duplicate() {
        let a = DedupKey::for_record(&record("https://a.example/1", 1));
        let b = DedupKey::for_record(&record("https://b.example/2", 9));
        assert_eq!(a, b);

        let mut seen = DedupSet::new();
        assert!(seen.insert(a));
        assert!(!seen.insert(b));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_any_matchable_difference_gives_new_key() {
        let base = record("u", 0);
        let key = DedupKey::for_record(&base);

        let mut cheaper = base.clone();
        cheaper.price = Some(120.0);
        assert_ne!(DedupKey::for_record(&cheaper), key);

        let mut sold_out = base.clone();
        sold_out.availability = Availability::SoldOut;
        assert_ne!(DedupKey::for_record(&sold_out), key);

        let mut zoned = base;
        zoned.extra.insert("zone".into(), json!("floor"));
        assert_ne!(DedupKey::for_record(&zoned), key);
    }

    #[test]
    fn test_clear_forgets_keys() {
        let mut seen = DedupSet::new();
        seen.insert(DedupKey::for_record(&record("u", 0)));
        seen.clear();
        assert!(seen.is_empty());
    }
}
