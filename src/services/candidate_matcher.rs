//! Candidate Matcher: decides whether one observation satisfies one group.
//!
//! Fields are checked in a fixed order and the first failing field is
//! reported. Availability is always checked last, so a record rejected with
//! [`Mismatch::Availability`] satisfied every other constraint of the group.

use std::fmt;

use crate::domain::models::{Availability, MatchingConfig, ObservationRecord, QueryGroup};

/// The first constraint an observation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mismatch {
    Name,
    Category,
    City,
    Venue,
    Date,
    Time,
    MaxPrice,
    MinPrice,
    TicketCount,
    ListingFilter(&'static str),
    Availability,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => f.write_str("name"),
            Self::Category => f.write_str("category"),
            Self::City => f.write_str("city"),
            Self::Venue => f.write_str("venue"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::MaxPrice => f.write_str("max_price"),
            Self::MinPrice => f.write_str("min_price"),
            Self::TicketCount => f.write_str("ticket_count"),
            Self::ListingFilter(name) => write!(f, "listing:{name}"),
            Self::Availability => f.write_str("availability"),
        }
    }
}

/// Matcher with the session's availability policy baked in.
#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    available_equivalents: Vec<Availability>,
}

impl Default for CandidateMatcher {
    fn default() -> Self {
        Self::new(&MatchingConfig::default())
    }
}

impl CandidateMatcher {
    pub fn new(config: &MatchingConfig) -> Self {
        Self {
            available_equivalents: config.available_equivalents.clone(),
        }
    }

    pub fn matches(&self, record: &ObservationRecord, group: &QueryGroup) -> bool {
        self.evaluate(record, group).is_ok()
    }

    /// Whether `availability` counts as purchasable.
    pub fn is_available(&self, availability: Availability) -> bool {
        availability == Availability::Available || self.available_equivalents.contains(&availability)
    }

    pub fn evaluate(&self, record: &ObservationRecord, group: &QueryGroup) -> Result<(), Mismatch> {
        if !group.names.is_empty() {
            let name = record.name.as_deref().map(str::to_lowercase);
            let hit = name.is_some_and(|name| {
                group
                    .names
                    .iter()
                    .any(|c| name.contains(c.as_str()) || c.contains(name.as_str()))
            });
            if !hit {
                return Err(Mismatch::Name);
            }
        }

        for categories in [&group.categories, &group.domain] {
            if categories.is_empty() {
                continue;
            }
            let category = record.category.as_deref().map(str::to_lowercase);
            if !category.is_some_and(|category| categories.contains(&category)) {
                return Err(Mismatch::Category);
            }
        }

        if !group.cities.is_empty() && !contains_any(record.city.as_deref(), &group.cities) {
            return Err(Mismatch::City);
        }
        if !group.venues.is_empty() && !contains_any(record.venue.as_deref(), &group.venues) {
            return Err(Mismatch::Venue);
        }

        if !group.dates.is_empty() && !record.date.is_some_and(|d| group.dates.contains(&d)) {
            return Err(Mismatch::Date);
        }
        if !group.times.is_empty() && !record.time.is_some_and(|t| group.times.contains(&t)) {
            return Err(Mismatch::Time);
        }

        if let Some(max) = group.max_price {
            if !record.price.is_some_and(|p| p <= max) {
                return Err(Mismatch::MaxPrice);
            }
        }
        if let Some(min) = group.min_price {
            if !record.price.is_some_and(|p| p >= min) {
                return Err(Mismatch::MinPrice);
            }
        }

        if let Some(min) = group.min_tickets {
            if !record.ticket_count.is_some_and(|n| n >= min) {
                return Err(Mismatch::TicketCount);
            }
        }

        check_listing_filters(record, group).map_err(Mismatch::ListingFilter)?;

        if group.require_available && !self.is_available(record.availability) {
            return Err(Mismatch::Availability);
        }

        Ok(())
    }
}

/// Candidate is a substring of the record value. Unknown fails.
fn contains_any(value: Option<&str>, candidates: &[String]) -> bool {
    value.is_some_and(|value| {
        let value = value.to_lowercase();
        candidates.iter().any(|c| value.contains(c.as_str()))
    })
}

/// Substring rule over an optional extra field; absent evidence passes.
fn extra_contains_any(record: &ObservationRecord, key: &str, candidates: &[String]) -> bool {
    let values = record.extra_strings(key);
    values.is_empty()
        || values.iter().any(|v| {
            let v = v.to_lowercase();
            candidates.iter().any(|c| v.contains(c.as_str()))
        })
}

/// Overlap rule over an optional extra list; absent or empty passes.
fn extra_overlaps(record: &ObservationRecord, key: &str, candidates: &[String]) -> bool {
    let values = record.extra_strings(key);
    values.is_empty()
        || values
            .iter()
            .any(|v| candidates.iter().any(|c| v.eq_ignore_ascii_case(c)))
}

fn check_listing_filters(record: &ObservationRecord, group: &QueryGroup) -> Result<(), &'static str> {
    let filters = &group.listing;

    if let Some(max) = filters.max_tickets {
        if !record.ticket_count.is_some_and(|n| n <= max) {
            return Err("max_tickets");
        }
    }
    if !filters.ticket_quantities.is_empty()
        && !record
            .ticket_count
            .is_some_and(|n| filters.ticket_quantities.contains(&n))
    {
        return Err("ticket_quantities");
    }

    let text_filters: [(&'static str, &str, &[String]); 5] = [
        ("sections", "section", filters.sections.as_slice()),
        ("zones", "zone", filters.zones.as_slice()),
        ("rows", "row", filters.rows.as_slice()),
        ("ticket_types", "ticket_type", filters.ticket_types.as_slice()),
        ("delivery_types", "delivery_type", filters.delivery_types.as_slice()),
    ];
    for (name, key, candidates) in text_filters {
        if !candidates.is_empty() && !extra_contains_any(record, key, candidates) {
            return Err(name);
        }
    }

    let flag_filters: [(&'static str, bool, &str); 6] = [
        ("aisle_seat", filters.aisle_seat, "aisle_seat"),
        ("parking_only", filters.parking_only, "is_parking_pass"),
        ("accessible_seating", filters.accessible_seating, "is_accessible"),
        ("instant_download_only", filters.instant_download_only, "is_instant_download"),
        ("vip_packages", filters.vip_packages, "is_vip"),
        ("includes_extras", filters.includes_extras, "includes_extras"),
    ];
    for (name, required, key) in flag_filters {
        if required && record.extra_flag(key) != Some(true) {
            return Err(name);
        }
    }

    if !filters.availability_statuses.is_empty()
        && record.availability != Availability::Unknown
        && !filters.availability_statuses.contains(&record.availability)
    {
        return Err("availability_statuses");
    }

    if !filters.url_sections.is_empty() && !extra_overlaps(record, "url_sections", &filters.url_sections) {
        return Err("url_sections");
    }
    if !filters.url_ticket_classes.is_empty()
        && !extra_overlaps(record, "url_ticket_classes", &filters.url_ticket_classes)
    {
        return Err("url_ticket_classes");
    }
    if let Some(quantity) = filters.url_quantity {
        if record.extra_count("url_quantity").is_some_and(|n| n != quantity) {
            return Err("url_quantity");
        }
    }

    if filters.require_login {
        let logged_out = record
            .extra_str("login_status")
            .is_some_and(|s| s.replace(' ', "_").eq_ignore_ascii_case("logged_out"));
        if logged_out {
            return Err("require_login");
        }
    }

    if !filters.require_page_type.is_empty() {
        if let Some(page_type) = record.extra_str("page_type") {
            if !filters.require_page_type.iter().any(|t| t.eq_ignore_ascii_case(page_type)) {
                return Err("require_page_type");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ListingFilters;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;

    fn lakers_record() -> ObservationRecord {
        let mut record = ObservationRecord::empty("https://tickets.example/event/1", 0);
        record.name = Some("los angeles lakers at la clippers".to_string());
        record.category = Some("sports".to_string());
        record.city = Some("los angeles".to_string());
        record.venue = Some("crypto.com arena".to_string());
        record.date = NaiveDate::from_ymd_opt(2025, 12, 20);
        record.time = NaiveTime::from_hms_opt(19, 30, 0);
        record.price = Some(180.0);
        record.ticket_count = Some(2);
        record.availability = Availability::Available;
        record
    }

    fn names(names: &[&str]) -> QueryGroup {
        QueryGroup {
            names: names.iter().map(ToString::to_string).collect(),
            ..QueryGroup::default()
        }
    }

    #[test]
    fn test_empty_group_matches_anything() {
        let matcher = CandidateMatcher::default();
        let record = ObservationRecord::empty("u", 0);
        assert!(matcher.matches(&record, &QueryGroup::default()));
    }

    #[test]
    fn test_names_are_or_within_field() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();
        assert!(matcher.matches(&record, &names(&["lakers", "clippers"])));
        assert!(matcher.matches(&record, &names(&["warriors", "clippers"])));
        assert_eq!(matcher.evaluate(&record, &names(&["warriors"])), Err(Mismatch::Name));
    }

    #[test]
    fn test_domain_and_categories_must_both_hold() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();
        let both = QueryGroup {
            categories: vec!["sports".to_string(), "concerts".to_string()],
            domain: vec!["sports".to_string()],
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &both));

        let disjoint = QueryGroup {
            categories: vec!["sports".to_string()],
            domain: vec!["theater".to_string()],
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &disjoint), Err(Mismatch::Category));
    }

    #[test]
    fn test_name_matches_in_either_direction() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        record.name = Some("lakers".to_string());
        assert!(matcher.matches(&record, &names(&["los angeles lakers"])));
    }

    #[test]
    fn test_missing_city_fails_city_constraint() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        record.city = None;
        let group = QueryGroup {
            cities: vec!["los angeles".to_string()],
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &group), Err(Mismatch::City));
    }

    #[test]
    fn test_record_values_compare_case_insensitively() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        record.city = Some("Los Angeles, CA".to_string());
        let group = QueryGroup {
            cities: vec!["los angeles".to_string()],
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &group));
    }

    #[test]
    fn test_category_is_exact() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();
        let exact = QueryGroup {
            categories: vec!["sports".to_string()],
            ..QueryGroup::default()
        };
        let partial = QueryGroup {
            categories: vec!["sport".to_string()],
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &exact));
        assert_eq!(matcher.evaluate(&record, &partial), Err(Mismatch::Category));
    }

    #[test]
    fn test_price_and_ticket_bounds() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();

        let cheap = QueryGroup {
            max_price: Some(150.0),
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &cheap), Err(Mismatch::MaxPrice));

        let exact = QueryGroup {
            max_price: Some(180.0),
            min_price: Some(180.0),
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &exact));

        let many = QueryGroup {
            min_tickets: Some(4),
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &many), Err(Mismatch::TicketCount));

        let mut unpriced = lakers_record();
        unpriced.price = None;
        assert_eq!(matcher.evaluate(&unpriced, &cheap), Err(Mismatch::MaxPrice));
    }

    #[test]
    fn test_date_and_time_are_exact() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();
        let group = QueryGroup {
            dates: vec![NaiveDate::from_ymd_opt(2025, 12, 21).unwrap()],
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &group), Err(Mismatch::Date));

        let group = QueryGroup {
            times: vec![NaiveTime::from_hms_opt(19, 30, 0).unwrap()],
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &group));
    }

    #[test]
    fn test_require_available_policy() {
        let matcher = CandidateMatcher::default();
        let group = QueryGroup {
            require_available: true,
            ..QueryGroup::default()
        };
        let mut record = lakers_record();

        for (availability, expected) in [
            (Availability::Available, true),
            (Availability::Limited, true),
            (Availability::SoldOut, false),
            (Availability::Waitlist, false),
            (Availability::Presale, false),
            (Availability::Unknown, false),
        ] {
            record.availability = availability;
            assert_eq!(matcher.matches(&record, &group), expected, "{availability}");
        }

        let strict = CandidateMatcher::new(&MatchingConfig {
            available_equivalents: vec![],
            credit_exhausted_queries: false,
        });
        record.availability = Availability::Limited;
        assert_eq!(strict.evaluate(&record, &group), Err(Mismatch::Availability));
    }

    #[test]
    fn test_availability_is_checked_last() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        record.availability = Availability::SoldOut;
        let group = QueryGroup {
            names: vec!["warriors".to_string()],
            require_available: true,
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &group), Err(Mismatch::Name));
    }

    #[test]
    fn test_listing_filters_absent_evidence_passes() {
        let matcher = CandidateMatcher::default();
        let record = lakers_record();
        let group = QueryGroup {
            listing: ListingFilters {
                zones: vec!["lower level".to_string()],
                url_sections: vec!["101".to_string()],
                url_quantity: Some(2),
                require_page_type: vec!["event_listing".to_string()],
                require_login: true,
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &group));
    }

    #[test]
    fn test_listing_filters_with_evidence() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        record.extra.insert("zone".into(), json!("upper level"));
        record.extra.insert("url_sections".into(), json!(["101", "102"]));
        record.extra.insert("login_status".into(), json!("logged_out"));

        let zone = QueryGroup {
            listing: ListingFilters {
                zones: vec!["lower".to_string()],
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert_eq!(matcher.evaluate(&record, &zone), Err(Mismatch::ListingFilter("zones")));

        let sections = QueryGroup {
            listing: ListingFilters {
                url_sections: vec!["102".to_string()],
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &sections));

        let login = QueryGroup {
            listing: ListingFilters {
                require_login: true,
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert_eq!(
            matcher.evaluate(&record, &login),
            Err(Mismatch::ListingFilter("require_login"))
        );
    }

    #[test]
    fn test_boolean_filters_need_positive_evidence() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        let group = QueryGroup {
            listing: ListingFilters {
                vip_packages: true,
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert_eq!(
            matcher.evaluate(&record, &group),
            Err(Mismatch::ListingFilter("vip_packages"))
        );

        record.extra.insert("is_vip".into(), json!(true));
        assert!(matcher.matches(&record, &group));
    }

    #[test]
    fn test_ticket_quantity_filters_fail_on_unknown() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        let group = QueryGroup {
            listing: ListingFilters {
                ticket_quantities: vec![2, 4],
                max_tickets: Some(4),
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert!(matcher.matches(&record, &group));

        record.ticket_count = None;
        assert_eq!(
            matcher.evaluate(&record, &group),
            Err(Mismatch::ListingFilter("max_tickets"))
        );
    }

    #[test]
    fn test_availability_statuses_unknown_passes() {
        let matcher = CandidateMatcher::default();
        let mut record = lakers_record();
        let group = QueryGroup {
            listing: ListingFilters {
                availability_statuses: vec![Availability::Limited],
                ..ListingFilters::default()
            },
            ..QueryGroup::default()
        };
        assert!(!matcher.matches(&record, &group));
        record.availability = Availability::Unknown;
        assert!(matcher.matches(&record, &group));
    }
}
