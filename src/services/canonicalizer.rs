//! Canonicalizer: raw extracted key/value bags into typed observation records.
//!
//! Pure and total. Any field that cannot be coerced is left unknown; a
//! non-object input becomes a record with every field unknown.

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};

use crate::domain::models::normalize::{
    lookup_key, normalize_text, parse_amount, parse_count, parse_date, parse_flag, parse_time,
    snake_case_key, value_text,
};
use crate::domain::models::{Availability, ObservationRecord};

// Accepted keys per field, in precedence order, in `lookup_key` form.
const SOURCE_URL_KEYS: &[&str] = &["url", "sourceurl", "pageurl"];
const NAME_KEYS: &[&str] = &["name", "eventname", "title"];
const CATEGORY_KEYS: &[&str] = &["category", "eventcategory", "domain"];
const DATE_KEYS: &[&str] = &["date", "eventdate"];
const TIME_KEYS: &[&str] = &["time", "parsedtime", "eventtime"];
const VENUE_KEYS: &[&str] = &["venue", "venuename"];
const CITY_KEYS: &[&str] = &["city", "location"];
const PRICE_KEYS: &[&str] = &["price", "pricewithfees"];
const TICKET_COUNT_KEYS: &[&str] = &["ticketcount", "quantity", "tickets"];
const AVAILABILITY_KEYS: &[&str] = &["availability", "availabilitystatus", "info"];
const PRESALE_KEY: &str = "ispresale";

const ALL_FIELD_KEYS: &[&[&str]] = &[
    SOURCE_URL_KEYS,
    NAME_KEYS,
    CATEGORY_KEYS,
    DATE_KEYS,
    TIME_KEYS,
    VENUE_KEYS,
    CITY_KEYS,
    PRICE_KEYS,
    TICKET_COUNT_KEYS,
    AVAILABILITY_KEYS,
];

/// Where and when an observation was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationContext {
    pub source_url: String,
    pub observed_at: u64,
}

impl ObservationContext {
    pub fn new(source_url: impl Into<String>, observed_at: u64) -> Self {
        Self {
            source_url: source_url.into(),
            observed_at,
        }
    }
}

/// Raw map viewed through shape-insensitive keys.
struct RawFields<'a> {
    by_key: BTreeMap<String, &'a Value>,
}

impl<'a> RawFields<'a> {
    fn new(map: &'a Map<String, Value>) -> Self {
        let mut by_key = BTreeMap::new();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            by_key.entry(lookup_key(key)).or_insert(value);
        }
        Self { by_key }
    }

    /// First alias whose value survives `coerce`.
    fn first<T>(&self, keys: &[&str], coerce: impl Fn(&Value) -> Option<T>) -> Option<T> {
        keys.iter()
            .filter_map(|key| self.by_key.get(*key))
            .find_map(|value| coerce(*value))
    }
}

/// Normalize one raw observation.
pub fn canonicalize(raw: &Value, context: &ObservationContext) -> ObservationRecord {
    let Value::Object(map) = raw else {
        return ObservationRecord::empty(context.source_url.clone(), context.observed_at);
    };
    let fields = RawFields::new(map);

    let (date, stamped_time) = fields
        .first(DATE_KEYS, |v| v.as_str().and_then(parse_date))
        .map_or((None, None), |(date, time)| (Some(date), time));
    let time = fields.first(TIME_KEYS, coerce_time).or(stamped_time);

    let mut availability = fields
        .first(AVAILABILITY_KEYS, |v| {
            value_text(v).map(|text| Availability::from_status_text(&text))
        })
        .unwrap_or_default();
    if availability == Availability::Unknown
        && fields.first(&[PRESALE_KEY], parse_flag).unwrap_or(false)
    {
        availability = Availability::Presale;
    }

    ObservationRecord {
        source_url: fields
            .first(SOURCE_URL_KEYS, |v| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(String::from))
            .unwrap_or_else(|| context.source_url.clone()),
        observed_at: context.observed_at,
        name: fields.first(NAME_KEYS, value_text),
        category: fields.first(CATEGORY_KEYS, value_text),
        date,
        time,
        venue: fields.first(VENUE_KEYS, value_text),
        city: fields.first(CITY_KEYS, value_text),
        price: fields.first(PRICE_KEYS, parse_amount),
        ticket_count: fields.first(TICKET_COUNT_KEYS, parse_count),
        availability,
        extra: extra_fields(map),
    }
}

fn coerce_time(value: &Value) -> Option<chrono::NaiveTime> {
    let text = value.as_str()?;
    parse_time(text).or_else(|| parse_date(text).and_then(|(_, time)| time))
}

/// Everything not consumed by a typed field, under snake_case keys.
fn extra_fields(map: &Map<String, Value>) -> BTreeMap<String, Value> {
    let consumed: HashSet<&str> = ALL_FIELD_KEYS.iter().flat_map(|keys| keys.iter().copied()).collect();

    let mut extra = BTreeMap::new();
    for (key, value) in map {
        if consumed.contains(lookup_key(key).as_str()) {
            continue;
        }
        let Some(value) = normalize_extra(value) else {
            continue;
        };
        let key = snake_case_key(key);
        if key.is_empty() {
            continue;
        }
        extra.entry(key).or_insert(value);
    }
    extra
}

fn normalize_extra(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) => normalize_text(s).map(Value::String),
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(normalize_extra).collect())),
        other => Some(other.clone()),
    }
}
