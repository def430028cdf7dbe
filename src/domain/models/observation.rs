use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{parse_count, parse_flag};

/// Ticket availability state reported for an observed listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    Available,
    Limited,
    SoldOut,
    Presale,
    Waitlist,
    #[default]
    Unknown,
}

impl Availability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Limited => "limited",
            Self::SoldOut => "sold_out",
            Self::Presale => "presale",
            Self::Waitlist => "waitlist",
            Self::Unknown => "unknown",
        }
    }

    /// Classify free-form status text scraped from a page.
    ///
    /// Unavailability wins over everything else: a page reading
    /// "Sold out - get notified when available" is sold out.
    pub fn from_status_text(text: &str) -> Self {
        let lowered = text.trim().to_lowercase().replace(['-', '_'], " ");
        if lowered.contains("sold out")
            || lowered.contains("unavailable")
            || lowered.contains("get notified")
        {
            Self::SoldOut
        } else if lowered.contains("waitlist") || lowered.contains("wait list") {
            Self::Waitlist
        } else if lowered.contains("presale") || lowered.contains("pre sale") {
            Self::Presale
        } else if lowered.contains("limited") || lowered.contains("few left") {
            Self::Limited
        } else if lowered.contains("available") {
            Self::Available
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = String;

    /// Strict parse of a status name, as written in task configuration.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "available" => Ok(Self::Available),
            "limited" => Ok(Self::Limited),
            "sold_out" | "soldout" => Ok(Self::SoldOut),
            "presale" => Ok(Self::Presale),
            "waitlist" => Ok(Self::Waitlist),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown availability status '{other}'")),
        }
    }
}

/// One point-in-time fact about a candidate result the agent looked at.
///
/// Every field except `source_url` and `observed_at` is optional; `None`
/// means "unknown", which fails any constraint on that field. String
/// fields are already lowercased and whitespace-collapsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub source_url: String,
    /// Monotonic sequence number assigned by the session.
    pub observed_at: u64,
    pub name: Option<String>,
    pub category: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
    pub ticket_count: Option<u32>,
    #[serde(default)]
    pub availability: Availability,
    /// Fields only some query groups test, keyed in snake_case.
    #[serde(default)]
    pub extra: BTreeMap<String, Value>,
}

impl ObservationRecord {
    /// A record with every optional field unknown.
    pub fn empty(source_url: impl Into<String>, observed_at: u64) -> Self {
        Self {
            source_url: source_url.into(),
            observed_at,
            name: None,
            category: None,
            date: None,
            time: None,
            venue: None,
            city: None,
            price: None,
            ticket_count: None,
            availability: Availability::Unknown,
            extra: BTreeMap::new(),
        }
    }

    /// Non-empty string value of an extra field.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        match self.extra.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn extra_flag(&self, key: &str) -> Option<bool> {
        self.extra.get(key).and_then(parse_flag)
    }

    pub fn extra_count(&self, key: &str) -> Option<u32> {
        self.extra.get(key).and_then(parse_count)
    }

    /// Extra field viewed as a list of strings. A scalar is a one-element
    /// list; anything else is empty.
    pub fn extra_strings(&self, key: &str) -> Vec<String> {
        fn scalar(value: &Value) -> Option<String> {
            match value {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            }
        }

        match self.extra.get(key) {
            Some(Value::Array(items)) => items.iter().filter_map(scalar).collect(),
            Some(other) => scalar(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}
