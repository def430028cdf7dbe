//! Query configuration: groups, queries, query sets and evaluation tasks.
//!
//! Groups arrive as loosely-typed maps (snake_case or camelCase keys, single
//! values or lists). They are validated once, at construction, into
//! [`QueryGroup`], whose candidate lists are normalized the same way the
//! canonicalizer normalizes observations.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{normalize_text, parse_date, parse_time};
use super::observation::Availability;
use crate::domain::errors::TaskConfigError;

/// How sub-task scores of a multi-query-set session are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Best sub-task score; passes when any sub-task is fully covered.
    #[default]
    Any,
    /// Mean of sub-task scores.
    #[serde(alias = "mean")]
    All,
    /// 1.0 only when every sub-task is fully covered, otherwise 0.0.
    #[serde(alias = "conjunction")]
    AllStrict,
}

impl CombineMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
            Self::AllStrict => "all_strict",
        }
    }

    /// Combine sub-task scores. No sub-tasks means nothing was asked: 1.0.
    #[allow(clippy::cast_precision_loss)]
    pub fn combine(self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 1.0;
        }
        match self {
            Self::Any => scores.iter().copied().fold(0.0, f64::max),
            Self::All => scores.iter().sum::<f64>() / scores.len() as f64,
            Self::AllStrict => {
                if scores.iter().all(|s| *s >= 1.0) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl fmt::Display for CombineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombineMode {
    type Err = TaskConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "any" => Ok(Self::Any),
            "all" | "mean" => Ok(Self::All),
            "all_strict" | "conjunction" => Ok(Self::AllStrict),
            other => Err(TaskConfigError::Malformed(format!("unknown mode '{other}'"))),
        }
    }
}

/// Listing-level filters that read from a record's `extra` fields.
///
/// These describe filters the agent may or may not have applied on the
/// page, so most of them pass when the record carries no evidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilters {
    pub max_tickets: Option<u32>,
    pub ticket_quantities: Vec<u32>,
    pub sections: Vec<String>,
    pub zones: Vec<String>,
    pub rows: Vec<String>,
    pub ticket_types: Vec<String>,
    pub delivery_types: Vec<String>,
    pub aisle_seat: bool,
    pub parking_only: bool,
    pub accessible_seating: bool,
    pub instant_download_only: bool,
    pub vip_packages: bool,
    pub includes_extras: bool,
    pub availability_statuses: Vec<Availability>,
    pub url_sections: Vec<String>,
    pub url_ticket_classes: Vec<String>,
    pub url_quantity: Option<u32>,
    pub require_login: bool,
    pub require_page_type: Vec<String>,
}

/// One alternative set of constraints. Empty lists and `None` bounds are
/// unset constraints; everything that is set must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryGroup {
    pub names: Vec<String>,
    pub categories: Vec<String>,
    /// Second category constraint; when both are set, both must hold.
    pub domain: Vec<String>,
    pub cities: Vec<String>,
    pub venues: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub times: Vec<NaiveTime>,
    pub min_tickets: Option<u32>,
    pub max_price: Option<f64>,
    pub min_price: Option<f64>,
    pub require_available: bool,
    pub listing: ListingFilters,
}

impl QueryGroup {
    /// Validate one raw group. `query` and `group` are only used to
    /// position errors.
    pub fn from_value(value: &Value, query: usize, group: usize) -> Result<Self, TaskConfigError> {
        let invalid = |reason: String| TaskConfigError::InvalidGroup {
            query,
            group,
            reason,
        };
        if !value.is_object() {
            return Err(invalid("group must be a map of constraints".to_string()));
        }
        let spec = QueryGroupSpec::deserialize(value).map_err(|e| invalid(e.to_string()))?;
        spec.validate().map_err(invalid)
    }
}

/// An ordered list of alternative groups; covered when any group matches.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub groups: Vec<QueryGroup>,
}

/// The queries of one evaluation sub-task, plus the input they were built
/// from so results can echo it back unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet {
    pub queries: Vec<Query>,
    pub raw: Value,
}

impl QuerySet {
    /// Build a query set from `[[group, ...], ...]`.
    pub fn from_value(value: &Value) -> Result<Self, TaskConfigError> {
        let Value::Array(raw_queries) = value else {
            return Err(TaskConfigError::Malformed(
                "a query set must be a list of queries".to_string(),
            ));
        };

        let mut queries = Vec::with_capacity(raw_queries.len());
        for (qi, raw_query) in raw_queries.iter().enumerate() {
            let Value::Array(raw_groups) = raw_query else {
                return Err(TaskConfigError::Malformed(format!(
                    "query {qi} must be a list of groups"
                )));
            };
            if raw_groups.is_empty() {
                return Err(TaskConfigError::EmptyQuery(qi));
            }
            let groups = raw_groups
                .iter()
                .enumerate()
                .map(|(gi, g)| QueryGroup::from_value(g, qi, gi))
                .collect::<Result<Vec<_>, _>>()?;
            queries.push(Query { groups });
        }

        Ok(Self {
            queries,
            raw: value.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Everything a session needs to know about what the agent was asked to find.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationTask {
    pub mode: CombineMode,
    pub query_sets: Vec<QuerySet>,
}

impl EvaluationTask {
    /// A single-set task.
    pub fn single(query_set: QuerySet) -> Self {
        Self {
            mode: CombineMode::Any,
            query_sets: vec![query_set],
        }
    }

    /// Accepts `{"queries": ..., "mode": ...}`, `{"query_sets": ..., "mode": ...}`
    /// or a bare list of queries.
    pub fn from_value(value: &Value) -> Result<Self, TaskConfigError> {
        match value {
            Value::Array(_) => Ok(Self::single(QuerySet::from_value(value)?)),
            Value::Object(map) => {
                let mut mode = CombineMode::default();
                let mut single = None;
                let mut multi = None;
                for (key, entry) in map {
                    match key.as_str() {
                        "mode" => {
                            let Value::String(name) = entry else {
                                return Err(TaskConfigError::Malformed(
                                    "mode must be a string".to_string(),
                                ));
                            };
                            mode = name.parse()?;
                        }
                        "queries" => single = Some(entry),
                        "query_sets" | "querySets" => multi = Some(entry),
                        other => {
                            return Err(TaskConfigError::Malformed(format!(
                                "unknown task key '{other}'"
                            )))
                        }
                    }
                }

                let query_sets = match (single, multi) {
                    (Some(queries), None) => vec![QuerySet::from_value(queries)?],
                    (None, Some(Value::Array(sets))) => {
                        if sets.is_empty() {
                            return Err(TaskConfigError::Malformed(
                                "query_sets must not be empty".to_string(),
                            ));
                        }
                        sets.iter()
                            .map(QuerySet::from_value)
                            .collect::<Result<Vec<_>, _>>()?
                    }
                    (None, Some(_)) => {
                        return Err(TaskConfigError::Malformed(
                            "query_sets must be a list of query sets".to_string(),
                        ))
                    }
                    (Some(_), Some(_)) => {
                        return Err(TaskConfigError::Malformed(
                            "use either queries or query_sets, not both".to_string(),
                        ))
                    }
                    (None, None) => {
                        return Err(TaskConfigError::Malformed(
                            "task needs queries or query_sets".to_string(),
                        ))
                    }
                };

                Ok(Self { mode, query_sets })
            }
            _ => Err(TaskConfigError::Malformed(
                "task must be a map or a list of queries".to_string(),
            )),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, TaskConfigError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| TaskConfigError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, TaskConfigError> {
        let value: Value =
            serde_yaml::from_str(text).map_err(|e| TaskConfigError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Total number of queries across all sets.
    pub fn n_queries(&self) -> usize {
        self.query_sets.iter().map(QuerySet::len).sum()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(serde_json::Number),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Number(n) => n.to_string(),
        }
    }
}

/// Raw shape of a group as written in task files.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryGroupSpec {
    #[serde(default, alias = "name")]
    names: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "eventNames")]
    event_names: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "category")]
    categories: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "eventCategories")]
    event_categories: Option<OneOrMany<Scalar>>,
    #[serde(default)]
    domain: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "city")]
    cities: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "venue")]
    venues: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "date")]
    dates: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "time")]
    times: Option<OneOrMany<Scalar>>,

    #[serde(default, alias = "minTickets")]
    min_tickets: Option<Value>,
    #[serde(default, alias = "maxTickets")]
    max_tickets: Option<Value>,
    #[serde(default, alias = "ticketQuantities")]
    ticket_quantities: Option<OneOrMany<Value>>,
    #[serde(default, alias = "maxPrice")]
    max_price: Option<Value>,
    #[serde(default, alias = "minPrice")]
    min_price: Option<Value>,
    #[serde(default, alias = "requireAvailable")]
    require_available: Option<bool>,

    #[serde(default)]
    sections: Option<OneOrMany<Scalar>>,
    #[serde(default)]
    zones: Option<OneOrMany<Scalar>>,
    #[serde(default)]
    rows: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "ticketTypes")]
    ticket_types: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "deliveryTypes")]
    delivery_types: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "aisleSeat")]
    aisle_seat: Option<bool>,
    #[serde(default, alias = "parkingOnly")]
    parking_only: Option<bool>,
    #[serde(default, alias = "accessibleSeating")]
    accessible_seating: Option<bool>,
    #[serde(default, alias = "instantDownloadOnly")]
    instant_download_only: Option<bool>,
    #[serde(default, alias = "vipPackages")]
    vip_packages: Option<bool>,
    #[serde(default, alias = "includesExtras")]
    includes_extras: Option<bool>,
    #[serde(default, alias = "availabilityStatuses")]
    availability_statuses: Option<OneOrMany<String>>,
    #[serde(default, alias = "urlSections")]
    url_sections: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "urlTicketClasses")]
    url_ticket_classes: Option<OneOrMany<Scalar>>,
    #[serde(default, alias = "urlQuantity")]
    url_quantity: Option<Value>,
    #[serde(default, alias = "requireLogin")]
    require_login: Option<bool>,
    #[serde(default, alias = "requirePageType")]
    require_page_type: Option<OneOrMany<Scalar>>,

    // Informational in task files; never constrains matching.
    #[serde(default, rename = "date_range", alias = "dateRange")]
    _date_range: Option<IgnoredAny>,
    #[serde(default, rename = "currency")]
    _currency: Option<IgnoredAny>,
    #[serde(default, rename = "sort_order", alias = "sortOrder")]
    _sort_order: Option<IgnoredAny>,
    #[serde(default, rename = "price_with_fees", alias = "priceWithFees")]
    _price_with_fees: Option<IgnoredAny>,
}

impl QueryGroupSpec {
    fn validate(self) -> Result<QueryGroup, String> {
        let max_price = amount_bound("max_price", self.max_price)?;
        let min_price = amount_bound("min_price", self.min_price)?;
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err(format!("min_price {min} exceeds max_price {max}"));
            }
        }

        let min_tickets = count_bound("min_tickets", self.min_tickets)?;
        let max_tickets = count_bound("max_tickets", self.max_tickets)?;
        if let (Some(min), Some(max)) = (min_tickets, max_tickets) {
            if min > max {
                return Err(format!("min_tickets {min} exceeds max_tickets {max}"));
            }
        }

        let dates = raw_texts(self.dates)
            .iter()
            .map(|raw| {
                parse_date(raw)
                    .map(|(date, _)| date)
                    .ok_or_else(|| format!("dates: cannot parse '{raw}' as a date"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let times = raw_texts(self.times)
            .iter()
            .map(|raw| parse_time(raw).ok_or_else(|| format!("times: cannot parse '{raw}' as a time")))
            .collect::<Result<Vec<_>, _>>()?;

        let availability_statuses = self
            .availability_statuses
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .iter()
            .map(|s| s.parse::<Availability>().map_err(|e| format!("availability_statuses: {e}")))
            .collect::<Result<Vec<_>, _>>()?;

        let ticket_quantities = self
            .ticket_quantities
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .map(|v| count_bound("ticket_quantities", Some(v)))
            .filter_map(Result::transpose)
            .collect::<Result<Vec<_>, _>>()?;

        let listing = ListingFilters {
            max_tickets,
            ticket_quantities,
            sections: texts("sections", self.sections)?,
            zones: texts("zones", self.zones)?,
            rows: texts("rows", self.rows)?,
            ticket_types: texts("ticket_types", self.ticket_types)?,
            delivery_types: texts("delivery_types", self.delivery_types)?,
            aisle_seat: self.aisle_seat.unwrap_or(false),
            parking_only: self.parking_only.unwrap_or(false),
            accessible_seating: self.accessible_seating.unwrap_or(false),
            instant_download_only: self.instant_download_only.unwrap_or(false),
            vip_packages: self.vip_packages.unwrap_or(false),
            includes_extras: self.includes_extras.unwrap_or(false),
            availability_statuses,
            url_sections: texts("url_sections", self.url_sections)?,
            url_ticket_classes: texts("url_ticket_classes", self.url_ticket_classes)?,
            url_quantity: count_bound("url_quantity", self.url_quantity)?,
            require_login: self.require_login.unwrap_or(false),
            require_page_type: texts("require_page_type", self.require_page_type)?,
        };

        Ok(QueryGroup {
            names: merged(texts("names", self.names)?, texts("event_names", self.event_names)?),
            categories: merged(
                texts("categories", self.categories)?,
                texts("event_categories", self.event_categories)?,
            ),
            domain: texts("domain", self.domain)?,
            cities: texts("cities", self.cities)?,
            venues: texts("venues", self.venues)?,
            dates,
            times,
            min_tickets,
            max_price,
            min_price,
            require_available: self.require_available.unwrap_or(false),
            listing,
        })
    }
}

/// Normalized candidate strings. A blank candidate is an error, since it
/// would otherwise match every record by substring.
fn texts(field: &str, raw: Option<OneOrMany<Scalar>>) -> Result<Vec<String>, String> {
    raw.map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|s| normalize_text(&s.into_text()).ok_or_else(|| format!("{field}: blank candidate")))
        .collect()
}

/// Union of two spellings of the same constraint, first-seen order.
fn merged(mut first: Vec<String>, second: Vec<String>) -> Vec<String> {
    for candidate in second {
        if !first.contains(&candidate) {
            first.push(candidate);
        }
    }
    first
}

fn raw_texts(raw: Option<OneOrMany<Scalar>>) -> Vec<String> {
    raw.map(OneOrMany::into_vec)
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.into_text().trim().to_string())
        .collect()
}

fn amount_bound(field: &str, raw: Option<Value>) -> Result<Option<f64>, String> {
    let amount = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_start_matches('$').replace(',', "").parse::<f64>().ok(),
        Some(_) => None,
    };
    match amount {
        Some(a) if !a.is_finite() => Err(format!("{field} must be a finite number")),
        Some(a) if a < 0.0 => Err(format!("{field} must not be negative")),
        Some(a) => Ok(Some(a)),
        None => Err(format!("{field} must be a number")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn count_bound(field: &str, raw: Option<Value>) -> Result<Option<u32>, String> {
    let count = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => {
            if let Some(int) = n.as_i64() {
                if int < 0 {
                    return Err(format!("{field} must not be negative"));
                }
                u32::try_from(int).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }
        }
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.starts_with('-') {
                return Err(format!("{field} must not be negative"));
            }
            trimmed.parse::<u32>().ok()
        }
        Some(_) => None,
    };
    count
        .map(Some)
        .ok_or_else(|| format!("{field} must be a whole number"))
}
