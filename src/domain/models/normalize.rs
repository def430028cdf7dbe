//! Value normalization shared by the canonicalizer and query parsing.
//!
//! Observation fields and query candidates go through the same functions so
//! that comparisons in the matcher are between identically-shaped values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p", "%I:%M%p", "%I:%M:%S %p"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// Lowercase, trim, and collapse internal whitespace. Blank input yields `None`.
pub fn normalize_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

/// Key form used for alias lookup: lowercase alphanumerics only.
///
/// `eventName`, `event_name` and `Event-Name` all become `eventname`.
pub fn lookup_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Convert an arbitrary key (`isVIP`, `url-sections`, `Ticket Type`) to snake_case.
pub fn snake_case_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    let mut prev_lower_or_digit = false;
    for ch in raw.trim().chars() {
        if ch.is_uppercase() {
            if prev_lower_or_digit && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
            prev_lower_or_digit = false;
        } else if ch.is_alphanumeric() {
            out.push(ch);
            prev_lower_or_digit = true;
        } else {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev_lower_or_digit = false;
        }
    }
    out.trim_end_matches('_').to_string()
}

/// Text content of a scalar JSON value.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => normalize_text(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a non-negative decimal amount from a number or a display string
/// such as `"$1,234.50"`, `"USD 150"` or `"150 €"`.
///
/// A string must hold exactly one number, optionally wrapped in a currency
/// symbol or code. Anything else (`"$150 (2 tickets)"`, `"1e5"`) is unknown.
pub fn parse_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_amount_text(s)?,
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

fn parse_amount_text(raw: &str) -> Option<f64> {
    let text = raw.trim();
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let len = text[start..]
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == '.'))
        .unwrap_or(text.len() - start);
    let (prefix, rest) = text.split_at(start);
    let (number, suffix) = rest.split_at(len);

    if !is_currency_affix(prefix) || !is_currency_affix(suffix) {
        return None;
    }

    let number = number.trim_end_matches(['.', ',']);
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (number, None),
    };
    if whole.starts_with(',') || whole.contains(",,") {
        return None;
    }
    if fraction.is_some_and(|f| f.is_empty() || !f.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }

    let digits = whole.replace(',', "");
    match fraction {
        Some(fraction) => format!("{digits}.{fraction}").parse().ok(),
        None => digits.parse().ok(),
    }
}

/// Empty, or a currency symbol and/or a currency code of at most three letters.
fn is_currency_affix(affix: &str) -> bool {
    let affix = affix.trim();
    let letters = affix.chars().filter(char::is_ascii_alphabetic).count();
    letters <= 3
        && affix
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || matches!(c, '$' | '€' | '£' | '¥'))
}

/// Parse a count from an integer, an integral float, or the first digit run
/// of a string (`"2 tickets"` → 2). Strings carrying a sign or a fractional
/// part are rejected, as their numeric forms are.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => {
            if let Some(int) = n.as_u64() {
                return u32::try_from(int).ok();
            }
            let float = n.as_f64()?;
            if float.is_finite() && float >= 0.0 && float.fract() == 0.0 && float <= f64::from(u32::MAX) {
                return Some(float as u32);
            }
            None
        }
        Value::String(s) => {
            let text = s.trim();
            let start = text.find(|c: char| c.is_ascii_digit())?;
            if text[..start].trim_end().ends_with('-') {
                return None;
            }
            let rest = &text[start..];
            let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
            let (digits, tail) = rest.split_at(end);
            let fractional = tail
                .strip_prefix('.')
                .is_some_and(|t| t.starts_with(|c: char| c.is_ascii_digit()));
            if fractional {
                return None;
            }
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Parse a boolean from a JSON bool, `0`/`1`, or `"true"`/`"yes"`-style text.
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a time of day in 24h or 12h notation.
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let upper = raw.trim().to_uppercase();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&upper, fmt).ok())
}

/// Parse a calendar date. Timestamps contribute their date, and their time
/// of day as the second element.
pub fn parse_date(raw: &str) -> Option<(NaiveDate, Option<NaiveTime>)> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some((date, None));
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        let local = stamp.naive_local();
        return Some((local.date(), Some(local.time())));
    }
    DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(trimmed, fmt)
            .ok()
            .map(|dt| (dt.date(), Some(dt.time())))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_text_collapses_and_lowercases() {
        assert_eq!(
            normalize_text("  Los   Angeles\tLakers "),
            Some("los angeles lakers".to_string())
        );
        assert_eq!(normalize_text("   "), None);
    }

    #[test]
    fn test_lookup_key_ignores_shape() {
        assert_eq!(lookup_key("eventName"), "eventname");
        assert_eq!(lookup_key("event_name"), "eventname");
        assert_eq!(lookup_key("Event-Name"), "eventname");
    }

    #[test]
    fn test_snake_case_key() {
        assert_eq!(snake_case_key("isVIP"), "is_vip");
        assert_eq!(snake_case_key("urlSections"), "url_sections");
        assert_eq!(snake_case_key("Ticket Type"), "ticket_type");
        assert_eq!(snake_case_key("aisle_seat"), "aisle_seat");
        assert_eq!(snake_case_key("url-ticket-classes"), "url_ticket_classes");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!(150.0)), Some(150.0));
        assert_eq!(parse_amount(&json!("$1,234.50")), Some(1234.5));
        assert_eq!(parse_amount(&json!("USD 150")), Some(150.0));
        assert_eq!(parse_amount(&json!("150 €")), Some(150.0));
        assert_eq!(parse_amount(&json!("US$ 99.99")), Some(99.99));
        assert_eq!(parse_amount(&json!("free?")), None);
        assert_eq!(parse_amount(&json!("$150 (2 tickets)")), None);
        assert_eq!(parse_amount(&json!("150 USD incl. 3% fees")), None);
        assert_eq!(parse_amount(&json!("1e5")), None);
        assert_eq!(parse_amount(&json!("-$20")), None);
        assert_eq!(parse_amount(&json!("1.2.3")), None);
        assert_eq!(parse_amount(&json!(-3)), None);
        assert_eq!(parse_amount(&json!(null)), None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(&json!(4)), Some(4));
        assert_eq!(parse_count(&json!(2.0)), Some(2));
        assert_eq!(parse_count(&json!(2.5)), None);
        assert_eq!(parse_count(&json!("2 tickets")), Some(2));
        assert_eq!(parse_count(&json!("none")), None);
        assert_eq!(parse_count(&json!("-4")), None);
        assert_eq!(parse_count(&json!("- 2 tickets")), None);
        assert_eq!(parse_count(&json!("2.5")), None);
        assert_eq!(parse_count(&json!("2.")), Some(2));
    }

    #[test]
    fn test_parse_time_formats() {
        let expected = NaiveTime::from_hms_opt(19, 30, 0);
        assert_eq!(parse_time("19:30"), expected);
        assert_eq!(parse_time("19:30:00"), expected);
        assert_eq!(parse_time("7:30 PM"), expected);
        assert_eq!(parse_time("7:30pm"), expected);
        assert_eq!(parse_time("evening"), None);
    }

    #[test]
    fn test_parse_date_variants() {
        let day = NaiveDate::from_ymd_opt(2025, 12, 20).unwrap();
        assert_eq!(parse_date("2025-12-20"), Some((day, None)));
        assert_eq!(
            parse_date("2025-12-20T19:30:00-08:00"),
            Some((day, NaiveTime::from_hms_opt(19, 30, 0)))
        );
        assert_eq!(
            parse_date("2025-12-20T19:30"),
            Some((day, NaiveTime::from_hms_opt(19, 30, 0)))
        );
        assert_eq!(parse_date("Dec 20"), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag(&json!(true)), Some(true));
        assert_eq!(parse_flag(&json!("Yes")), Some(true));
        assert_eq!(parse_flag(&json!(0)), Some(false));
        assert_eq!(parse_flag(&json!("maybe")), None);
    }
}
