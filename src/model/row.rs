//! Dynamic row representation for uploaded tabular data.
//!
//! The backend decides the column set at upload time, so a row is an open
//! mapping from column name to a small tagged scalar. Strings that look like
//! dates are promoted to [`CellValue::Date`] when the row is deserialized;
//! the uploaded text is kept so labels and round trips stay verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of uploaded data, keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

/// Ordered column names, as reported by the upload endpoint.
pub type ColumnSet = Vec<String>;

/// A single scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Date { parsed: NaiveDateTime, raw: String },
    Text(String),
}

/// Date-time layouts accepted for date-like strings, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date-only layouts, interpreted as midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%b %d, %Y"];

/// Parse a date-like string into a naive (UTC) timestamp.
///
/// RFC 3339 strings with an offset are normalized to UTC. Returns `None`
/// for anything that does not match a known layout.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.len() < 6 {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }

    None
}

impl CellValue {
    /// A date cell whose text is the canonical rendering of `dt`.
    pub fn date(dt: NaiveDateTime) -> Self {
        Self::Date {
            parsed: dt,
            raw: format_datetime(&dt),
        }
    }

    /// Whether the cell carries no usable value (null or blank text).
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the cell as a category label, or `None` if it is missing.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Text(s) if s.trim().is_empty() => None,
            Self::Text(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(format_number(*n)),
            Self::Date { raw, .. } => Some(raw.clone()),
        }
    }

    /// Numeric view of the cell. Text is parsed leniently.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Date view of the cell. Text that failed promotion is retried here.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date { parsed, .. } => Some(*parsed),
            Self::Text(s) => parse_datetime(s),
            _ => None,
        }
    }
}

/// Look up a field in a row, treating blank values as absent.
pub fn field<'a>(row: &'a Row, name: &str) -> Option<&'a CellValue> {
    row.get(name).filter(|v| !v.is_missing())
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn format_datetime(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

// ---------------------------------------------------------------------------
// JSON conversion
// ---------------------------------------------------------------------------

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => match parse_datetime(&s) {
                Some(parsed) => Self::Date { parsed, raw: s },
                None => Self::Text(s),
            },
            // Nested structures are not expected from a CSV; keep them visible.
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<CellValue> for Value {
    fn from(cell: CellValue) -> Self {
        match cell {
            CellValue::Null => Value::Null,
            CellValue::Bool(b) => Value::Bool(b),
            CellValue::Number(n) => serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
            CellValue::Date { raw, .. } => Value::String(raw),
            CellValue::Text(s) => Value::String(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::from(Value::String(s.to_string()))
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_date_layouts() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_time(NaiveTime::MIN);
        assert_eq!(parse_datetime("2024-01-15"), Some(expected));
        assert_eq!(parse_datetime("2024/01/15"), Some(expected));
        assert_eq!(parse_datetime("01/15/2024"), Some(expected));
        assert_eq!(parse_datetime("2024-01-15T00:00:00"), Some(expected));
        assert_eq!(parse_datetime("2024-01-15T02:00:00+02:00"), Some(expected));
    }

    #[test]
    fn rejects_non_dates() {
        assert_eq!(parse_datetime("discord"), None);
        assert_eq!(parse_datetime("42"), None);
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("2024-13-45"), None);
    }

    #[test]
    fn json_strings_are_promoted_to_dates() {
        let cell = CellValue::from(serde_json::json!("2024-03-01"));
        assert!(matches!(cell, CellValue::Date { .. }));

        let cell = CellValue::from(serde_json::json!("twitter"));
        assert_eq!(cell, CellValue::Text("twitter".to_string()));
    }

    #[test]
    fn row_deserializes_from_json_object() {
        let row: Row = serde_json::from_str(
            r#"{"name": "Ada", "posts": 12, "join_date": "2024-02-10", "email": null}"#,
        )
        .unwrap();
        assert_eq!(row["posts"], CellValue::Number(12.0));
        assert_eq!(row["email"], CellValue::Null);
        assert!(row["join_date"].as_datetime().is_some());
        assert!(field(&row, "email").is_none());
        assert!(field(&row, "missing").is_none());
    }

    #[test]
    fn labels_render_integers_without_fraction() {
        assert_eq!(CellValue::Number(3.0).as_label().as_deref(), Some("3"));
        assert_eq!(CellValue::Number(2.5).as_label().as_deref(), Some("2.5"));
        assert_eq!(CellValue::Text("  ".into()).as_label(), None);
    }

    #[test]
    fn numbers_parse_from_text() {
        assert_eq!(CellValue::Text(" 7.5 ".into()).as_number(), Some(7.5));
        assert_eq!(CellValue::Text("n/a".into()).as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), None);
    }

    #[test]
    fn date_serializes_back_to_string() {
        let cell = CellValue::from("2024-05-06");
        let json = serde_json::to_string(&cell).unwrap();
        assert_eq!(json, "\"2024-05-06\"");
    }

    #[test]
    fn date_cells_keep_the_uploaded_text() {
        let cell = CellValue::from("01/15/2024");
        assert_eq!(cell.as_label().as_deref(), Some("01/15/2024"));
        assert_eq!(serde_json::to_string(&cell).unwrap(), "\"01/15/2024\"");
        assert_eq!(cell.as_datetime(), CellValue::from("2024-01-15").as_datetime());

        let cell = CellValue::from("2024-01-15T23:30:00-05:00");
        assert_eq!(cell.as_label().as_deref(), Some("2024-01-15T23:30:00-05:00"));
    }

    #[test]
    fn date_constructor_renders_canonical_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 3).unwrap().and_time(NaiveTime::MIN);
        assert_eq!(CellValue::date(dt).as_label().as_deref(), Some("2024-02-03"));
    }
}
