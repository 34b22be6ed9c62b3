//! Request and response bodies of the backend API.
//!
//! Two generations of the backend are in the wild, so the parsers here
//! accept both shapes:
//!
//! - upload: `{rows, columns, kpis, summary}` or
//!   `{success, data, columns, kpis, dataSummary, error}`
//! - suggest: a bare descriptor array or `{success, suggestions, error}`,
//!   with items keyed `chart`/`x`/`y` or `type`/`dataKey`
//! - summarize: `{success, summary, error}`
//!
//! Parsing is kept separate from the HTTP client so it can be tested without
//! a server.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{GatewayError, UPLOAD_FALLBACK_MESSAGE, UploadPayload};
use crate::model::{BarPolicy, ChartDescriptor, ChartKind, KpiSnapshot, Row};

/// Message used when an upload response has no KPI section.
pub const INCOMPLETE_UPLOAD_MESSAGE: &str = "Incomplete data received from server.";

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/suggest`.
#[derive(Debug, Serialize)]
pub struct SuggestRequest<'a> {
    pub columns: &'a [String],
    #[serde(rename = "sampleData", skip_serializing_if = "no_rows")]
    pub sample_data: &'a [Row],
}

fn no_rows(rows: &&[Row]) -> bool {
    rows.is_empty()
}

/// Body of `POST /api/summarize`.
#[derive(Debug, Serialize)]
pub struct SummarizeRequest<'a> {
    #[serde(rename = "dataSummary")]
    pub data_summary: &'a str,
    pub kpis: &'a KpiSnapshot,
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct UploadBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, alias = "data")]
    rows: Vec<Row>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    kpis: Option<KpiSnapshot>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default, rename = "dataSummary")]
    data_summary: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Parse an upload response body.
///
/// A body without KPIs is an [`GatewayError::IncompleteResponse`] unless
/// `require_kpis` is off.
pub fn parse_upload(body: &str, require_kpis: bool) -> Result<UploadPayload, GatewayError> {
    let parsed: UploadBody = serde_json::from_str(body).map_err(|e| {
        GatewayError::TransportFailure(format!("unreadable upload response: {e}"))
    })?;

    if parsed.success == Some(false) || (parsed.error.is_some() && parsed.kpis.is_none()) {
        return Err(GatewayError::RemoteError(
            parsed
                .error
                .unwrap_or_else(|| UPLOAD_FALLBACK_MESSAGE.to_string()),
        ));
    }

    if parsed.kpis.is_none() && require_kpis {
        return Err(GatewayError::IncompleteResponse(
            INCOMPLETE_UPLOAD_MESSAGE.to_string(),
        ));
    }

    let columns = if parsed.columns.is_empty() {
        first_row_keys(body)
    } else {
        parsed.columns
    };

    Ok(UploadPayload {
        rows: parsed.rows,
        columns,
        kpis: parsed.kpis,
        summary: parsed.summary.filter(|s| !s.trim().is_empty()),
        data_summary: parsed.data_summary.filter(|s| !s.trim().is_empty()),
    })
}

/// Keys of the first row in document order, for bodies without `columns`.
///
/// `Row` is a sorted map, so the order is recovered from the raw body.
fn first_row_keys(body: &str) -> Vec<String> {
    #[derive(Deserialize)]
    struct RowKeys {
        #[serde(default, alias = "data")]
        rows: Vec<OrderedKeys>,
    }

    serde_json::from_str::<RowKeys>(body)
        .ok()
        .and_then(|parsed| parsed.rows.into_iter().next())
        .map(|keys| keys.0)
        .unwrap_or_default()
}

/// The keys of a JSON object, in the order they appear.
struct OrderedKeys(Vec<String>);

impl<'de> Deserialize<'de> for OrderedKeys {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeysVisitor;

        impl<'de> serde::de::Visitor<'de> for KeysVisitor {
            type Value = OrderedKeys;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> Result<OrderedKeys, A::Error> {
                let mut keys = Vec::new();
                while let Some((key, _)) = map.next_entry::<String, serde::de::IgnoredAny>()? {
                    keys.push(key);
                }
                Ok(OrderedKeys(keys))
            }
        }

        deserializer.deserialize_map(KeysVisitor)
    }
}

// ---------------------------------------------------------------------------
// Suggestions
// ---------------------------------------------------------------------------

/// One suggestion item as the backend sends it.
#[derive(Debug, Deserialize)]
struct WireSuggestion {
    #[serde(default)]
    id: Option<String>,
    title: String,
    #[serde(alias = "type")]
    chart: String,
    #[serde(default, alias = "dataKey")]
    x: Option<String>,
    #[serde(default)]
    y: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Parse a suggestion response body into descriptors.
///
/// Malformed items are skipped. Ids missing from the response are derived
/// from the title, and every id in the result is unique.
pub fn parse_suggestions(body: &str) -> Result<Vec<ChartDescriptor>, GatewayError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        GatewayError::TransportFailure(format!("unreadable suggestion response: {e}"))
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let failed = obj.get("success").and_then(Value::as_bool) == Some(false);
            let error = obj.get("error").and_then(Value::as_str).map(str::to_string);
            match obj.remove("suggestions") {
                Some(Value::Array(items)) if !failed => items,
                _ => {
                    return Err(match error {
                        Some(msg) => GatewayError::RemoteError(msg),
                        None if failed => {
                            GatewayError::RemoteError(super::SUGGEST_FALLBACK_MESSAGE.to_string())
                        }
                        None => GatewayError::IncompleteResponse(
                            "suggestion response has no suggestions".to_string(),
                        ),
                    });
                }
            }
        }
        _ => {
            return Err(GatewayError::IncompleteResponse(
                "suggestion response is not a list".to_string(),
            ));
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut descriptors = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<WireSuggestion>(item) {
            Ok(wire) => descriptors.push(into_descriptor(wire, &mut seen)),
            Err(e) => log::warn!("skipping malformed chart suggestion: {e}"),
        }
    }

    Ok(descriptors)
}

fn into_descriptor(wire: WireSuggestion, seen: &mut HashSet<String>) -> ChartDescriptor {
    let kind = ChartKind::parse(&wire.chart);
    let value_field = wire.y.filter(|y| !y.trim().is_empty());

    // Bars without a value column count rows per month of the x column.
    let bar_policy = if kind == ChartKind::Bar && value_field.is_none() {
        BarPolicy::MonthlyCounts
    } else {
        BarPolicy::TopValues
    };

    let base_id = wire
        .id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| slugify(&wire.title));
    let id = unique_id(base_id, seen);

    ChartDescriptor {
        id,
        title: wire.title,
        kind,
        category_field: wire.x.unwrap_or_default(),
        value_field,
        bar_policy,
        description: wire.description,
    }
}

/// Lower-case, hyphen-separated identifier derived from a title.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "chart".to_string()
    } else {
        slug.to_string()
    }
}

fn unique_id(base: String, seen: &mut HashSet<String>) -> String {
    let mut candidate = base.clone();
    let mut n = 2;
    while seen.contains(&candidate) {
        candidate = format!("{base}-{n}");
        n += 1;
    }
    seen.insert(candidate.clone());
    candidate
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SummaryBody {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Parse a summarize response body into the narrative text.
pub fn parse_summary(body: &str) -> Result<String, GatewayError> {
    let parsed: SummaryBody = serde_json::from_str(body).map_err(|e| {
        GatewayError::TransportFailure(format!("unreadable summary response: {e}"))
    })?;

    if parsed.success == Some(false) || parsed.error.is_some() {
        return Err(GatewayError::RemoteError(
            parsed
                .error
                .unwrap_or_else(|| super::SUMMARY_FALLBACK_MESSAGE.to_string()),
        ));
    }

    match parsed.summary {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(GatewayError::IncompleteResponse(
            "summary response has no summary text".to_string(),
        )),
    }
}

/// Extract an `error` message from a JSON error body, if there is one.
pub fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const KPIS: &str = r#"{"totalMembers": 3, "activeMembers": 1, "newMembers": 1, "topAcquisitionSource": "X"}"#;

    #[test]
    fn upload_current_shape() {
        let body = format!(
            r#"{{"rows": [{{"source_platform": "X"}}], "columns": ["source_platform"], "kpis": {KPIS}, "summary": "Healthy."}}"#
        );
        let payload = parse_upload(&body, true).unwrap();
        assert_eq!(payload.rows.len(), 1);
        assert_eq!(payload.columns, vec!["source_platform"]);
        assert_eq!(payload.kpis.unwrap().total_members, 3);
        assert_eq!(payload.summary.as_deref(), Some("Healthy."));
    }

    #[test]
    fn upload_legacy_shape() {
        let body = format!(
            r#"{{"success": true, "data": [{{"a": 1}}, {{"a": 2}}], "columns": ["a"], "kpis": {KPIS}, "dataSummary": "Dataset Overview"}}"#
        );
        let payload = parse_upload(&body, true).unwrap();
        assert_eq!(payload.rows.len(), 2);
        assert!(payload.summary.is_none());
        assert_eq!(payload.data_summary.as_deref(), Some("Dataset Overview"));
    }

    #[test]
    fn upload_without_kpis_is_incomplete() {
        let body = r#"{"rows": [], "columns": []}"#;
        let err = parse_upload(body, true).unwrap_err();
        assert_eq!(
            err,
            GatewayError::IncompleteResponse(INCOMPLETE_UPLOAD_MESSAGE.to_string())
        );
    }

    #[test]
    fn upload_without_kpis_allowed_when_not_required() {
        let body = r#"{"rows": [{"b": "x", "a": 1}]}"#;
        let payload = parse_upload(body, false).unwrap();
        assert!(payload.kpis.is_none());
        assert_eq!(payload.columns, vec!["b", "a"]);
    }

    #[test]
    fn missing_columns_follow_first_row_order() {
        let body = r#"{"data": [{"name": "ana", "join_date": "2024-01-05", "age": 30}, {"zip": 1}]}"#;
        let payload = parse_upload(body, false).unwrap();
        assert_eq!(payload.columns, vec!["name", "join_date", "age"]);
    }

    #[test]
    fn upload_remote_error() {
        let body = r#"{"success": false, "error": "File must be a CSV"}"#;
        let err = parse_upload(body, true).unwrap_err();
        assert_eq!(err, GatewayError::RemoteError("File must be a CSV".to_string()));

        let err = parse_upload(r#"{"success": false}"#, true).unwrap_err();
        assert_eq!(err.to_string(), UPLOAD_FALLBACK_MESSAGE);
    }

    #[test]
    fn upload_garbage_is_transport_failure() {
        let err = parse_upload("<html>502</html>", true).unwrap_err();
        assert!(matches!(err, GatewayError::TransportFailure(_)));
    }

    #[test]
    fn suggestions_bare_array() {
        let body = r#"[
            {"title": "Sources", "chart": "pie", "x": "source_platform", "y": "count"},
            {"title": "Top Posters", "chart": "bar", "x": "name", "y": "posts"},
            {"title": "Growth", "chart": "line", "x": "join_date", "y": "count"}
        ]"#;
        let list = parse_suggestions(body).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, "sources");
        assert_eq!(list[1].kind, ChartKind::Bar);
        assert_eq!(list[1].bar_policy, BarPolicy::TopValues);
        assert_eq!(list[1].value_field.as_deref(), Some("posts"));
    }

    #[test]
    fn suggestions_wrapped_legacy_items() {
        let body = r#"{"success": true, "suggestions": [
            {"id": "growth-trend", "title": "Monthly Growth", "type": "bar", "dataKey": "join_date", "description": "joins"},
            {"id": "growth-trend", "title": "Activity", "type": "area", "dataKey": "last_active"}
        ]}"#;
        let list = parse_suggestions(body).unwrap();
        assert_eq!(list[0].bar_policy, BarPolicy::MonthlyCounts);
        assert_eq!(list[0].category_field, "join_date");
        assert_eq!(list[1].kind, ChartKind::Area);
        assert_eq!(list[1].id, "growth-trend-2");
    }

    #[test]
    fn suggestions_skip_malformed_items() {
        let body = r#"[{"chart": "pie"}, {"title": "Ok", "chart": "pie", "x": "a"}]"#;
        let list = parse_suggestions(body).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Ok");
    }

    #[test]
    fn suggestions_remote_error() {
        let body = r#"{"success": false, "error": "quota exceeded"}"#;
        let err = parse_suggestions(body).unwrap_err();
        assert_eq!(err, GatewayError::RemoteError("quota exceeded".to_string()));
    }

    #[test]
    fn summary_parses_text_and_errors() {
        assert_eq!(
            parse_summary(r#"{"success": true, "summary": "**Growing**"}"#).unwrap(),
            "**Growing**"
        );
        let err = parse_summary(r#"{"error": "Error generating summary: boom"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Error generating summary: boom");
        assert!(matches!(
            parse_summary(r#"{"success": true}"#).unwrap_err(),
            GatewayError::IncompleteResponse(_)
        ));
    }

    #[test]
    fn slugify_titles() {
        assert_eq!(slugify("Member Acquisition Sources"), "member-acquisition-sources");
        assert_eq!(slugify("  Growth (30d)!"), "growth-30d");
        assert_eq!(slugify("???"), "chart");
    }

    #[test]
    fn suggest_request_omits_empty_sample() {
        let columns = vec!["a".to_string()];
        let req = SuggestRequest {
            columns: &columns,
            sample_data: &[],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"columns":["a"]}"#);
    }

    #[test]
    fn error_message_extracts_field() {
        assert_eq!(
            error_message(r#"{"error": "No file provided"}"#).as_deref(),
            Some("No file provided")
        );
        assert_eq!(error_message("not json"), None);
    }
}
