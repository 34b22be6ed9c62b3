//! Chart descriptors and the aggregated series fed to renderers.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Chart kind
// ---------------------------------------------------------------------------

/// The kind of chart a descriptor asks for.
///
/// Unknown tags coming from the backend are kept as [`ChartKind::Other`] so
/// they can still be listed; the aggregator yields an empty series for them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
    Area,
    Other(String),
}

impl ChartKind {
    /// Parse a chart tag case-insensitively.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "pie" => Self::Pie,
            "bar" => Self::Bar,
            "line" => Self::Line,
            "area" => Self::Area,
            _ => Self::Other(tag.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pie => "pie",
            Self::Bar => "bar",
            Self::Line => "line",
            Self::Area => "area",
            Self::Other(tag) => tag,
        }
    }

    /// Whether the aggregator knows how to build a series for this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ChartKind {
    fn from(tag: String) -> Self {
        Self::parse(&tag)
    }
}

impl From<ChartKind> for String {
    fn from(kind: ChartKind) -> Self {
        kind.as_str().to_string()
    }
}

/// How a bar chart turns rows into bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarPolicy {
    /// Rows sorted descending by the value field, first `top_n` kept.
    #[default]
    TopValues,
    /// Rows counted per calendar month of the category (date) field.
    MonthlyCounts,
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// One chart: its kind, field bindings and title.
///
/// Fields are referenced by column name. A descriptor whose columns are not
/// present in the current rows renders as an empty series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    pub id: String,
    pub title: String,
    pub kind: ChartKind,
    /// X axis for bar/line/area, category for pie.
    pub category_field: String,
    /// Y axis; only used by the top-values bar policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_field: Option<String>,
    #[serde(default)]
    pub bar_policy: BarPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ChartDescriptor {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: ChartKind,
        category_field: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind,
            category_field: category_field.into(),
            value_field: None,
            bar_policy: BarPolicy::default(),
            description: None,
        }
    }

    pub fn with_value_field(mut self, field: impl Into<String>) -> Self {
        self.value_field = Some(field.into());
        self
    }

    pub fn with_bar_policy(mut self, policy: BarPolicy) -> Self {
        self.bar_policy = policy;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Aggregated series
// ---------------------------------------------------------------------------

/// A single labelled data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Data shaped for one chart. Derived on every render, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedSeries {
    pub kind: ChartKind,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<SeriesPoint>,
}

impl AggregatedSeries {
    pub fn empty(kind: ChartKind) -> Self {
        Self {
            kind,
            x_label: String::new(),
            y_label: String::new(),
            points: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Sum of all point values.
    pub fn total(&self) -> f64 {
        self.points.iter().map(|p| p.value).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_kind_parses_known_tags() {
        assert_eq!(ChartKind::parse("PIE"), ChartKind::Pie);
        assert_eq!(ChartKind::parse(" bar "), ChartKind::Bar);
        assert_eq!(ChartKind::parse("area"), ChartKind::Area);
        assert_eq!(
            ChartKind::parse("scatter"),
            ChartKind::Other("scatter".to_string())
        );
        assert!(!ChartKind::parse("scatter").is_supported());
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let d = ChartDescriptor::new("growth", "Growth", ChartKind::Bar, "join_date")
            .with_bar_policy(BarPolicy::MonthlyCounts);
        let json = serde_json::to_string(&d).unwrap();
        assert!(json.contains("\"kind\":\"bar\""));
        assert!(json.contains("\"barPolicy\":\"monthly-counts\""));
        assert!(!json.contains("valueField"));

        let back: ChartDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
