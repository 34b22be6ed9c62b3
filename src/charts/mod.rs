//! Chart data aggregation: turns raw rows into the series each chart needs.
//!
//! Everything here is pure: the same rows and descriptor always produce the
//! same series, and nothing is cached between calls.
//!
//! | Kind | Shape |
//! |------|-------|
//! | pie  | count per category, first-occurrence order, missing → `"Unknown"` |
//! | bar  | top-N rows by value, or counts per calendar month ([`BarPolicy`]) |
//! | line | cumulative count per day/month bucket, ascending |
//! | area | same growth curve as line |
//!
//! Rows whose date or value field is missing are left out of the date and
//! value paths; the pie path buckets them under `"Unknown"` instead.

pub mod render;

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{AggregatedSeries, BarPolicy, ChartDescriptor, ChartKind, Row, SeriesPoint, field};

/// Label for rows without a category value.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Y-axis label of the cumulative growth series.
pub const GROWTH_LABEL: &str = "Total Members";

/// Default number of bars kept by the top-values policy.
pub const DEFAULT_TOP_N: usize = 10;

/// Calendar bucket used by the growth (line/area) series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBucket {
    #[default]
    Day,
    Month,
}

/// Tunables for aggregation, resolved from `[dashboard]` config.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub top_n: usize,
    pub line_bucket: TimeBucket,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            line_bucket: TimeBucket::Day,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Build the series for one descriptor.
///
/// Empty input and unsupported kinds yield an empty series; the renderer
/// shows a placeholder for those.
pub fn aggregate(
    rows: &[Row],
    descriptor: &ChartDescriptor,
    options: &AggregateOptions,
) -> AggregatedSeries {
    if rows.is_empty() {
        return AggregatedSeries::empty(descriptor.kind.clone());
    }

    match &descriptor.kind {
        ChartKind::Pie => category_counts(rows, &descriptor.category_field),
        ChartKind::Bar => match descriptor.bar_policy {
            BarPolicy::TopValues => top_values(rows, descriptor, options.top_n),
            BarPolicy::MonthlyCounts => monthly_counts(rows, &descriptor.category_field),
        },
        ChartKind::Line | ChartKind::Area => growth(
            rows,
            &descriptor.category_field,
            options.line_bucket,
            descriptor.kind.clone(),
        ),
        ChartKind::Other(_) => AggregatedSeries::empty(descriptor.kind.clone()),
    }
}

// ---------------------------------------------------------------------------
// Pie
// ---------------------------------------------------------------------------

/// Count rows per category value in first-occurrence order.
///
/// A column absent from every row renders empty rather than one big
/// `"Unknown"` slice.
fn category_counts(rows: &[Row], column: &str) -> AggregatedSeries {
    if !rows.iter().any(|row| row.contains_key(column)) {
        return AggregatedSeries::empty(ChartKind::Pie);
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut points: Vec<SeriesPoint> = Vec::new();

    for row in rows {
        let label = field(row, column)
            .and_then(|v| v.as_label())
            .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

        match index.get(&label) {
            Some(&i) => points[i].value += 1.0,
            None => {
                index.insert(label.clone(), points.len());
                points.push(SeriesPoint::new(label, 1.0));
            }
        }
    }

    AggregatedSeries {
        kind: ChartKind::Pie,
        x_label: column.to_string(),
        y_label: "Count".to_string(),
        points,
    }
}

// ---------------------------------------------------------------------------
// Bar
// ---------------------------------------------------------------------------

/// Sort rows descending by the numeric value field and keep the first `n`.
///
/// Rows without a numeric value are skipped; ties keep input order.
fn top_values(rows: &[Row], descriptor: &ChartDescriptor, n: usize) -> AggregatedSeries {
    let Some(value_column) = descriptor.value_field.as_deref() else {
        return AggregatedSeries::empty(ChartKind::Bar);
    };

    let mut ranked: Vec<SeriesPoint> = rows
        .iter()
        .filter_map(|row| {
            let value = field(row, value_column)?.as_number()?;
            let label = field(row, &descriptor.category_field)
                .and_then(|v| v.as_label())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            Some(SeriesPoint::new(label, value))
        })
        .collect();

    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(n);

    AggregatedSeries {
        kind: ChartKind::Bar,
        x_label: descriptor.category_field.clone(),
        y_label: value_column.to_string(),
        points: ranked,
    }
}

/// Count rows per calendar month of a date column, oldest month first.
fn monthly_counts(rows: &[Row], column: &str) -> AggregatedSeries {
    let mut months: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows {
        if let Some(month) = row_date(row, column).and_then(month_start) {
            *months.entry(month).or_default() += 1;
        }
    }

    AggregatedSeries {
        kind: ChartKind::Bar,
        x_label: "Month".to_string(),
        y_label: "Count".to_string(),
        points: months
            .into_iter()
            .map(|(month, count)| SeriesPoint::new(month_label(month), count as f64))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Line / area
// ---------------------------------------------------------------------------

/// Running total of rows per time bucket, oldest bucket first.
fn growth(rows: &[Row], column: &str, bucket: TimeBucket, kind: ChartKind) -> AggregatedSeries {
    let mut buckets: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for row in rows {
        let key = match bucket {
            TimeBucket::Day => row_date(row, column),
            TimeBucket::Month => row_date(row, column).and_then(month_start),
        };
        if let Some(key) = key {
            *buckets.entry(key).or_default() += 1;
        }
    }

    let mut running = 0usize;
    let points = buckets
        .into_iter()
        .map(|(date, count)| {
            running += count;
            let label = match bucket {
                TimeBucket::Day => date.format("%Y-%m-%d").to_string(),
                TimeBucket::Month => month_label(date),
            };
            SeriesPoint::new(label, running as f64)
        })
        .collect();

    AggregatedSeries {
        kind,
        x_label: "Date".to_string(),
        y_label: GROWTH_LABEL.to_string(),
        points,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_date(row: &Row, column: &str) -> Option<NaiveDate> {
    field(row, column)?.as_datetime().map(|dt| dt.date())
}

fn month_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
}

/// `"Jan 2024"` style label.
fn month_label(month: NaiveDate) -> String {
    month.format("%b %Y").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
