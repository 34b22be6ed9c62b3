//! Local KPI calculator.
//!
//! Used only when the backend uploads rows without a KPI section and
//! `backend.require_kpis` is off. Backend KPIs are never merged with these.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime, Utc};

use crate::model::{KpiSnapshot, Row, field};

/// Column holding the member's last activity timestamp.
pub const LAST_ACTIVE_FIELD: &str = "last_active";

/// Column holding the member's join date.
pub const JOIN_DATE_FIELD: &str = "join_date";

/// Column holding the acquisition channel.
pub const SOURCE_FIELD: &str = "source_platform";

/// Reported when no row carries a source.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Default look-back window for "active" and "new" members.
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Compute KPIs relative to the current time.
pub fn compute_kpis(rows: &[Row], window_days: u32) -> KpiSnapshot {
    compute_kpis_at(rows, Utc::now().naive_utc(), window_days)
}

/// Compute KPIs relative to an explicit `now`.
///
/// Rows whose date field is missing or unparseable do not count towards the
/// active/new totals.
pub fn compute_kpis_at(rows: &[Row], now: NaiveDateTime, window_days: u32) -> KpiSnapshot {
    let cutoff = now - Duration::days(i64::from(window_days));

    KpiSnapshot {
        total_members: rows.len() as u64,
        active_members: count_since(rows, LAST_ACTIVE_FIELD, cutoff),
        new_members: count_since(rows, JOIN_DATE_FIELD, cutoff),
        top_acquisition_source: top_source(rows),
    }
}

fn count_since(rows: &[Row], column: &str, cutoff: NaiveDateTime) -> u64 {
    rows.iter()
        .filter_map(|row| field(row, column)?.as_datetime())
        .filter(|dt| *dt >= cutoff)
        .count() as u64
}

/// Most frequent source value; the first one seen wins a tie.
fn top_source(rows: &[Row]) -> String {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for label in rows
        .iter()
        .filter_map(|row| field(row, SOURCE_FIELD)?.as_label())
    {
        let count = counts.entry(label.clone()).or_default();
        if *count == 0 {
            order.push(label);
        }
        *count += 1;
    }

    let mut best: Option<(&String, usize)> = None;
    for label in &order {
        let count = counts[label];
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((label, count));
        }
    }

    best.map(|(label, _)| label.clone())
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
