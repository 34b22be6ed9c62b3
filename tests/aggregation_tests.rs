/// Aggregation and KPI property tests.
///
/// Runs the KPI calculator and the chart aggregator over many generated
/// member tables and checks the invariants that must hold for any input.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use insights::charts::{AggregateOptions, TimeBucket, aggregate};
use insights::kpi::{self, compute_kpis_at};
use insights::model::{BarPolicy, CellValue, ChartDescriptor, ChartKind, Row};

// ---------------------------------------------------------------------------
// Generated data
// ---------------------------------------------------------------------------

const SOURCES: [&str; 5] = ["Discord", "Twitter", "Meetup", "Newsletter", "Friend"];

/// Tiny deterministic generator so every run sees the same tables.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 30)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// A member table where some rows miss fields or carry junk values.
fn members(seed: u64, n: usize) -> Vec<Row> {
    let mut rng = Lcg(seed);
    (0..n)
        .map(|_| {
            let mut row = Row::new();
            if rng.below(6) != 0 {
                let source = SOURCES[rng.below(SOURCES.len() as u64) as usize];
                row.insert(kpi::SOURCE_FIELD.to_string(), source.into());
            }
            match rng.below(8) {
                0 => {}
                1 => {
                    row.insert(kpi::JOIN_DATE_FIELD.to_string(), "not a date".into());
                }
                _ => {
                    let joined = now() - Duration::days(rng.below(400) as i64);
                    row.insert(kpi::JOIN_DATE_FIELD.to_string(), CellValue::date(joined));
                }
            }
            if rng.below(5) != 0 {
                let active = now() - Duration::days(rng.below(90) as i64);
                row.insert(kpi::LAST_ACTIVE_FIELD.to_string(), CellValue::date(active));
            }
            if rng.below(4) != 0 {
                row.insert("messages".to_string(), CellValue::Number(rng.below(500) as f64));
            }
            row.insert("name".to_string(), format!("member-{}", rng.next()).as_str().into());
            row
        })
        .collect()
}

fn tables() -> Vec<Vec<Row>> {
    let mut out = vec![Vec::new()];
    for (seed, n) in [(1, 1), (2, 3), (3, 10), (4, 11), (5, 57), (6, 250)] {
        out.push(members(seed, n));
    }
    out
}

fn pie() -> ChartDescriptor {
    ChartDescriptor::new("sources", "Sources", ChartKind::Pie, kpi::SOURCE_FIELD)
}

fn line() -> ChartDescriptor {
    ChartDescriptor::new("growth", "Growth", ChartKind::Line, kpi::JOIN_DATE_FIELD)
}

fn top_bar() -> ChartDescriptor {
    ChartDescriptor::new("top", "Most messages", ChartKind::Bar, "name").with_value_field("messages")
}

fn dated(rows: &[Row]) -> usize {
    rows.iter()
        .filter(|r| {
            r.get(kpi::JOIN_DATE_FIELD)
                .and_then(CellValue::as_datetime)
                .is_some()
        })
        .count()
}

// ---------------------------------------------------------------------------
// KPI properties
// ---------------------------------------------------------------------------

#[test]
fn total_members_is_row_count() {
    for rows in tables() {
        let k = compute_kpis_at(&rows, now(), 30);
        assert_eq!(k.total_members as usize, rows.len());
    }
}

#[test]
fn active_and_new_never_exceed_total() {
    for rows in tables() {
        for window in [0, 7, 30, 365] {
            let k = compute_kpis_at(&rows, now(), window);
            assert!(k.active_members <= k.total_members);
            assert!(k.new_members <= k.total_members);
        }
    }
}

#[test]
fn top_source_is_present_or_unknown() {
    for rows in tables() {
        let k = compute_kpis_at(&rows, now(), 30);
        let present = rows.iter().any(|r| {
            r.get(kpi::SOURCE_FIELD)
                .and_then(CellValue::as_label)
                .as_deref()
                == Some(k.top_acquisition_source.as_str())
        });
        assert!(
            present || k.top_acquisition_source == kpi::UNKNOWN_SOURCE,
            "{} not found in rows",
            k.top_acquisition_source
        );
    }
}

// ---------------------------------------------------------------------------
// Aggregation properties
// ---------------------------------------------------------------------------

#[test]
fn pie_total_equals_row_count() {
    let opts = AggregateOptions::default();
    for rows in tables() {
        let series = aggregate(&rows, &pie(), &opts);
        if rows.iter().any(|r| r.contains_key(kpi::SOURCE_FIELD)) {
            assert_eq!(series.total() as usize, rows.len());
        } else {
            assert!(series.is_empty());
        }
    }
}

#[test]
fn line_is_non_decreasing_and_ends_at_dated_rows() {
    for bucket in [TimeBucket::Day, TimeBucket::Month] {
        let opts = AggregateOptions {
            line_bucket: bucket,
            ..AggregateOptions::default()
        };
        for rows in tables() {
            let series = aggregate(&rows, &line(), &opts);
            let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]));
            let last = values.last().copied().unwrap_or(0.0);
            assert_eq!(last as usize, dated(&rows));
        }
    }
}

#[test]
fn bar_top_values_is_bounded_and_sorted() {
    let opts = AggregateOptions::default();
    for rows in tables() {
        let with_value = rows
            .iter()
            .filter(|r| r.get("messages").and_then(CellValue::as_number).is_some())
            .count();
        let series = aggregate(&rows, &top_bar(), &opts);
        assert_eq!(series.len(), with_value.min(10));
        assert!(series.points.windows(2).all(|w| w[0].value >= w[1].value));
    }
}

#[test]
fn monthly_bar_counts_dated_rows() {
    let bar = ChartDescriptor::new("monthly", "Monthly", ChartKind::Bar, kpi::JOIN_DATE_FIELD)
        .with_bar_policy(BarPolicy::MonthlyCounts);
    for rows in tables() {
        let series = aggregate(&rows, &bar, &AggregateOptions::default());
        assert_eq!(series.total() as usize, dated(&rows));
    }
}

#[test]
fn aggregation_is_idempotent() {
    let opts = AggregateOptions::default();
    let rows = members(42, 120);
    for descriptor in [pie(), line(), top_bar()] {
        assert_eq!(
            aggregate(&rows, &descriptor, &opts),
            aggregate(&rows, &descriptor, &opts)
        );
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn pie_scenario_three_rows() {
    let rows: Vec<Row> = ["X", "Y", "X"]
        .iter()
        .map(|s| {
            let mut row = Row::new();
            row.insert(kpi::SOURCE_FIELD.to_string(), (*s).into());
            row
        })
        .collect();
    let series = aggregate(&rows, &pie(), &AggregateOptions::default());
    let points: Vec<(&str, f64)> = series
        .points
        .iter()
        .map(|p| (p.label.as_str(), p.value))
        .collect();
    assert_eq!(points, vec![("X", 2.0), ("Y", 1.0)]);
}

#[test]
fn empty_rows_never_fail() {
    let descriptors = [
        pie(),
        line(),
        top_bar(),
        ChartDescriptor::new("area", "Area", ChartKind::Area, kpi::JOIN_DATE_FIELD),
        ChartDescriptor::new("radar", "Radar", ChartKind::parse("radar"), "x"),
    ];
    for descriptor in &descriptors {
        let series = aggregate(&[], descriptor, &AggregateOptions::default());
        assert!(series.is_empty(), "{} should be empty", descriptor.id);
    }
}
