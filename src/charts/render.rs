//! Plain-text chart rendering for the terminal surface.

use colored::Colorize;

use crate::model::{AggregatedSeries, ChartDescriptor, ChartKind};

/// Width of the longest bar, in characters.
const BAR_WIDTH: usize = 40;

/// Render one chart as a block of text lines (no trailing newline).
pub fn render_chart(descriptor: &ChartDescriptor, series: &AggregatedSeries) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "{} {}",
        descriptor.title.bold().cyan(),
        format!("[{}]", descriptor.kind).dimmed()
    ));

    if !descriptor.kind.is_supported() {
        out.push(format!("  Chart type \"{}\" not supported", descriptor.kind).yellow().to_string());
        return out.join("\n");
    }
    if series.is_empty() {
        out.push("  No data available for this chart".yellow().to_string());
        return out.join("\n");
    }

    let label_width = series
        .points
        .iter()
        .map(|p| p.label.chars().count())
        .max()
        .unwrap_or(0)
        .min(24);
    let max = series.points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    let total = series.total();

    for point in &series.points {
        let len = if max > 0.0 {
            ((point.value / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let bar = "█".repeat(len.max(usize::from(point.value > 0.0)));
        let suffix = match descriptor.kind {
            ChartKind::Pie if total > 0.0 => {
                format!("{} ({:.0}%)", format_value(point.value), point.value / total * 100.0)
            }
            _ => format_value(point.value),
        };
        out.push(format!(
            "  {:<width$} {} {}",
            truncate(&point.label, label_width),
            bar.green(),
            suffix,
            width = label_width
        ));
    }

    out.push(format!("  {} / {}", series.x_label, series.y_label).dimmed().to_string());
    out.join("\n")
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{v:.2}")
    }
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
