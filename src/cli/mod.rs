//! CLI command implementations for insights.
//!
//! Provides subcommand handlers for:
//! - `insights analyze <file.csv>`: upload, KPIs, summary, suggestions, charts
//! - `insights kpis <rows.json>`: compute KPIs locally from exported rows
//! - `insights events`: recent session events
//! - `insights health`: backend reachability and local setup
//! - `insights config show|init|set|reset`: configuration management
//! - `insights web`: start the local dashboard

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::analytics::events::{EventLog, SessionEvent};
use crate::charts::render::{render_chart, truncate};
use crate::config::{self, InsightsConfig};
use crate::dashboard::{Dashboard, Outcome};
use crate::gateway::{Backend, HttpBackend, UploadFile};
use crate::kpi;
use crate::model::{KpiSnapshot, Row};

const SURFACE: &str = "cli";

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// insights analyze
// ---------------------------------------------------------------------------

/// Options for `insights analyze`.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Ask the backend for chart suggestions.
    pub suggest: bool,
    /// Suggested chart ids to add; `all` adds every suggestion.
    pub charts: Vec<String>,
    /// Skip the narrative summary request.
    pub no_summary: bool,
}

/// Run one dashboard session against the configured backend and print it.
pub fn run_analyze(path: &Path, options: &AnalyzeOptions, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    let backend = HttpBackend::from_config(&cfg.backend);
    let events = EventLog::from_config(&cfg.logging);
    let mut dashboard = Dashboard::new(cfg.dashboard.clone());

    log::debug!("analyzing {} against {}", path.display(), backend.base_url());

    // Upload
    let outcome = match UploadFile::from_path(path) {
        Ok(file) => dashboard.upload(&backend, &file)?,
        Err(rejected) => dashboard.reject_upload(rejected)?,
    };
    let mut event = SessionEvent::new(SURFACE, "upload", &outcome);
    if outcome == Outcome::Applied {
        event = event
            .with_detail(path.display().to_string())
            .with_rows(dashboard.session().rows.len());
    }
    events.record(&event);
    if let Outcome::Failed(message) = outcome {
        anyhow::bail!("upload failed: {message}");
    }

    // Summary
    if !options.no_summary && dashboard.wants_summary() {
        let outcome = dashboard.summarize(&backend)?;
        events.record(&SessionEvent::new(SURFACE, "summarize", &outcome));
    }

    // Suggestions and charts
    if options.suggest || !options.charts.is_empty() {
        let outcome = dashboard.suggest(&backend)?;
        events.record(
            &SessionEvent::new(SURFACE, "suggest", &outcome)
                .with_rows(dashboard.session().suggested.len()),
        );

        let ids: Vec<String> = if options.charts.iter().any(|c| c == "all") {
            dashboard
                .session()
                .suggested
                .iter()
                .map(|d| d.id.clone())
                .collect()
        } else {
            options.charts.clone()
        };
        for id in &ids {
            if dashboard
                .add_chart(id)
                .with_context(|| format!("cannot add chart '{id}'"))?
            {
                events.record(
                    &SessionEvent::new(SURFACE, "add_chart", &Outcome::Applied).with_detail(id),
                );
            }
        }
    }

    match format {
        OutputFormat::Json => print_session_json(&dashboard)?,
        OutputFormat::Table => print_session_table(&dashboard, path),
    }

    Ok(())
}

fn print_session_table(dashboard: &Dashboard, path: &Path) {
    let session = dashboard.session();

    println!("{}", "Community Insights".bold().cyan());
    println!("{}", "=".repeat(60));
    println!(
        "  {} {} ({} rows, {} columns)",
        "File:".bold(),
        path.display(),
        format_number(session.rows.len()),
        session.columns.len()
    );
    println!();

    if let Some(kpis) = &session.kpis {
        print_kpis_table(kpis);
        println!();
    }

    if let Some(summary) = &session.summary {
        println!("{}", "Summary".bold().cyan());
        for line in summary.lines() {
            println!("  {line}");
        }
        println!();
    }

    if let Some(error) = dashboard.error() {
        println!("{} {}", "Error:".red().bold(), error);
        println!();
    }
    if let Some(notice) = dashboard.notice() {
        println!("{} {}", "Note:".yellow().bold(), notice);
        println!();
    }

    if !session.suggested.is_empty() {
        println!("{}", "Suggested Charts".bold().cyan());
        println!("  {:<24} {:<6} Title", "Id", "Kind");
        println!("  {}", "-".repeat(58));
        for (i, d) in session.suggested.iter().enumerate() {
            let marker = if session.is_active(&d.id) { "*" } else { " " };
            let line = format!(
                "{marker} {:<24} {:<6} {}",
                truncate(&d.id, 24),
                d.kind.as_str(),
                d.title
            );
            if i % 2 == 0 {
                println!("{}", line);
            } else {
                println!("{}", line.dimmed());
            }
        }
        println!();
    }

    for view in dashboard.charts() {
        println!("{}", render_chart(&view.descriptor, &view.series));
        println!();
    }
}

fn print_session_json(dashboard: &Dashboard) -> Result<()> {
    let session = dashboard.session();
    let value = serde_json::json!({
        "phase": dashboard.phase(),
        "rowCount": session.rows.len(),
        "columns": session.columns,
        "kpis": session.kpis,
        "summary": session.summary,
        "error": dashboard.error(),
        "notice": dashboard.notice(),
        "suggested": session.suggested,
        "charts": dashboard.charts(),
    });
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// insights kpis
// ---------------------------------------------------------------------------

/// Compute KPIs locally from a JSON array of row objects.
pub fn run_kpis(path: &Path, window_days: Option<u32>, format: OutputFormat) -> Result<()> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let rows: Vec<Row> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of row objects", path.display()))?;

    let window = window_days.unwrap_or_else(|| config::load().dashboard.active_window_days);
    let kpis = kpi::compute_kpis(&rows, window);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&kpis)?),
        OutputFormat::Table => {
            print_kpis_table(&kpis);
            println!(
                "  {}",
                format!("{} rows, {window}-day window", format_number(rows.len())).dimmed()
            );
        }
    }

    Ok(())
}

fn print_kpis_table(kpis: &KpiSnapshot) {
    println!("{}", "Key Metrics".bold().cyan());
    println!(
        "  {} {}",
        "Total members: ".bold(),
        format_number(kpis.total_members as usize)
    );
    println!(
        "  {} {}",
        "Active members:".bold(),
        format_number(kpis.active_members as usize)
    );
    println!(
        "  {} {}",
        "New members:   ".bold(),
        format_number(kpis.new_members as usize)
    );
    println!(
        "  {} {}",
        "Top source:    ".bold(),
        kpis.top_acquisition_source
    );
}

// ---------------------------------------------------------------------------
// insights events
// ---------------------------------------------------------------------------

/// Show the most recent session events.
pub fn run_events(limit: usize, format: OutputFormat) -> Result<()> {
    let cfg = config::load();
    if !cfg.logging.events {
        println!(
            "{}",
            "Event logging is disabled (logging.events = false).".yellow()
        );
        return Ok(());
    }

    let events = EventLog::from_config(&cfg.logging).recent(limit)?;
    if events.is_empty() {
        println!("{}", "No events recorded yet.".yellow());
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&events)?),
        OutputFormat::Table => {
            println!("{}", "Recent Session Events".bold().cyan());
            println!(
                "  {:<20} {:<4} {:<10} {:<9} Detail",
                "Time", "Via", "Action", "Outcome"
            );
            println!("  {}", "-".repeat(70));
            for e in &events {
                let time = chrono::DateTime::parse_from_rfc3339(&e.timestamp)
                    .map(|t| {
                        t.with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_else(|_| e.timestamp.clone());
                println!(
                    "  {:<20} {:<4} {:<10} {:<9} {}",
                    time,
                    e.surface,
                    e.action,
                    colorize_outcome(&e.outcome),
                    truncate(e.detail.as_deref().unwrap_or(""), 40).dimmed()
                );
            }
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// insights health
// ---------------------------------------------------------------------------

/// Check backend reachability, config files and the event log.
pub fn run_health() -> Result<()> {
    println!("{}", "Insights Health Check".bold().cyan());
    println!("{}", "=".repeat(40));

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let cfg = config::load();
    print_health_item(
        "Global config",
        global_exists,
        if global_exists {
            "~/.insights/config.toml found"
        } else {
            "not found (run `insights config init` to create)"
        },
    );
    print_health_item(
        "Project config",
        project_exists,
        if project_exists {
            ".insights.toml found"
        } else {
            "none (optional)"
        },
    );

    let backend = HttpBackend::from_config(&cfg.backend);
    let backend_ok = backend.is_healthy();
    print_health_item(
        "Backend",
        backend_ok,
        &if backend_ok {
            format!("reachable at {}", cfg.backend.base_url)
        } else {
            format!("not reachable at {}, is it running?", cfg.backend.base_url)
        },
    );
    print_health_item(
        "KPI source",
        true,
        if cfg.backend.require_kpis {
            "backend (uploads without KPIs fail)"
        } else {
            "backend, computed locally when missing"
        },
    );
    print_health_item(
        "Fallback suggestions",
        cfg.dashboard.fallback_suggestions,
        if cfg.dashboard.fallback_suggestions {
            "enabled"
        } else {
            "disabled"
        },
    );

    let log = EventLog::from_config(&cfg.logging);
    let count = log.recent(usize::MAX).map(|e| e.len()).unwrap_or(0);
    print_health_item(
        "Event log",
        cfg.logging.events,
        &if cfg.logging.events {
            format!("{count} events")
        } else {
            "disabled".to_string()
        },
    );

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<22} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// insights web
// ---------------------------------------------------------------------------

/// Start the dashboard server; `addr` overrides `web.addr`.
pub fn run_web(addr: Option<String>, no_browser: bool) -> Result<()> {
    let mut cfg: InsightsConfig = config::load();
    if let Some(addr) = addr {
        cfg.web.addr = addr;
    }
    if no_browser {
        cfg.web.open_browser = false;
    }
    crate::web::serve(&cfg)
}

// ---------------------------------------------------------------------------
// insights config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective Insights Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.insights/config.toml", global_exists);
    print_source(".insights.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        "INSIGHTS_* environment variables".dimmed()
    );

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.insights/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!(
        "{} Config written to {}",
        "✓".green().bold(),
        path.display()
    );
    println!(
        "  {}",
        "Edit the file to point insights at your backend.".dimmed()
    );
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!(
        "{} Config reset to defaults at {}",
        "✓".green().bold(),
        path.display()
    );
    Ok(())
}

// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

fn colorize_outcome(outcome: &str) -> colored::ColoredString {
    match outcome {
        "applied" => outcome.green(),
        "fallback" => outcome.yellow(),
        "failed" => outcome.red(),
        _ => outcome.normal(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
