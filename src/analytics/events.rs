//! Session event log: one JSON line per dashboard action.
//!
//! Records uploads, suggestion requests, summaries, chart additions and
//! resets together with their outcome, so usage and backend failures can be
//! reviewed after the fact with `insights events`.
//!
//! Log file: `~/.insights/events.jsonl`

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::schema::LoggingConfig;
use crate::dashboard::Outcome;

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

/// One dashboard action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub timestamp: String,
    /// `"upload"`, `"suggest"`, `"summarize"`, `"add_chart"` or `"reset"`.
    pub action: String,
    /// `"applied"`, `"failed"`, `"fallback"` or `"stale"`.
    pub outcome: String,
    /// File name, chart id or error text, depending on the action.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rows: Option<usize>,
    /// Where the action came from: `"cli"` or `"web"`.
    pub surface: String,
}

impl SessionEvent {
    pub fn new(surface: &str, action: &str, outcome: &Outcome) -> Self {
        let (outcome, detail) = match outcome {
            Outcome::Applied => ("applied", None),
            Outcome::Failed(msg) => ("failed", Some(msg.clone())),
            Outcome::FellBack(msg) => ("fallback", Some(msg.clone())),
            Outcome::Stale => ("stale", None),
        };
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: action.to_string(),
            outcome: outcome.to_string(),
            detail,
            rows: None,
            surface: surface.to_string(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Appends events when `[logging] events` is enabled.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            path: if config.events { events_log_path() } else { None },
        }
    }

    /// Log to an explicit file.
    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Append an event. Best-effort: failures only reach the debug log.
    pub fn record(&self, event: &SessionEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_event(path, event) {
            log::debug!("failed to write event log {}: {e}", path.display());
        }
    }

    /// Most recent `limit` events, oldest first. Unparseable lines are skipped.
    pub fn recent(&self, limit: usize) -> Result<Vec<SessionEvent>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(path)?;
        let mut events: Vec<SessionEvent> = BufReader::new(file)
            .lines()
            .map_while(|line| line.ok())
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(&line).ok())
            .collect();

        let skip = events.len().saturating_sub(limit);
        Ok(events.split_off(skip))
    }
}

fn append_event(path: &Path, event: &SessionEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}

fn events_log_path() -> Option<PathBuf> {
    crate::config::insights_home().map(|dir| dir.join("events.jsonl"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_log(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "insights-events-{name}-{}.jsonl",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn event_from_outcome() {
        let e = SessionEvent::new("cli", "upload", &Outcome::Failed("boom".into()));
        assert_eq!(e.outcome, "failed");
        assert_eq!(e.detail.as_deref(), Some("boom"));

        let e = SessionEvent::new("web", "suggest", &Outcome::Applied).with_rows(3);
        assert_eq!(e.outcome, "applied");
        assert_eq!(e.rows, Some(3));
    }

    #[test]
    fn record_and_read_back() {
        let path = temp_log("roundtrip");
        let log = EventLog::at(path.clone());
        for action in ["upload", "suggest", "reset"] {
            log.record(&SessionEvent::new("cli", action, &Outcome::Applied));
        }

        let recent = log.recent(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, "suggest");
        assert_eq!(recent[1].action, "reset");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn disabled_log_is_silent() {
        let log = EventLog::disabled();
        assert!(!log.is_enabled());
        log.record(&SessionEvent::new("cli", "upload", &Outcome::Applied));
        assert!(log.recent(10).unwrap().is_empty());
    }

    #[test]
    fn serialized_event_omits_empty_fields() {
        let e = SessionEvent::new("web", "reset", &Outcome::Applied);
        let json = serde_json::to_string(&e).unwrap();
        assert!(!json.contains("detail"));
        assert!(!json.contains("rows"));
    }
}
