//! Dashboard state controller.
//!
//! Owns the [`Session`] and moves it through the phases
//! `Empty → Uploading → Ready ⇄ GeneratingSuggestions`, with reset returning
//! to `Empty` from anywhere.
//!
//! Every backend call is split into `begin_*` (checks the phase and the busy
//! flag for that operation class, hands out a [`Ticket`]) and `complete_*`
//! (applies the result). Reset bumps the session generation, so a response
//! that arrives for a ticket issued before the reset is discarded instead of
//! landing in the fresh session. The `upload`/`suggest`/`summarize`
//! helpers run both halves back to back against a [`Backend`].

pub mod session;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::charts::{self, AggregateOptions};
use crate::config::schema::DashboardConfig;
use crate::gateway::{self, Backend, GatewayError, UploadFile, UploadPayload};
use crate::kpi;
use crate::model::{AggregatedSeries, ChartDescriptor};

pub use session::Session;

// ---------------------------------------------------------------------------
// Phases, operations, tickets
// ---------------------------------------------------------------------------

/// Where the dashboard is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Empty,
    Uploading,
    Ready,
    GeneratingSuggestions,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Uploading => write!(f, "uploading"),
            Self::Ready => write!(f, "ready"),
            Self::GeneratingSuggestions => write!(f, "generating suggestions"),
        }
    }
}

/// Operation classes, each with its own busy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Suggest,
    Summarize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Suggest => write!(f, "chart suggestion request"),
            Self::Summarize => write!(f, "summary request"),
        }
    }
}

/// Handle for one outstanding backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    op: Operation,
}

impl Ticket {
    pub fn operation(&self) -> Operation {
        self.op
    }
}

/// What happened when a result was handed back to the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The result was applied to the session.
    Applied,
    /// The call failed; the message is now the dashboard error.
    Failed(String),
    /// Suggestions failed and the built-in list was offered instead.
    FellBack(String),
    /// The ticket predates a reset; the result was dropped.
    Stale,
}

/// Misuse of the controller (the UI should have prevented it).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    #[error("a {0} is already in progress")]
    Busy(Operation),
    #[error("cannot {action} while the dashboard is {phase}")]
    InvalidPhase { action: &'static str, phase: Phase },
    #[error("no suggested chart with id '{0}'")]
    UnknownSuggestion(String),
}

/// An active chart with its freshly aggregated data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub descriptor: ChartDescriptor,
    pub series: AggregatedSeries,
}

#[derive(Debug, Clone, Copy, Default)]
struct BusyFlags {
    upload: bool,
    suggest: bool,
    summarize: bool,
}

impl BusyFlags {
    fn get(&self, op: Operation) -> bool {
        match op {
            Operation::Upload => self.upload,
            Operation::Suggest => self.suggest,
            Operation::Summarize => self.summarize,
        }
    }

    fn set(&mut self, op: Operation, busy: bool) {
        match op {
            Operation::Upload => self.upload = busy,
            Operation::Suggest => self.suggest = busy,
            Operation::Summarize => self.summarize = busy,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// The single writer of dashboard state.
#[derive(Debug)]
pub struct Dashboard {
    config: DashboardConfig,
    phase: Phase,
    session: Session,
    generation: u64,
    busy: BusyFlags,
    error: Option<String>,
    notice: Option<String>,
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            phase: Phase::Empty,
            session: Session::default(),
            generation: 0,
            busy: BusyFlags::default(),
            error: None,
            notice: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Last user-facing error, cleared when a new action starts.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Non-fatal notice, e.g. that fallback suggestions are shown.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.busy.get(op)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        self.config.aggregate_options()
    }

    // -- Upload --

    /// Start an upload. Only allowed from `Empty`.
    pub fn begin_upload(&mut self) -> Result<Ticket, DashboardError> {
        if self.busy.upload {
            return Err(DashboardError::Busy(Operation::Upload));
        }
        if self.phase != Phase::Empty {
            return Err(self.invalid("upload a file"));
        }

        self.phase = Phase::Uploading;
        Ok(self.issue(Operation::Upload))
    }

    /// Apply the upload result. Success replaces the session; failure
    /// returns to `Empty` with the error shown.
    pub fn complete_upload(
        &mut self,
        ticket: Ticket,
        result: Result<UploadPayload, GatewayError>,
    ) -> Outcome {
        if !self.accept(ticket, Operation::Upload) {
            return Outcome::Stale;
        }

        match result {
            Ok(payload) => {
                let kpis = match payload.kpis.clone() {
                    Some(kpis) => kpis,
                    None => {
                        log::info!("upload carried no KPIs; computing them locally");
                        kpi::compute_kpis(&payload.rows, self.config.active_window_days)
                    }
                };
                log::info!(
                    "upload applied: {} rows, {} columns",
                    payload.rows.len(),
                    payload.columns.len()
                );
                self.session = Session::from_upload(payload, kpis);
                self.phase = Phase::Ready;
                Outcome::Applied
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("upload failed: {message}");
                self.session = Session::default();
                self.phase = Phase::Empty;
                self.error = Some(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    /// Record an upload the gateway refused locally (e.g. not a CSV).
    ///
    /// Goes through the normal upload transition so the rejection is shown
    /// as the dashboard error, without any backend call.
    pub fn reject_upload(&mut self, err: GatewayError) -> Result<Outcome, DashboardError> {
        let ticket = self.begin_upload()?;
        Ok(self.complete_upload(ticket, Err(err)))
    }

    // -- Suggestions --

    /// Start a suggestion request. Only allowed from `Ready`.
    pub fn begin_suggestions(&mut self) -> Result<Ticket, DashboardError> {
        if self.busy.suggest {
            return Err(DashboardError::Busy(Operation::Suggest));
        }
        if self.phase != Phase::Ready {
            return Err(self.invalid("suggest charts"));
        }

        self.phase = Phase::GeneratingSuggestions;
        Ok(self.issue(Operation::Suggest))
    }

    /// Apply the suggestion result and return to `Ready`.
    ///
    /// With `fallback_suggestions` on, a failure (or an empty answer) puts
    /// the built-in chart list on offer and records a notice instead of an
    /// error.
    pub fn complete_suggestions(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<ChartDescriptor>, GatewayError>,
    ) -> Outcome {
        if !self.accept(ticket, Operation::Suggest) {
            return Outcome::Stale;
        }
        self.phase = Phase::Ready;

        let failure = match result {
            Ok(list) if !list.is_empty() => {
                self.session.suggested = list;
                return Outcome::Applied;
            }
            Ok(_) => "No chart suggestions were returned.".to_string(),
            Err(e) => e.to_string(),
        };

        if self.config.fallback_suggestions {
            log::warn!("chart suggestions unavailable ({failure}); offering defaults");
            self.session.suggested = gateway::fallback_suggestions();
            let notice = format!("{failure} Showing default chart suggestions.");
            self.notice = Some(notice.clone());
            Outcome::FellBack(notice)
        } else {
            log::warn!("chart suggestions failed: {failure}");
            self.error = Some(failure.clone());
            Outcome::Failed(failure)
        }
    }

    // -- Summary --

    /// Whether an automatic summary request should follow the upload.
    pub fn wants_summary(&self) -> bool {
        self.config.auto_summarize
            && matches!(self.phase, Phase::Ready | Phase::GeneratingSuggestions)
            && self.session.summary.is_none()
            && self.session.kpis.is_some()
            && !self.busy.summarize
    }

    /// Start a summary request. Returns the ticket plus the request inputs.
    pub fn begin_summary(
        &mut self,
    ) -> Result<(Ticket, String, crate::model::KpiSnapshot), DashboardError> {
        if self.busy.summarize {
            return Err(DashboardError::Busy(Operation::Summarize));
        }
        let kpis = match (&self.session.kpis, self.phase) {
            (Some(kpis), Phase::Ready | Phase::GeneratingSuggestions) => kpis.clone(),
            _ => return Err(self.invalid("summarize")),
        };

        let data_summary = self.session.describe();
        Ok((self.issue(Operation::Summarize), data_summary, kpis))
    }

    /// Apply the summary result; the phase is unchanged either way.
    pub fn complete_summary(&mut self, ticket: Ticket, result: Result<String, GatewayError>) -> Outcome {
        if !self.accept(ticket, Operation::Summarize) {
            return Outcome::Stale;
        }

        match result {
            Ok(text) => {
                self.session.summary = Some(text);
                Outcome::Applied
            }
            Err(e) => {
                let message = e.to_string();
                log::warn!("summary failed: {message}");
                self.error = Some(message.clone());
                Outcome::Failed(message)
            }
        }
    }

    // -- Charts --

    /// Copy a suggested chart into the active list.
    ///
    /// Returns `Ok(false)` when a chart with the same id is already active.
    pub fn add_chart(&mut self, id: &str) -> Result<bool, DashboardError> {
        if !matches!(self.phase, Phase::Ready | Phase::GeneratingSuggestions) {
            return Err(self.invalid("add a chart"));
        }
        if self.session.is_active(id) {
            return Ok(false);
        }

        let descriptor = self
            .session
            .suggestion(id)
            .cloned()
            .ok_or_else(|| DashboardError::UnknownSuggestion(id.to_string()))?;
        self.session.active.push(descriptor);
        Ok(true)
    }

    /// Aggregate every active chart against the current rows.
    pub fn charts(&self) -> Vec<ChartView> {
        let options = self.aggregate_options();
        self.session
            .active
            .iter()
            .map(|descriptor| ChartView {
                descriptor: descriptor.clone(),
                series: charts::aggregate(&self.session.rows, descriptor, &options),
            })
            .collect()
    }

    // -- Reset --

    /// Clear the whole session and invalidate outstanding tickets.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.phase = Phase::Empty;
        self.session = Session::default();
        self.busy = BusyFlags::default();
        self.error = None;
        self.notice = None;
        log::debug!("dashboard reset (generation {})", self.generation);
    }

    // -- Synchronous drivers --

    /// Upload a file through `backend` and apply the result.
    pub fn upload(
        &mut self,
        backend: &dyn Backend,
        file: &UploadFile,
    ) -> Result<Outcome, DashboardError> {
        let ticket = self.begin_upload()?;
        let result = backend.upload(file);
        Ok(self.complete_upload(ticket, result))
    }

    /// Fetch suggestions through `backend` and apply them.
    pub fn suggest(&mut self, backend: &dyn Backend) -> Result<Outcome, DashboardError> {
        let ticket = self.begin_suggestions()?;
        let result = backend.suggest(&self.session.columns, &self.session.rows);
        Ok(self.complete_suggestions(ticket, result))
    }

    /// Request a narrative summary through `backend` and apply it.
    pub fn summarize(&mut self, backend: &dyn Backend) -> Result<Outcome, DashboardError> {
        let (ticket, data_summary, kpis) = self.begin_summary()?;
        let result = backend.summarize(&data_summary, &kpis);
        Ok(self.complete_summary(ticket, result))
    }

    // -- Internal --

    fn issue(&mut self, op: Operation) -> Ticket {
        self.busy.set(op, true);
        self.error = None;
        if op != Operation::Summarize {
            self.notice = None;
        }
        Ticket {
            generation: self.generation,
            op,
        }
    }

    /// Check a ticket against the current generation and clear its busy flag.
    fn accept(&mut self, ticket: Ticket, expected: Operation) -> bool {
        if ticket.op != expected {
            log::warn!("ticket for {} used to complete {expected}", ticket.op);
            return false;
        }
        if ticket.generation != self.generation {
            log::debug!(
                "discarding stale {} result (generation {} != {})",
                ticket.op,
                ticket.generation,
                self.generation
            );
            return false;
        }
        self.busy.set(ticket.op, false);
        true
    }

    fn invalid(&self, action: &'static str) -> DashboardError {
        DashboardError::InvalidPhase {
            action,
            phase: self.phase,
        }
    }
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChartKind, KpiSnapshot, Row};

    fn kpis() -> KpiSnapshot {
        KpiSnapshot {
            total_members: 2,
            active_members: 1,
            new_members: 1,
            top_acquisition_source: "X".to_string(),
        }
    }

    fn payload() -> UploadPayload {
        let rows: Vec<Row> = ["X", "Y"]
            .iter()
            .map(|s| {
                let mut row = Row::new();
                row.insert("source_platform".to_string(), (*s).into());
                row
            })
            .collect();
        UploadPayload {
            rows,
            columns: vec!["source_platform".to_string()],
            kpis: Some(kpis()),
            summary: Some("Healthy.".to_string()),
            data_summary: None,
        }
    }

    fn suggestions() -> Vec<ChartDescriptor> {
        vec![ChartDescriptor::new(
            "sources",
            "Sources",
            ChartKind::Pie,
            "source_platform",
        )]
    }

    fn ready() -> Dashboard {
        let mut d = Dashboard::default();
        let t = d.begin_upload().unwrap();
        assert_eq!(d.complete_upload(t, Ok(payload())), Outcome::Applied);
        d
    }

    #[test]
    fn upload_moves_empty_to_ready() {
        let mut d = Dashboard::default();
        assert_eq!(d.phase(), Phase::Empty);

        let t = d.begin_upload().unwrap();
        assert_eq!(d.phase(), Phase::Uploading);
        assert!(d.is_busy(Operation::Upload));

        d.complete_upload(t, Ok(payload()));
        assert_eq!(d.phase(), Phase::Ready);
        assert!(!d.is_busy(Operation::Upload));
        assert_eq!(d.session().rows.len(), 2);
        assert_eq!(d.session().kpis, Some(kpis()));
    }

    #[test]
    fn failed_upload_returns_to_empty_with_error() {
        let mut d = Dashboard::default();
        let t = d.begin_upload().unwrap();
        let outcome = d.complete_upload(
            t,
            Err(GatewayError::TransportFailure("connection refused".into())),
        );

        assert_eq!(outcome, Outcome::Failed("connection refused".into()));
        assert_eq!(d.phase(), Phase::Empty);
        assert_eq!(d.error(), Some("connection refused"));
        assert!(d.session().kpis.is_none());
    }

    #[test]
    fn upload_without_kpis_computes_them_locally() {
        let mut d = Dashboard::default();
        let t = d.begin_upload().unwrap();
        let mut p = payload();
        p.kpis = None;
        d.complete_upload(t, Ok(p));

        let k = d.session().kpis.clone().unwrap();
        assert_eq!(k.total_members, 2);
        assert_eq!(k.top_acquisition_source, "X");
    }

    #[test]
    fn rejected_file_never_leaves_empty() {
        let mut d = Dashboard::default();
        let err = crate::gateway::check_extension("members.xlsx").unwrap_err();
        let outcome = d.reject_upload(err).unwrap();

        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(d.phase(), Phase::Empty);
        assert_eq!(d.error(), Some("Invalid file type. Please upload a CSV file."));
        assert!(!d.is_busy(Operation::Upload));
    }

    #[test]
    fn duplicate_upload_trigger_is_rejected() {
        let mut d = Dashboard::default();
        let _t = d.begin_upload().unwrap();
        assert_eq!(
            d.begin_upload(),
            Err(DashboardError::Busy(Operation::Upload))
        );
    }

    #[test]
    fn upload_from_ready_requires_reset() {
        let mut d = ready();
        assert!(matches!(
            d.begin_upload(),
            Err(DashboardError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn suggestions_round_trip_through_generating_phase() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        assert_eq!(d.phase(), Phase::GeneratingSuggestions);
        assert_eq!(
            d.begin_suggestions(),
            Err(DashboardError::Busy(Operation::Suggest))
        );

        assert_eq!(d.complete_suggestions(t, Ok(suggestions())), Outcome::Applied);
        assert_eq!(d.phase(), Phase::Ready);
        assert_eq!(d.session().suggested.len(), 1);
    }

    #[test]
    fn suggestion_failure_falls_back_with_notice() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        let outcome = d.complete_suggestions(
            t,
            Err(GatewayError::RemoteError("quota exceeded".into())),
        );

        assert!(matches!(outcome, Outcome::FellBack(_)));
        assert_eq!(d.phase(), Phase::Ready);
        assert_eq!(d.session().suggested, gateway::fallback_suggestions());
        assert!(d.notice().unwrap().contains("quota exceeded"));
        assert!(d.error().is_none());
    }

    #[test]
    fn suggestion_failure_without_fallback_keeps_list() {
        let mut d = Dashboard::new(DashboardConfig {
            fallback_suggestions: false,
            ..DashboardConfig::default()
        });
        let t = d.begin_upload().unwrap();
        d.complete_upload(t, Ok(payload()));
        let t = d.begin_suggestions().unwrap();
        d.complete_suggestions(t, Ok(suggestions()));

        let t = d.begin_suggestions().unwrap();
        let outcome = d.complete_suggestions(t, Err(GatewayError::TransportFailure("down".into())));

        assert_eq!(outcome, Outcome::Failed("down".into()));
        assert_eq!(d.phase(), Phase::Ready);
        assert_eq!(d.session().suggested, suggestions());
        assert_eq!(d.error(), Some("down"));
    }

    #[test]
    fn add_chart_is_idempotent_by_id() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        d.complete_suggestions(t, Ok(suggestions()));

        assert_eq!(d.add_chart("sources"), Ok(true));
        assert_eq!(d.add_chart("sources"), Ok(false));
        assert_eq!(d.session().active.len(), 1);
        assert_eq!(
            d.add_chart("nope"),
            Err(DashboardError::UnknownSuggestion("nope".into()))
        );
    }

    #[test]
    fn add_chart_allowed_while_generating() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        d.complete_suggestions(t, Ok(suggestions()));
        let _t = d.begin_suggestions().unwrap();
        assert_eq!(d.add_chart("sources"), Ok(true));
    }

    #[test]
    fn add_chart_rejected_when_empty() {
        let mut d = Dashboard::default();
        assert!(matches!(
            d.add_chart("sources"),
            Err(DashboardError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn charts_are_aggregated_from_current_rows() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        d.complete_suggestions(t, Ok(suggestions()));
        d.add_chart("sources").unwrap();

        let views = d.charts();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].series.total(), 2.0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        d.complete_suggestions(t, Ok(suggestions()));
        d.add_chart("sources").unwrap();

        d.reset();
        assert_eq!(d.phase(), Phase::Empty);
        assert!(d.session().rows.is_empty());
        assert!(d.session().suggested.is_empty());
        assert!(d.session().active.is_empty());
        assert!(d.session().kpis.is_none());
    }

    #[test]
    fn stale_upload_after_reset_is_ignored() {
        let mut d = Dashboard::default();
        let stale = d.begin_upload().unwrap();
        d.reset();

        assert_eq!(d.complete_upload(stale, Ok(payload())), Outcome::Stale);
        assert_eq!(d.phase(), Phase::Empty);
        assert!(d.session().rows.is_empty());

        // A new upload proceeds normally.
        let t = d.begin_upload().unwrap();
        assert_eq!(d.complete_upload(t, Ok(payload())), Outcome::Applied);
    }

    #[test]
    fn stale_suggestions_do_not_touch_new_session() {
        let mut d = ready();
        let stale = d.begin_suggestions().unwrap();
        d.reset();
        let t = d.begin_upload().unwrap();
        d.complete_upload(t, Ok(payload()));

        assert_eq!(d.complete_suggestions(stale, Ok(suggestions())), Outcome::Stale);
        assert!(d.session().suggested.is_empty());
        assert_eq!(d.phase(), Phase::Ready);
    }

    #[test]
    fn summary_updates_text_without_phase_change() {
        let mut d = ready();
        let (t, data_summary, k) = d.begin_summary().unwrap();
        assert!(data_summary.contains("Total records: 2"));
        assert_eq!(k, kpis());

        assert_eq!(d.complete_summary(t, Ok("Growing fast.".into())), Outcome::Applied);
        assert_eq!(d.session().summary.as_deref(), Some("Growing fast."));
        assert_eq!(d.phase(), Phase::Ready);
    }

    #[test]
    fn wants_summary_only_when_missing() {
        let d = ready();
        assert!(!d.wants_summary());

        let mut d = Dashboard::default();
        let t = d.begin_upload().unwrap();
        let mut p = payload();
        p.summary = None;
        d.complete_upload(t, Ok(p));
        assert!(d.wants_summary());
    }

    #[test]
    fn mismatched_ticket_is_ignored() {
        let mut d = ready();
        let t = d.begin_suggestions().unwrap();
        assert_eq!(d.complete_upload(t, Ok(payload())), Outcome::Stale);
        assert_eq!(d.phase(), Phase::GeneratingSuggestions);
    }
}
