//! JSON API handlers for the web dashboard.
//!
//! Each handler corresponds to an API endpoint and returns a [`Reply`] with
//! JSON content. Controller misuse (busy, wrong phase) is answered with
//! `409`. Backend failures are not HTTP errors here; they show up in the
//! session's `error`/`notice` fields.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analytics::events::SessionEvent;
use crate::dashboard::{DashboardError, Operation, Outcome, Phase};
use crate::gateway::UploadFile;
use crate::model::{ChartDescriptor, KpiSnapshot};

use super::{Reply, WebState};

const SURFACE: &str = "web";

// ---------------------------------------------------------------------------
// JSON response types
// ---------------------------------------------------------------------------

/// Session API response: everything the frontend renders except chart data.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse<'a> {
    phase: Phase,
    busy: BusyResponse,
    error: Option<&'a str>,
    notice: Option<&'a str>,
    columns: &'a [String],
    row_count: usize,
    kpis: Option<&'a KpiSnapshot>,
    summary: Option<&'a str>,
    suggested: &'a [ChartDescriptor],
    active: Vec<&'a str>,
}

#[derive(Serialize)]
struct BusyResponse {
    upload: bool,
    suggest: bool,
    summarize: bool,
}

/// Add-chart request body.
#[derive(Deserialize)]
struct AddChartRequest {
    id: String,
}

/// Health API response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    backend_url: String,
    backend_available: bool,
    config_exists: bool,
    events_enabled: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn conflict(err: &DashboardError) -> Reply {
    Reply::error(409, &err.to_string())
}

/// Parse the `?name=...` query parameter from a URL.
fn parse_name_param(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(k, v)| k == "name" && !v.is_empty())
        .map(|(_, v)| v.into_owned())
}

fn session_body(state: &WebState) -> Result<Reply> {
    let dashboard = &state.dashboard;
    let session = dashboard.session();

    let resp = SessionResponse {
        phase: dashboard.phase(),
        busy: BusyResponse {
            upload: dashboard.is_busy(Operation::Upload),
            suggest: dashboard.is_busy(Operation::Suggest),
            summarize: dashboard.is_busy(Operation::Summarize),
        },
        error: dashboard.error(),
        notice: dashboard.notice(),
        columns: &session.columns,
        row_count: session.rows.len(),
        kpis: session.kpis.as_ref(),
        summary: session.summary.as_deref(),
        suggested: &session.suggested,
        active: session.active.iter().map(|d| d.id.as_str()).collect(),
    };

    Reply::json(&resp)
}

/// Request a summary right after an upload when the backend sent none.
fn auto_summarize(state: &mut WebState) {
    if !state.dashboard.wants_summary() {
        return;
    }
    match state.dashboard.summarize(state.backend.as_ref()) {
        Ok(outcome) => state
            .events
            .record(&SessionEvent::new(SURFACE, "summarize", &outcome)),
        Err(e) => log::debug!("automatic summary skipped: {e}"),
    }
}

// ---------------------------------------------------------------------------
// API Handlers
// ---------------------------------------------------------------------------

/// `GET /api/session`: current dashboard state.
pub fn get_session(state: &WebState) -> Result<Reply> {
    session_body(state)
}

/// `POST /api/session/upload?name=<file>`: body is the raw file.
///
/// A file without a `.csv` name is rejected without contacting the backend;
/// the rejection still passes through the controller so it shows up as the
/// dashboard error.
pub fn post_upload(state: &mut WebState, url: &str, body: &[u8]) -> Result<Reply> {
    let Some(name) = parse_name_param(url) else {
        return Ok(Reply::error(400, "missing ?name= parameter"));
    };

    let outcome = match UploadFile::new(name.as_str(), body.to_vec()) {
        Ok(file) => state.dashboard.upload(state.backend.as_ref(), &file),
        Err(rejected) => state.dashboard.reject_upload(rejected),
    };
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => return Ok(conflict(&e)),
    };

    let mut event = SessionEvent::new(SURFACE, "upload", &outcome);
    if outcome == Outcome::Applied {
        event = event
            .with_detail(name)
            .with_rows(state.dashboard.session().rows.len());
    }
    state.events.record(&event);

    if outcome == Outcome::Applied {
        auto_summarize(state);
    }

    session_body(state)
}

/// `POST /api/session/suggest`: fetch chart suggestions.
pub fn post_suggest(state: &mut WebState) -> Result<Reply> {
    match state.dashboard.suggest(state.backend.as_ref()) {
        Ok(outcome) => {
            let event = SessionEvent::new(SURFACE, "suggest", &outcome)
                .with_rows(state.dashboard.session().suggested.len());
            state.events.record(&event);
            session_body(state)
        }
        Err(e) => Ok(conflict(&e)),
    }
}

/// `POST /api/session/summarize`: (re)generate the narrative summary.
pub fn post_summarize(state: &mut WebState) -> Result<Reply> {
    match state.dashboard.summarize(state.backend.as_ref()) {
        Ok(outcome) => {
            state
                .events
                .record(&SessionEvent::new(SURFACE, "summarize", &outcome));
            session_body(state)
        }
        Err(e) => Ok(conflict(&e)),
    }
}

/// `POST /api/session/charts`: add a suggested chart by id.
///
/// Expects JSON body: `{ "id": "source-breakdown" }`
pub fn post_chart(state: &mut WebState, body: &[u8]) -> Result<Reply> {
    let req: AddChartRequest =
        serde_json::from_slice(body).context("invalid JSON in add-chart request")?;

    match state.dashboard.add_chart(&req.id) {
        Ok(added) => {
            if added {
                let event =
                    SessionEvent::new(SURFACE, "add_chart", &Outcome::Applied).with_detail(req.id);
                state.events.record(&event);
            }
            session_body(state)
        }
        Err(e @ DashboardError::UnknownSuggestion(_)) => Ok(Reply::error(404, &e.to_string())),
        Err(e) => Ok(conflict(&e)),
    }
}

/// `GET /api/session/charts`: active charts with freshly aggregated data.
pub fn get_charts(state: &WebState) -> Result<Reply> {
    Reply::json(&state.dashboard.charts())
}

/// `POST /api/session/reset`: clear the session.
pub fn post_reset(state: &mut WebState) -> Result<Reply> {
    state.dashboard.reset();
    state
        .events
        .record(&SessionEvent::new(SURFACE, "reset", &Outcome::Applied));
    session_body(state)
}

/// `GET /api/health`: reachability of the backend this server talks to.
pub fn get_health(state: &WebState) -> Result<Reply> {
    let resp = HealthResponse {
        backend_url: state.backend.location().to_string(),
        backend_available: state.backend.is_healthy(),
        config_exists: state.config_exists,
        events_enabled: state.events.is_enabled(),
    };

    Reply::json(&resp)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
