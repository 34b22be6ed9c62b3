//! Embedded web dashboard for insights.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - A single-page dashboard: upload, KPI cards, summary, suggested and
//!   active charts
//! - JSON API endpoints driving one [`Dashboard`] controller
//!
//! Launched via `insights web` (default: `http://127.0.0.1:9747`).

mod api;
mod frontend;

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::analytics::events::EventLog;
use crate::config::InsightsConfig;
use crate::dashboard::Dashboard;
use crate::gateway::{Backend, HttpBackend};

/// A handler's answer, turned into a `tiny_http` response at the edge.
#[derive(Debug)]
pub(crate) struct Reply {
    pub(crate) status: u16,
    pub(crate) content_type: &'static str,
    pub(crate) body: Vec<u8>,
}

impl Reply {
    /// `200` with `data` serialized as JSON.
    pub(crate) fn json<T: serde::Serialize>(data: &T) -> Result<Self> {
        let body = serde_json::to_vec(data).context("failed to serialize JSON response")?;
        Ok(Self {
            status: 200,
            content_type: JSON,
            body,
        })
    }

    /// `{"error": message}` with the given status.
    pub(crate) fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: JSON,
            body: serde_json::json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn into_response(self) -> Response<Cursor<Vec<u8>>> {
        let header = Header::from_bytes("Content-Type", self.content_type)
            .expect("static header is valid");
        Response::from_data(self.body)
            .with_header(header)
            .with_status_code(StatusCode(self.status))
    }
}

const JSON: &str = "application/json; charset=utf-8";
const HTML: &str = "text/html; charset=utf-8";

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

/// Everything the request handlers share: the single dashboard controller,
/// the backend it talks to and the event log.
pub struct WebState {
    pub(crate) dashboard: Dashboard,
    pub(crate) backend: Box<dyn Backend>,
    pub(crate) events: EventLog,
    pub(crate) max_upload_bytes: usize,
    /// Whether `~/.insights/config.toml` existed when the server started.
    pub(crate) config_exists: bool,
}

impl WebState {
    pub fn new(
        dashboard: Dashboard,
        backend: Box<dyn Backend>,
        events: EventLog,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            dashboard,
            backend,
            events,
            max_upload_bytes,
            config_exists: false,
        }
    }

    /// State wired to the HTTP backend described by `config`.
    pub fn from_config(config: &InsightsConfig) -> Self {
        let mut state = Self::new(
            Dashboard::new(config.dashboard.clone()),
            Box::new(HttpBackend::from_config(&config.backend)),
            EventLog::from_config(&config.logging),
            config.web.max_upload_bytes,
        );
        state.config_exists = crate::config::global_config_file().is_some_and(|p| p.exists());
        state
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server.
///
/// Blocks the current thread. Handles requests sequentially: the dashboard
/// is a single-user tool and backend calls run inline, so the controller
/// never sees two operations interleave. Errors are answered per request
/// without stopping the server.
pub fn serve(config: &InsightsConfig) -> Result<()> {
    let addr = config.web.addr.as_str();
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let mut state = WebState::from_config(config);

    println!("insights dashboard running at http://{addr}");
    println!("Backend: {}", config.backend.base_url);
    println!("Press Ctrl+C to stop.\n");

    if config.web.open_browser {
        let url = format!("http://{addr}");
        if let Err(e) = open_browser(&url) {
            log::debug!("could not open browser: {e:#}");
        }
    }

    for request in server.incoming_requests() {
        handle(&mut state, request);
    }

    Ok(())
}

/// Answer one request.
fn handle(state: &mut WebState, mut request: Request) {
    let method = request.method().clone();
    let url = request.url().to_string();

    let body = if matches!(method, Method::Post | Method::Put) {
        match read_body(&mut request, state.max_upload_bytes) {
            Ok(body) => Some(body),
            Err(e) => {
                let _ = request.respond(Reply::error(413, &format!("{e:#}")).into_response());
                return;
            }
        }
    } else {
        None
    };

    let reply = dispatch(state, &method, &url, body.as_deref()).unwrap_or_else(|e| {
        log::warn!("{method} {url} failed: {e:#}");
        Reply::error(500, &format!("{e:#}"))
    });
    let status = reply.status;
    let _ = request.respond(reply.into_response());

    log::info!("{method} {url} {status}");
}

/// Read a request body, refusing anything larger than `limit` bytes.
fn read_body(request: &mut Request, limit: usize) -> Result<Vec<u8>> {
    if let Some(len) = request.body_length()
        && len > limit
    {
        anyhow::bail!("request body of {len} bytes exceeds the {limit} byte limit");
    }

    let mut buf = Vec::new();
    request
        .as_reader()
        .take(limit as u64 + 1)
        .read_to_end(&mut buf)
        .context("failed to read request body")?;
    if buf.len() > limit {
        anyhow::bail!("request body exceeds the {limit} byte limit");
    }
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Dispatch an incoming request to the appropriate handler.
pub(crate) fn dispatch(
    state: &mut WebState,
    method: &Method,
    url: &str,
    body: Option<&[u8]>,
) -> Result<Reply> {
    // Strip query string for path matching
    let path = url.split('?').next().unwrap_or(url);
    let body = body.unwrap_or_default();

    match (method, path) {
        // Frontend
        (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(serve_frontend()),

        // API: Session
        (&Method::Get, "/api/session") => api::get_session(state),
        (&Method::Post, "/api/session/upload") => api::post_upload(state, url, body),
        (&Method::Post, "/api/session/suggest") => api::post_suggest(state),
        (&Method::Post, "/api/session/summarize") => api::post_summarize(state),
        (&Method::Get, "/api/session/charts") => api::get_charts(state),
        (&Method::Post, "/api/session/charts") => api::post_chart(state, body),
        (&Method::Post, "/api/session/reset") => api::post_reset(state),

        // API: Health
        (&Method::Get, "/api/health") => api::get_health(state),

        // 404
        _ => Ok(Reply::error(404, "not found")),
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend() -> Reply {
    Reply {
        status: 200,
        content_type: HTML,
        body: frontend::INDEX_HTML.as_bytes().to_vec(),
    }
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}
