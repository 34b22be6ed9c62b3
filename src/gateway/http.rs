/// HTTP client for the insights backend.
///
/// Uses the synchronous `ureq` client. One [`HttpBackend`] is built from the
/// resolved [`BackendConfig`] and reused for the lifetime of a dashboard.
/// Requests are never retried; a failed call is re-issued by the user.
use std::io::Read;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::wire::{self, SuggestRequest, SummarizeRequest};
use super::{
    Backend, GatewayError, SUGGEST_FALLBACK_MESSAGE, SUMMARY_FALLBACK_MESSAGE,
    UPLOAD_FALLBACK_MESSAGE, UploadFile, UploadPayload,
};
use crate::config::schema::BackendConfig;
use crate::model::{ChartDescriptor, KpiSnapshot, Row};

const UPLOAD_PATH: &str = "/api/upload";
const SUGGEST_PATH: &str = "/api/suggest";
const SUMMARIZE_PATH: &str = "/api/summarize";
const HEALTH_PATH: &str = "/health";

/// Upper bound on response bodies read into memory.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

/// Synchronous backend client.
#[derive(Debug)]
pub struct HttpBackend {
    base_url: String,
    timeout: Duration,
    require_kpis: bool,
    sample_rows: usize,
    agent: ureq::Agent,
}

impl HttpBackend {
    /// Build a client from the resolved config.
    pub fn from_config(config: &BackendConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            require_kpis: config.require_kpis,
            sample_rows: config.sample_rows,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        // "localhost" may resolve to ::1 first while the backend binds IPv4 only.
        format!("{}{}", self.base_url, path).replace("://localhost", "://127.0.0.1")
    }

    fn post_json<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        fallback: &str,
    ) -> Result<String, GatewayError> {
        let url = self.endpoint(path);
        log::debug!("POST {url}");
        let result = self.agent.post(&url).send_json(body);
        read_response(result, fallback)
    }
}

impl Backend for HttpBackend {
    fn upload(&self, file: &UploadFile) -> Result<UploadPayload, GatewayError> {
        let boundary = format!(
            "insights-{:x}",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let body = encode_multipart(&boundary, "file", file.name(), file.bytes());

        let url = self.endpoint(UPLOAD_PATH);
        log::debug!("POST {url} ({} bytes)", file.bytes().len());
        let result = self
            .agent
            .post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body);

        let text = read_response(result, UPLOAD_FALLBACK_MESSAGE)?;
        wire::parse_upload(&text, self.require_kpis)
    }

    fn suggest(
        &self,
        columns: &[String],
        sample: &[Row],
    ) -> Result<Vec<ChartDescriptor>, GatewayError> {
        let sample = &sample[..sample.len().min(self.sample_rows)];
        let request = SuggestRequest {
            columns,
            sample_data: sample,
        };
        let text = self.post_json(SUGGEST_PATH, &request, SUGGEST_FALLBACK_MESSAGE)?;
        wire::parse_suggestions(&text)
    }

    fn summarize(&self, data_summary: &str, kpis: &KpiSnapshot) -> Result<String, GatewayError> {
        let request = SummarizeRequest { data_summary, kpis };
        let text = self.post_json(SUMMARIZE_PATH, &request, SUMMARY_FALLBACK_MESSAGE)?;
        wire::parse_summary(&text)
    }

    fn location(&self) -> &str {
        &self.base_url
    }

    /// Probe `GET /health` with a short timeout so callers do not stall.
    fn is_healthy(&self) -> bool {
        self.agent
            .get(&self.endpoint(HEALTH_PATH))
            .timeout(Duration::from_secs(5))
            .call()
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

/// Turn a ureq result into the response body or a [`GatewayError`].
///
/// Error statuses carrying a JSON `error` field become
/// [`GatewayError::RemoteError`]; anything else at the HTTP or network level
/// becomes [`GatewayError::TransportFailure`].
fn read_response(
    result: Result<ureq::Response, ureq::Error>,
    fallback: &str,
) -> Result<String, GatewayError> {
    match result {
        Ok(resp) => read_body(resp).map_err(|e| {
            GatewayError::TransportFailure(format!("failed to read response: {e}"))
        }),
        Err(ureq::Error::Status(code, resp)) => {
            let body = read_body(resp).unwrap_or_default();
            log::warn!("backend responded with status {code}");
            Err(match wire::error_message(&body) {
                Some(msg) => GatewayError::RemoteError(msg),
                None => GatewayError::TransportFailure(format!("{fallback} (HTTP {code})")),
            })
        }
        Err(ureq::Error::Transport(t)) => {
            log::warn!("backend transport error: {t}");
            let msg = t.to_string();
            Err(GatewayError::TransportFailure(if msg.trim().is_empty() {
                fallback.to_string()
            } else {
                msg
            }))
        }
    }
}

fn read_body(resp: ureq::Response) -> std::io::Result<String> {
    let mut text = String::new();
    resp.into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_string(&mut text)?;
    Ok(text)
}

/// Encode a single-file `multipart/form-data` body.
pub(crate) fn encode_multipart(boundary: &str, field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
    let file_name = file_name.replace(['"', '\r', '\n'], "_");
    let mut body = Vec::with_capacity(bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: text/csv\r\n\r\n");
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
