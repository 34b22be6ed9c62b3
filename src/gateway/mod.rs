//! Gateways to the remote insights backend.
//!
//! The backend parses the CSV, computes KPIs and produces the AI narrative
//! and chart suggestions. This module wraps its three endpoints behind the
//! [`Backend`] trait so the dashboard can be driven by the real HTTP client
//! ([`http::HttpBackend`]) or by an in-memory stand-in in tests.
//!
//! Every failure is reported as a [`GatewayError`]; callers only ever show
//! its message.

pub mod http;
pub mod wire;

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::model::{BarPolicy, ChartDescriptor, ChartKind, ColumnSet, KpiSnapshot, Row};

pub use http::HttpBackend;

/// Shown when a failed upload carries no message of its own.
pub const UPLOAD_FALLBACK_MESSAGE: &str = "An unknown upload error occurred.";

/// Shown when a failed suggestion request carries no message of its own.
pub const SUGGEST_FALLBACK_MESSAGE: &str = "Could not get AI suggestions.";

/// Shown when a failed summary request carries no message of its own.
pub const SUMMARY_FALLBACK_MESSAGE: &str = "Could not generate a summary.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure taxonomy for all backend calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The file was rejected locally, before any I/O.
    #[error("Invalid file type. Please upload a CSV file.")]
    InvalidInput { file_name: String },
    /// Network or HTTP-level failure.
    #[error("{0}")]
    TransportFailure(String),
    /// The response parsed but lacks a required section.
    #[error("{0}")]
    IncompleteResponse(String),
    /// The backend explicitly reported a failure.
    #[error("{0}")]
    RemoteError(String),
}

// ---------------------------------------------------------------------------
// Upload types
// ---------------------------------------------------------------------------

/// A CSV file accepted for upload.
///
/// Construction enforces the `.csv` extension, so a value of this type can
/// always be sent.
#[derive(Debug, Clone)]
pub struct UploadFile {
    name: String,
    bytes: Vec<u8>,
}

impl UploadFile {
    /// Wrap in-memory file contents, rejecting non-CSV names.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, GatewayError> {
        let name = name.into();
        check_extension(&name)?;
        Ok(Self { name, bytes })
    }

    /// Read a file from disk. The extension is checked before the read.
    pub fn from_path(path: &Path) -> Result<Self, GatewayError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        check_extension(&name)?;

        let bytes = fs::read(path).map_err(|e| {
            GatewayError::TransportFailure(format!("failed to read {}: {e}", path.display()))
        })?;
        Ok(Self { name, bytes })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Reject any file name whose extension is not `.csv` (case-insensitive).
pub fn check_extension(file_name: &str) -> Result<(), GatewayError> {
    let ok = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if ok {
        Ok(())
    } else {
        Err(GatewayError::InvalidInput {
            file_name: file_name.to_string(),
        })
    }
}

/// Everything the upload endpoint returns.
#[derive(Debug, Clone, Default)]
pub struct UploadPayload {
    pub rows: Vec<Row>,
    pub columns: ColumnSet,
    /// `None` only when the gateway was configured not to require KPIs.
    pub kpis: Option<KpiSnapshot>,
    pub summary: Option<String>,
    /// Dataset description the backend expects back on `/api/summarize`.
    pub data_summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// The remote collaborator the dashboard talks to.
pub trait Backend {
    /// `POST /api/upload`: send the file, receive rows, columns, KPIs.
    fn upload(&self, file: &UploadFile) -> Result<UploadPayload, GatewayError>;

    /// `POST /api/suggest`: ask for chart descriptors for these columns.
    fn suggest(&self, columns: &[String], sample: &[Row])
    -> Result<Vec<ChartDescriptor>, GatewayError>;

    /// `POST /api/summarize`: ask for a narrative summary.
    fn summarize(&self, data_summary: &str, kpis: &KpiSnapshot) -> Result<String, GatewayError>;

    /// Where requests go, for diagnostics.
    fn location(&self) -> &str {
        "in-process"
    }

    /// Whether the backend answers at all.
    fn is_healthy(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Fallback suggestions
// ---------------------------------------------------------------------------

/// Static suggestions offered when the suggestion call fails.
pub fn fallback_suggestions() -> Vec<ChartDescriptor> {
    vec![
        ChartDescriptor::new(
            "source-breakdown",
            "Member Acquisition Sources",
            ChartKind::Pie,
            "source_platform",
        )
        .with_description("Shows distribution of where your members are coming from"),
        ChartDescriptor::new(
            "growth-trend",
            "Monthly Growth Trend",
            ChartKind::Bar,
            "join_date",
        )
        .with_bar_policy(BarPolicy::MonthlyCounts)
        .with_description("Visualizes member join patterns over time"),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
