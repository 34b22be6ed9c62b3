//! Session state: everything known about the currently uploaded dataset.

use serde::Serialize;

use crate::gateway::UploadPayload;
use crate::model::{ChartDescriptor, ColumnSet, KpiSnapshot, Row};

/// Rows included in a locally built dataset description.
const DESCRIBE_SAMPLE_ROWS: usize = 3;

/// All dashboard data for one upload.
///
/// Created empty, replaced wholesale by each successful upload and cleared
/// by reset. Only [`super::Dashboard`] hands out mutable access.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub rows: Vec<Row>,
    pub columns: ColumnSet,
    pub kpis: Option<KpiSnapshot>,
    pub summary: Option<String>,
    pub data_summary: Option<String>,
    pub suggested: Vec<ChartDescriptor>,
    pub active: Vec<ChartDescriptor>,
}

impl Session {
    /// Build a fresh session from an upload, with the KPIs to show.
    pub fn from_upload(payload: UploadPayload, kpis: KpiSnapshot) -> Self {
        Self {
            rows: payload.rows,
            columns: payload.columns,
            kpis: Some(kpis),
            summary: payload.summary,
            data_summary: payload.data_summary,
            suggested: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn has_data(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|d| d.id == id)
    }

    pub fn suggestion(&self, id: &str) -> Option<&ChartDescriptor> {
        self.suggested.iter().find(|d| d.id == id)
    }

    /// Dataset description sent to `/api/summarize`.
    ///
    /// Uses the backend's own description when the upload carried one.
    pub fn describe(&self) -> String {
        if let Some(text) = &self.data_summary {
            return text.clone();
        }

        let sample = &self.rows[..self.rows.len().min(DESCRIBE_SAMPLE_ROWS)];
        let sample_json = serde_json::to_string(sample).unwrap_or_else(|_| "[]".to_string());
        format!(
            "Dataset Overview:\n- Total records: {}\n- Columns: {}\n- Sample data: {}",
            self.rows.len(),
            self.columns.join(", "),
            sample_json
        )
    }
}
