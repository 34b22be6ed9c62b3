//! Core data types shared by the gateways, the aggregator and the dashboard.

pub mod chart;
pub mod row;

use serde::{Deserialize, Serialize};

pub use chart::{AggregatedSeries, BarPolicy, ChartDescriptor, ChartKind, SeriesPoint};
pub use row::{CellValue, ColumnSet, Row, field, parse_datetime};

/// The four headline metrics shown at the top of the dashboard.
///
/// Produced once per upload, either by the backend or by
/// [`crate::kpi::compute_kpis`]. Serialized with the backend's camelCase keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiSnapshot {
    pub total_members: u64,
    pub active_members: u64,
    pub new_members: u64,
    pub top_acquisition_source: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kpi_snapshot_uses_camel_case() {
        let json = r#"{"totalMembers": 10, "activeMembers": 4, "newMembers": 2, "topAcquisitionSource": "Discord"}"#;
        let kpis: KpiSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(kpis.total_members, 10);
        assert_eq!(kpis.top_acquisition_source, "Discord");

        let back = serde_json::to_string(&kpis).unwrap();
        assert!(back.contains("\"activeMembers\":4"));
    }
}
