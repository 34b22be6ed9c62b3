/// Configuration schema and defaults for the insights dashboard.
///
/// Defines the TOML-serializable configuration structure with the sections
/// `[backend]`, `[dashboard]`, `[web]` and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override.
use serde::{Deserialize, Serialize};

use crate::charts::{AggregateOptions, TimeBucket};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level insights configuration.
///
/// Maps directly to `~/.insights/config.toml` and `.insights.toml`. All
/// sections and fields are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub backend: BackendConfig,
    pub dashboard: DashboardConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [backend]
// ---------------------------------------------------------------------------

/// Connection settings for the remote insights backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; endpoint paths (`/api/upload`, ...) are appended to it.
    pub base_url: String,
    /// Per-request timeout in milliseconds. LLM-backed endpoints are slow.
    pub timeout_ms: u64,
    /// Treat an upload response without KPIs as a failure. When `false`,
    /// KPIs are computed locally from the returned rows.
    pub require_kpis: bool,
    /// Number of sample rows sent along with `/api/suggest` (0 = none).
    pub sample_rows: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            timeout_ms: 60_000,
            require_kpis: true,
            sample_rows: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Dashboard behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// On a failed suggestion call, offer the built-in chart list (with a
    /// notice) instead of only showing the error.
    pub fallback_suggestions: bool,
    /// Request a narrative summary after upload when the backend did not
    /// include one.
    pub auto_summarize: bool,
    /// Bars kept by the top-values bar policy.
    pub top_n: usize,
    /// Bucket size of the line/area growth series: `day` or `month`.
    pub line_bucket: TimeBucket,
    /// Look-back window for "active" and "new" members.
    pub active_window_days: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            fallback_suggestions: true,
            auto_summarize: true,
            top_n: crate::charts::DEFAULT_TOP_N,
            line_bucket: TimeBucket::Day,
            active_window_days: crate::kpi::DEFAULT_WINDOW_DAYS,
        }
    }
}

impl DashboardConfig {
    /// Aggregation options derived from this section.
    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            top_n: self.top_n,
            line_bucket: self.line_bucket,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Local dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address for `insights web`.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
    /// Largest accepted upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
            open_browser: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Diagnostics and event log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default `env_logger` filter when `INSIGHTS_LOG` is unset.
    pub level: String,
    /// Append session events to `~/.insights/events.jsonl`.
    pub events: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            events: true,
        }
    }
}

impl InsightsConfig {
    /// Annotated default config written by `insights config init`.
    pub fn default_toml() -> String {
        r#"# insights configuration
# Values shown are the built-in defaults.

[backend]
# Base URL of the insights backend
base_url = "http://localhost:5001"
# Request timeout (milliseconds)
timeout_ms = 60000
# Fail uploads whose response has no KPI section
require_kpis = true
# Sample rows sent with chart suggestion requests (0 = none)
sample_rows = 2

[dashboard]
# Offer built-in charts when suggestions fail
fallback_suggestions = true
# Ask the backend for a summary when the upload has none
auto_summarize = true
# Bars kept by the top-values bar chart
top_n = 10
# Growth chart bucket: "day" or "month"
line_bucket = "day"
# Window (days) for active and new members
active_window_days = 30

[web]
addr = "127.0.0.1:9747"
open_browser = true
max_upload_bytes = 20971520

[logging]
# env_logger filter when INSIGHTS_LOG is unset
level = "warn"
# Append session events to ~/.insights/events.jsonl
events = true
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_parses_to_defaults() {
        let parsed: InsightsConfig = toml::from_str(&InsightsConfig::default_toml()).unwrap();
        let defaults = InsightsConfig::default();
        assert_eq!(parsed.backend.base_url, defaults.backend.base_url);
        assert_eq!(parsed.backend.timeout_ms, defaults.backend.timeout_ms);
        assert_eq!(parsed.dashboard.top_n, defaults.dashboard.top_n);
        assert_eq!(parsed.dashboard.line_bucket, TimeBucket::Day);
        assert_eq!(parsed.web.max_upload_bytes, defaults.web.max_upload_bytes);
        assert_eq!(parsed.logging.level, "warn");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: InsightsConfig = toml::from_str(
            r#"
[dashboard]
line_bucket = "month"
"#,
        )
        .unwrap();
        assert_eq!(parsed.dashboard.line_bucket, TimeBucket::Month);
        assert!(parsed.dashboard.fallback_suggestions);
        assert!(parsed.backend.require_kpis);
    }

    #[test]
    fn aggregate_options_follow_dashboard_section() {
        let mut cfg = DashboardConfig::default();
        cfg.top_n = 5;
        let opts = cfg.aggregate_options();
        assert_eq!(opts.top_n, 5);
        assert_eq!(opts.line_bucket, TimeBucket::Day);
    }
}
