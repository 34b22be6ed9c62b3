/// Configuration system for insights.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: [`schema::InsightsConfig::default()`]
/// 2. **User global config**: `~/.insights/config.toml`
/// 3. **Project local config**: `.insights.toml` in the current directory
/// 4. **Environment variables**: `INSIGHTS_*` overrides (highest precedence)
///
/// The resolved config is passed explicitly to the gateways and the
/// dashboard; nothing below `main`/`cli` reads the environment.
pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::InsightsConfig;

use crate::charts::TimeBucket;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env.
/// Problems with the files are logged as warnings.
pub fn load() -> InsightsConfig {
    let (config, problems) = load_reporting();
    for problem in &problems {
        log::warn!("{problem}");
    }
    config
}

/// Like [`load`], but returns the problems found in the config files instead
/// of logging them. `main` uses this because the log level itself comes
/// from the config.
pub fn load_reporting() -> (InsightsConfig, Vec<String>) {
    let layers = [global_config_path(), project_config_path()]
        .into_iter()
        .flatten()
        .filter_map(|path| {
            let content = fs::read_to_string(&path).ok()?;
            Some((path, content))
        });

    let (mut config, problems) = resolve_layers(layers);
    apply_env_overrides(&mut config);
    (config, problems)
}

/// Merge TOML sources, lowest precedence first, into one config.
///
/// A malformed file is skipped; invalid values discard all file layers in
/// favour of the defaults so a typo never stops the dashboard from starting.
fn resolve_layers(
    layers: impl IntoIterator<Item = (PathBuf, String)>,
) -> (InsightsConfig, Vec<String>) {
    let mut problems = Vec::new();
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for (path, content) in layers {
        match toml::from_str::<toml::Value>(&content) {
            Ok(layer) => merge_toml(&mut merged, layer),
            Err(e) => problems.push(format!("ignoring malformed config {}: {e}", path.display())),
        }
    }

    let config = match merged.try_into::<InsightsConfig>() {
        Ok(cfg) => cfg,
        Err(e) => {
            problems.push(format!("ignoring config files with invalid values: {e}"));
            InsightsConfig::default()
        }
    };

    (config, problems)
}

/// Merge `overlay` into `base`, table by table. Keys set in the overlay win;
/// keys it leaves out keep the base value.
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Directory holding global config and the event log: `~/.insights/`.
pub fn insights_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".insights"))
}

fn global_config_path() -> Option<PathBuf> {
    insights_home().map(|dir| dir.join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".insights.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `INSIGHTS_BACKEND_URL`: backend base URL
/// - `INSIGHTS_TIMEOUT_MS`: request timeout
/// - `INSIGHTS_REQUIRE_KPIS`: fail uploads without KPIs (`1`/`true`/...)
/// - `INSIGHTS_FALLBACK_SUGGESTIONS`: offer built-in charts on failure
/// - `INSIGHTS_LINE_BUCKET`: `day` or `month`
/// - `INSIGHTS_WEB_ADDR`: dashboard listen address
/// - `INSIGHTS_EVENTS`: session event log on/off
fn apply_env_overrides(config: &mut InsightsConfig) {
    if let Ok(val) = std::env::var("INSIGHTS_BACKEND_URL")
        && !val.is_empty()
    {
        config.backend.base_url = val;
    }
    if let Ok(val) = std::env::var("INSIGHTS_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.backend.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("INSIGHTS_REQUIRE_KPIS") {
        config.backend.require_kpis = is_truthy(&val);
    }

    if let Ok(val) = std::env::var("INSIGHTS_FALLBACK_SUGGESTIONS") {
        config.dashboard.fallback_suggestions = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("INSIGHTS_LINE_BUCKET")
        && let Some(bucket) = parse_bucket(&val)
    {
        config.dashboard.line_bucket = bucket;
    }

    if let Ok(val) = std::env::var("INSIGHTS_WEB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }

    if let Ok(val) = std::env::var("INSIGHTS_EVENTS") {
        config.logging.events = is_truthy(&val);
    }
}

/// Check if a string value represents a truthy boolean.
fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_bucket(val: &str) -> Option<TimeBucket> {
    match val.to_ascii_lowercase().as_str() {
        "day" | "daily" => Some(TimeBucket::Day),
        "month" | "monthly" => Some(TimeBucket::Month),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.insights/config.toml`.
///
/// Returns an error if the file already exists unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.insights/ directory")?;
    }

    fs::write(&path, InsightsConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single dotted key (e.g. `backend.base_url`) in the global config.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let mut root: toml::Value = if path.exists() {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        toml::from_str(&content).context("failed to parse config as TOML value")?
    } else {
        let defaults = toml::to_string_pretty(&InsightsConfig::default())
            .context("failed to serialize default config")?;
        toml::from_str(&defaults).context("failed to parse serialized defaults")?
    };

    set_toml_value(&mut root, key, value)?;

    // Reject values that would make the file unloadable.
    let output = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    toml::from_str::<InsightsConfig>(&output)
        .with_context(|| format!("invalid value '{value}' for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, output).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
///
/// The existing value's type decides how `raw_value` is parsed.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let Some((section_path, leaf)) = key.rsplit_once('.') else {
        anyhow::bail!("config key must be dotted (section.key), got '{key}'");
    };

    let mut current = root;
    for part in section_path.split('.') {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current
        .as_table_mut()
        .with_context(|| format!("expected table at '{section_path}'"))?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(_) => toml::Value::String(raw_value.to_string()),
        None => anyhow::bail!("unknown config key '{key}'"),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
