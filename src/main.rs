use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use insights::cli::{self, AnalyzeOptions, OutputFormat};
use insights::config;

#[derive(Debug, Parser)]
#[command(name = "insights")]
#[command(about = "Community insights: KPIs, AI summaries and charts for member data")]
#[command(version)]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Upload a CSV to the backend and print KPIs, summary and charts
    Analyze {
        /// Member export to analyze (must end in .csv)
        file: PathBuf,
        /// Ask the backend for chart suggestions
        #[arg(long)]
        suggest: bool,
        /// Add a suggested chart by id (repeatable; `all` adds every suggestion)
        #[arg(long = "chart", value_name = "ID")]
        charts: Vec<String>,
        /// Do not request a narrative summary
        #[arg(long)]
        no_summary: bool,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Compute KPIs locally from a JSON array of rows
    Kpis {
        /// JSON file holding an array of row objects
        file: PathBuf,
        /// Window in days for active/new members (default: dashboard.active_window_days)
        #[arg(long)]
        window: Option<u32>,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Start the local web dashboard
    Web {
        /// Listen address (default: web.addr)
        #[arg(long)]
        addr: Option<String>,
        /// Do not open a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Show recent session events
    Events {
        /// Number of events to show
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Check backend reachability and local configuration
    Health,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write the default config to ~/.insights/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a dotted key, e.g. `backend.base_url http://host:5001`
    Set { key: String, value: String },
    /// Reset the global config to defaults
    Reset,
}

fn main() -> Result<()> {
    let app = App::parse();

    let (cfg, problems) = config::load_reporting();
    env_logger::Builder::from_env(
        env_logger::Env::new().filter_or("INSIGHTS_LOG", cfg.logging.level.as_str()),
    )
    .format_timestamp(None)
    .init();
    for problem in &problems {
        log::warn!("{problem}");
    }

    match app.command {
        Commands::Analyze {
            file,
            suggest,
            charts,
            no_summary,
            format,
        } => {
            let options = AnalyzeOptions {
                suggest,
                charts,
                no_summary,
            };
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_analyze(&file, &options, fmt)
        }
        Commands::Kpis {
            file,
            window,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_kpis(&file, window, fmt)
        }
        Commands::Web { addr, no_browser } => cli::run_web(addr, no_browser),
        Commands::Events { limit, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_events(limit, fmt)
        }
        Commands::Health => cli::run_health(),
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
    }
}
