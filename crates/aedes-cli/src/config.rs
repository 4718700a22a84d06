use clap::{Parser, Subcommand};
use std::sync::LazyLock;

use aedes_client::DEFAULT_MUNICIPALITIES_URL;
use aedes_core::{DEFAULT_API_URL, DEFAULT_REPORT_LIMIT};

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "aedes")]
#[command(
    author,
    version = version_info(),
    about = "Synchronizes InfoDengue weekly epidemiological reports into PostgreSQL"
)]
#[command(after_help = "Examples:
  aedes sync
  aedes sync --week-start 1 --year-start 2025 --week-end 10 --year-end 2025
  aedes backfill --from-week 1 --from-year 2023
  aedes schedule --interval-minutes 60
  aedes seed
  aedes reports --state-code 26 --se-start 202501
  aedes states --se 202544
  aedes health

Logging:
  RUST_LOG=aedes_core=debug aedes sync")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Base URL of the InfoDengue alertcity endpoint
    #[arg(long, env = "INFODENGUE_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Disease to request (dengue, chikungunya, zika)
    #[arg(long, env = "INFODENGUE_DISEASE", default_value = "dengue")]
    pub disease: String,

    /// Maximum number of in-flight API requests
    #[arg(long, env = "SYNC_CONCURRENCY", default_value_t = 100)]
    pub concurrency: usize,

    /// Maximum number of rows per upsert statement
    #[arg(long, env = "SYNC_BATCH_SIZE", default_value_t = 1000)]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    /// Database connection pool size
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one sync for every territory
    #[command(after_help = "Examples:
  aedes sync                        # Trailing 8-week window ending this week
  aedes sync --week-start 1 --year-start 2025 --week-end 10 --year-end 2025

The four window options only apply together; a partial window is ignored.")]
    Sync {
        #[arg(long)]
        week_start: Option<u32>,
        #[arg(long)]
        year_start: Option<i32>,
        #[arg(long)]
        week_end: Option<u32>,
        #[arg(long)]
        year_end: Option<i32>,
    },
    /// Load historical weeks up to the current week
    #[command(after_help = "Examples:
  aedes backfill                                  # From week 1 of 2023 to this week
  aedes backfill --from-week 30 --from-year 2024
  aedes backfill --from-year 2023 --to-week 52 --to-year 2024")]
    Backfill {
        #[arg(long, default_value_t = 1)]
        from_week: u32,
        #[arg(long, default_value_t = 2023)]
        from_year: i32,
        /// Last week to load (defaults to the current ISO week)
        #[arg(long, requires = "to_year")]
        to_week: Option<u32>,
        #[arg(long, requires = "to_week")]
        to_year: Option<i32>,
    },
    /// Run a sync immediately, then on a fixed interval until Ctrl-C
    Schedule {
        #[arg(long, env = "SYNC_INTERVAL_MINUTES", default_value_t = 60)]
        interval_minutes: u64,
        /// Wait one interval before the first run
        #[arg(long)]
        delay_first_run: bool,
    },
    /// Load the IBGE municipality list into the territories table
    Seed {
        /// CSV with `codigo_ibge`, `nome` and `codigo_uf` columns
        #[arg(long, env = "MUNICIPALITIES_CSV_URL", default_value = DEFAULT_MUNICIPALITIES_URL)]
        source_url: String,
    },
    /// List stored weekly reports, newest week first
    #[command(after_help = "Examples:
  aedes reports --geocode 2611606
  aedes reports --state-code 26 --se 202544
  aedes reports --se-start 202501 --se-end 202510 --limit 50 --offset 50")]
    Reports {
        #[arg(long)]
        geocode: Option<String>,
        #[arg(long)]
        state_code: Option<i32>,
        /// Exact week (YYYYWW)
        #[arg(long)]
        se: Option<i32>,
        #[arg(long)]
        se_start: Option<i32>,
        #[arg(long)]
        se_end: Option<i32>,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = DEFAULT_REPORT_LIMIT)]
        limit: i64,
    },
    /// Show per-state totals for one week
    States {
        /// Week (YYYYWW)
        #[arg(long)]
        se: i32,
    },
    /// Check database connectivity and show table counts
    Health,
}
