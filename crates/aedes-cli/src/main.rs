use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use aedes_client::{InfoDengueClient, MunicipalitySource};
use aedes_core::{
    AppError, DbConfig, HarvestService, HttpConfig, LatestRunReport, PeriodicSync, ReportFilter,
    RunReport, RunStatus, ScheduleConfig, SyncConfig, SyncResult, SyncStatus, SyncWindow,
    TracingReporter, TracingSchedulerReporter, WindowParams,
};
use aedes_db::{TerritoryRepository, WeeklyReportRepository};

mod config;

use config::{Command, Config};

type Service = HarvestService<TerritoryRepository, WeeklyReportRepository, InfoDengueClient>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = Config::parse();

    info!("Connecting to database...");
    let db_config = DbConfig::default().with_max_connections(config.db_max_connections);
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| fatal(AppError::DatabaseError(e)))?;

    let territories = TerritoryRepository::new(pool.clone());
    let reports = WeeklyReportRepository::new(pool);

    let http_config = HttpConfig::default()
        .with_base_url(config.api_url.clone())
        .with_disease(config.disease.clone())
        .with_timeout(Duration::from_secs(config.timeout_secs));
    let sync_config = SyncConfig::default()
        .with_concurrency(config.concurrency)
        .with_batch_size(config.batch_size);

    match config.command {
        Command::Sync {
            week_start,
            year_start,
            week_end,
            year_end,
        } => {
            let params = WindowParams {
                week_start,
                year_start,
                week_end,
                year_end,
            };
            let service = build_service(territories, reports, &http_config, sync_config)?;
            let result = service
                .run_full_sync_with_progress(params, &TracingReporter)
                .await
                .map_err(fatal)?;
            print_sync_summary(&result);
        }
        Command::Backfill {
            from_week,
            from_year,
            to_week,
            to_year,
        } => {
            let end = to_week.zip(to_year);
            let window = backfill_window(from_week, from_year, end, Utc::now().date_naive());
            info!("Backfilling {}", window);
            let service = build_service(territories, reports, &http_config, sync_config)?;
            let result = service
                .sync_window(window, &TracingReporter)
                .await
                .map_err(fatal)?;
            print_sync_summary(&result);
        }
        Command::Schedule {
            interval_minutes,
            delay_first_run,
        } => {
            let schedule = ScheduleConfig::default()
                .with_interval_minutes(interval_minutes)
                .with_run_on_start(!delay_first_run);
            let service = build_service(territories, reports, &http_config, sync_config)?;
            run_schedule(service, schedule).await;
        }
        Command::Seed { source_url } => {
            seed_territories(&territories, &source_url, &http_config).await?;
        }
        Command::Reports {
            geocode,
            state_code,
            se,
            se_start,
            se_end,
            offset,
            limit,
        } => {
            let filter = ReportFilter {
                geocode,
                state_code,
                se,
                se_start,
                se_end,
                ..Default::default()
            }
            .with_page(offset, limit);
            show_reports(&reports, &filter).await?;
        }
        Command::States { se } => {
            show_states(&reports, se).await?;
        }
        Command::Health => {
            show_health(&territories, &reports).await?;
        }
    }

    Ok(())
}

/// Renders a fatal engine error with its user-facing hint.
fn fatal(e: AppError) -> anyhow::Error {
    anyhow::anyhow!(e.user_message())
}

fn build_service(
    territories: TerritoryRepository,
    reports: WeeklyReportRepository,
    http_config: &HttpConfig,
    sync_config: SyncConfig,
) -> anyhow::Result<Service> {
    sync_config.validate().map_err(fatal)?;
    let client = InfoDengueClient::new(http_config).map_err(fatal)?;
    info!("Using InfoDengue endpoint {}", client.base_url());
    Ok(HarvestService::with_config(territories, reports, client, sync_config))
}

/// Window for a backfill: explicit end, or the current ISO week.
fn backfill_window(
    from_week: u32,
    from_year: i32,
    end: Option<(u32, i32)>,
    today: NaiveDate,
) -> SyncWindow {
    match end {
        Some((week_end, year_end)) => SyncWindow {
            week_start: from_week,
            year_start: from_year,
            week_end,
            year_end,
        },
        None => SyncWindow::since(from_week, from_year, today),
    }
}

async fn run_schedule(service: Service, schedule: ScheduleConfig) {
    let cancel_token = CancellationToken::new();
    let shutdown = cancel_token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested, stopping after the current run..."),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        shutdown.cancel();
    });

    let latest = LatestRunReport::new();
    let periodic = PeriodicSync::new(service, schedule);
    let runs = periodic
        .run(
            cancel_token,
            &TracingSchedulerReporter,
            &TracingReporter,
            &latest,
        )
        .await;

    info!("Scheduler stopped after {} run(s)", runs);
    if let Some(report) = latest.get() {
        print_run_report(&report);
    }
}

/// Print a summary of one sync run.
fn print_sync_summary(result: &SyncResult) {
    let stats = &result.stats;

    info!("");
    info!("═══════════════════════════════════════════════════════");
    info!("Sync complete: {}", result.window);
    info!("═══════════════════════════════════════════════════════");
    if result.status == SyncStatus::NoTerritories {
        warn!("No territories found. Run `aedes seed` first.");
        return;
    }
    info!("  + Inserted:          {}", stats.inserted);
    info!("  ↑ Updated:           {}", stats.updated);
    info!("  ✓ Territories ok:    {}", stats.geocodes_synced);
    info!("  ✗ Territories failed:{:>4}", stats.geocodes_failed);
    info!("───────────────────────────────────────────────────────");
    info!("  Batches written:     {}", result.batches_written);
    info!("  Batches failed:      {}", result.batches_failed);
    info!("  Records skipped:     {}", result.records_skipped);
    info!("  Records malformed:   {}", result.records_malformed);
    info!("═══════════════════════════════════════════════════════");

    if !result.failed_geocodes.is_empty() {
        error!(
            "Failed territories: {}",
            join_geocodes(&result.failed_geocodes)
        );
    }
    if result.rows_lost > 0 {
        error!(
            "{} rows lost in failed batches, affecting: {}",
            result.rows_lost,
            join_geocodes(&result.unpersisted_geocodes)
        );
    }
    if result.is_clean() {
        info!("All territories synchronized successfully!");
    }
}

fn print_run_report(report: &RunReport) {
    info!(
        "Last run {} at {} ({}s)",
        report.status.as_str(),
        report.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.duration().num_seconds()
    );
    match (&report.status, &report.result, &report.error) {
        (RunStatus::Success, Some(result), _) => print_sync_summary(result),
        (RunStatus::Failed, _, Some(err)) => error!("  {}", err),
        _ => {}
    }
}

fn join_geocodes<'a>(geocodes: impl IntoIterator<Item = &'a String>) -> String {
    geocodes
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

async fn seed_territories(
    territories: &TerritoryRepository,
    source_url: &str,
    http_config: &HttpConfig,
) -> anyhow::Result<()> {
    let source = MunicipalitySource::new(source_url, http_config).map_err(fatal)?;
    info!("Downloading municipality list from {}", source.url());
    let municipalities = source.fetch().await.map_err(fatal)?;
    info!("Parsed {} municipalities", municipalities.len());

    let inserted = territories
        .insert_many(&municipalities)
        .await
        .map_err(fatal)?;
    let existing = (municipalities.len() as u64).saturating_sub(inserted);

    println!("\nSeeding complete\n");
    println!("  Inserted:              {}", inserted);
    println!("  Already present:       {}", existing);
    println!("  Territories total:     {}", territories.count().await?);
    println!();

    Ok(())
}

async fn show_reports(
    reports: &WeeklyReportRepository,
    filter: &ReportFilter,
) -> anyhow::Result<()> {
    let rows = reports.list(filter).await.map_err(fatal)?;
    if rows.is_empty() {
        println!("\nNo reports match the given filters.\n");
        return Ok(());
    }

    println!(
        "\n{:<8} {:<8} {:<11} {:>8} {:>10} {:>5} {:>6}",
        "geocode", "se", "start", "cases", "estimated", "alert", "rt"
    );
    for r in &rows {
        println!(
            "{:<8} {:<8} {:<11} {:>8} {:>10} {:>5} {:>6}",
            r.geocode,
            r.se,
            r.period_start_date,
            display_opt(r.reported_cases),
            display_opt(r.estimated_cases.map(|v| format!("{:.1}", v))),
            display_opt(r.alert_level),
            display_opt(r.reproduction_number.map(|v| format!("{:.2}", v))),
        );
    }
    println!(
        "\n{} report(s) shown (offset {}, limit {})\n",
        rows.len(),
        filter.offset,
        filter.limit
    );

    Ok(())
}

async fn show_states(reports: &WeeklyReportRepository, se: i32) -> anyhow::Result<()> {
    let states = reports.aggregate_by_state(se).await.map_err(fatal)?;
    if states.is_empty() {
        println!("\nNo reports stored for week {}.\n", se);
        return Ok(());
    }

    println!("\nWeek {}\n", se);
    println!(
        "{:<6} {:>10} {:>10} {:>14} {:>8}",
        "state", "cases", "avg alert", "population", "reports"
    );
    for s in &states {
        println!(
            "{:<6} {:>10} {:>10.2} {:>14.0} {:>8}",
            s.state_code, s.total_cases, s.avg_alert_level, s.total_population, s.report_count
        );
    }
    println!();

    Ok(())
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

async fn show_health(
    territories: &TerritoryRepository,
    reports: &WeeklyReportRepository,
) -> anyhow::Result<()> {
    reports.health_check().await.map_err(fatal)?;

    let territory_count = territories.count().await.map_err(fatal)?;
    let report_count = reports.count().await.map_err(fatal)?;

    println!("\nDatabase OK\n");
    println!("  Territories:           {}", territory_count);
    println!("  Weekly reports:        {}", report_count);
    println!();

    Ok(())
}
