use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::{AppConfig, DatabaseConfig};
use crate::import::StatusPolicy;
use crate::listing::ListingQuery;
use crate::models::{Building, Report};
use crate::report::ReportScope;

mod config;
mod db;
mod error;
mod import;
mod listing;
mod models;
mod report;
mod score;
mod telemetry;

#[derive(Parser)]
#[command(name = "livability-score")]
#[command(about = "Time-weighted utility reliability scores for buildings", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample buildings and reports
    Seed,
    /// Import reports from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score and rank buildings
    Score {
        #[command(flatten)]
        source: SourceArgs,
        /// Case-insensitive building name filter
        #[arg(long)]
        query: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("scope")
        .args(["building", "neighbourhood"])
        .multiple(false)
))]
struct SourceArgs {
    #[arg(long)]
    building: Option<String>,
    #[arg(long)]
    neighbourhood: Option<String>,
    /// Score reports from a CSV file instead of Postgres
    #[arg(long)]
    csv: Option<PathBuf>,
    /// How far back to load report history
    #[arg(long, default_value_t = 90, value_parser = clap::value_parser!(i64).range(1..=36500))]
    history_days: i64,
    /// Reject unrecognised statuses instead of scoring them as outages
    #[arg(long)]
    strict: bool,
}

impl SourceArgs {
    fn scope(&self) -> ListingQuery {
        ListingQuery {
            building: self.building.clone(),
            neighbourhood: self.neighbourhood.clone(),
            query: None,
        }
    }

    fn report_scope(&self) -> ReportScope<'_> {
        match (self.building.as_deref(), self.neighbourhood.as_deref()) {
            (Some(id), _) => ReportScope::Building(id),
            (None, Some(area)) => ReportScope::Neighbourhood(area),
            (None, None) => ReportScope::All,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let now = Utc::now();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config.database).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config.database).await?;
            db::init_db(&pool).await?;
            let inserted = db::seed(&pool, now).await?;
            println!("Seed data inserted ({inserted} new reports).");
        }
        Commands::Import { csv } => {
            let batch = import::read_reports(&csv, StatusPolicy::Strict)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let pool = connect(&config.database).await?;
            let inserted = db::import_batch(&pool, &batch).await?;
            println!("Inserted {inserted} reports from {}.", csv.display());
        }
        Commands::Score {
            source,
            query,
            page,
            limit,
            format,
        } => {
            let (buildings, reports) = load_source(&source, &config.database, now).await?;
            let scope = ListingQuery {
                query,
                ..source.scope()
            };
            let mut listings = scope.apply(listing::score_buildings(&buildings, &reports, now));
            listing::rank(&mut listings);
            let page = listing::paginate(listings, page, limit);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&page)?);
                }
                OutputFormat::Text => {
                    if page.pagination.total == 0 {
                        println!("No buildings found for this scope.");
                        return Ok(());
                    }

                    println!(
                        "Buildings by livability score (page {} of {}, {} total):",
                        page.pagination.page, page.pagination.total_pages, page.pagination.total
                    );
                    for entry in &page.buildings {
                        println!("- {}", report::describe_listing(entry));
                    }
                }
            }
        }
        Commands::Report { source, out } => {
            let (buildings, reports) = load_source(&source, &config.database, now).await?;
            let mut listings = source
                .scope()
                .apply(listing::score_buildings(&buildings, &reports, now));
            listing::rank(&mut listings);
            let in_scope: Vec<Report> = reports
                .into_iter()
                .filter(|report| {
                    listings
                        .iter()
                        .any(|entry| entry.building.id == report.building_id)
                })
                .collect();
            let output = report::build_report(
                source.report_scope(),
                now,
                source.history_days,
                &listings,
                &in_scope,
            );
            std::fs::write(&out, output)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(config: &DatabaseConfig) -> anyhow::Result<PgPool> {
    let url = config.require_url()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_source(
    source: &SourceArgs,
    database: &DatabaseConfig,
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<Building>, Vec<Report>)> {
    let since = score::history_cutoff(now, source.history_days);

    if let Some(path) = source.csv.as_deref() {
        return load_csv(path, source.strict, since);
    }

    let pool = connect(database).await?;
    let building = source.building.as_deref();
    let neighbourhood = source.neighbourhood.as_deref();
    let buildings = db::fetch_buildings(&pool, building, neighbourhood).await?;
    let reports = db::fetch_reports(&pool, since, building, neighbourhood).await?;
    tracing::info!(
        buildings = buildings.len(),
        reports = reports.len(),
        %since,
        "loaded reports from postgres"
    );
    Ok((buildings, reports))
}

fn load_csv(
    path: &Path,
    strict: bool,
    since: DateTime<Utc>,
) -> anyhow::Result<(Vec<Building>, Vec<Report>)> {
    let policy = if strict {
        StatusPolicy::Strict
    } else {
        StatusPolicy::Permissive
    };
    let batch = import::read_reports(path, policy)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let reports: Vec<Report> = batch
        .to_reports()
        .into_iter()
        .filter(|report| report.created_at >= since)
        .collect();
    tracing::info!(
        buildings = batch.buildings.len(),
        reports = reports.len(),
        path = %path.display(),
        "loaded reports from csv"
    );
    Ok((batch.buildings, reports))
}
