use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracker_seed::config::Settings;
use tracker_seed::db::Database;
use tracker_seed::logging;
use tracker_seed::seed::{self, SeedPlan};

/// Task Tracker Seed
///
/// Ensures the task indexes exist and inserts two sample tasks. Meant to run
/// once when the database container starts. Running it again adds the sample
/// tasks a second time.
#[derive(Parser, Debug)]
#[command(name = "tracker-seed")]
#[command(about = "Create task indexes and insert sample tasks", long_about = None)]
struct Args {
    /// MongoDB connection string (overrides MONGODB_URL and settings.toml)
    #[arg(long)]
    url: Option<String>,

    /// Database to seed (overrides MONGODB_DATABASE and settings.toml)
    #[arg(short, long)]
    database: Option<String>,

    /// Only create indexes, do not insert the sample tasks
    #[arg(long)]
    indexes_only: bool,

    /// Print what would be created without connecting
    #[arg(short = 'n', long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    logging::init();

    let args = Args::parse();

    let mut settings = Settings::new().context("Failed to load settings")?;
    settings.override_with(args.url, args.database);
    if args.indexes_only {
        settings.seed.sample_tasks = false;
    }

    let now = Utc::now();

    if args.dry_run {
        let plan = SeedPlan::new(&settings.mongodb.database, &settings.seed, now)?;
        tracing::info!("Dry run - no changes will be made to the database");
        println!("{}", plan.to_json()?);
        return Ok(());
    }

    tracing::info!(
        "Connecting to {} (database {})",
        settings.mongodb.redacted_url(),
        settings.mongodb.database
    );
    let db = Database::connect(&settings.mongodb).await?;
    db.ping().await?;

    let report = seed::run(&db, &settings.seed, now).await?;
    tracing::info!(
        "Seed complete: {} indexes ensured, {} tasks inserted into {}",
        report.indexes.len(),
        report.inserted,
        report.database
    );

    db.shutdown().await;
    Ok(())
}
