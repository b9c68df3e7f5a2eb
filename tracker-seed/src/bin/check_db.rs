// Quick diagnostic to check what the seed left in the tasks collection
use anyhow::{bail, Context, Result};
use clap::Parser;
use tracker_seed::config::Settings;
use tracker_seed::db::Database;
use tracker_seed::logging;

#[derive(Parser, Debug)]
#[command(name = "check-db")]
#[command(about = "Report task count, indexes and due date format", long_about = None)]
struct Args {
    /// MongoDB connection string (overrides MONGODB_URL and settings.toml)
    #[arg(long)]
    url: Option<String>,

    /// Database to inspect (overrides MONGODB_DATABASE and settings.toml)
    #[arg(short, long)]
    database: Option<String>,

    /// Also list every task
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    logging::init();

    let args = Args::parse();
    let mut settings = Settings::new().context("Failed to load settings")?;
    settings.override_with(args.url, args.database);

    let db = Database::connect(&settings.mongodb).await?;
    db.ping().await?;
    let status = db.inspect().await?;

    println!("=== Database Diagnostic ({}) ===\n", db.name());
    println!("Total tasks: {}", status.task_count);

    println!("\n=== Indexes on tasks ===");
    for (i, index) in status.indexes.iter().enumerate() {
        println!("  {}. {}", i + 1, index);
    }
    if status.missing_indexes.is_empty() {
        println!("All seed indexes present");
    } else {
        println!("Missing: {}", status.missing_indexes.join(", "));
    }

    // assignee_id is indexed but the sample tasks never set it
    println!("Tasks with an assignee: {}", status.assigned_count);

    println!("\n=== Due dates ===");
    if status.malformed_due_dates.is_empty() {
        println!("All due dates are YYYY-MM-DD strings");
    } else {
        for (i, title) in status.malformed_due_dates.iter().enumerate() {
            println!("  {}. {}", i + 1, title);
        }
    }

    if args.verbose {
        println!("\n=== Tasks ===");
        for (i, task) in db.list_tasks().await?.iter().enumerate() {
            println!(
                "  {}. [{}/{}] {} (due {}, creator {})",
                i + 1,
                task.status.as_str(),
                task.priority.as_str(),
                task.title,
                task.due_date_text().unwrap_or_else(|| "-".to_string()),
                task.creator_id
            );
        }
    }

    db.shutdown().await;

    if !status.is_healthy() {
        bail!("Database {} does not match the seed layout", settings.mongodb.database);
    }
    Ok(())
}
