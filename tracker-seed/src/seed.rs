use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracker_types::Task;

use crate::config::SeedSettings;
use crate::db::schema::{expected_index_names, sample_tasks, TASKS_COLLECTION};
use crate::db::Database;

/// Outcome of a seed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub database: String,
    /// Index names reported by the server, in creation order
    pub indexes: Vec<String>,
    /// Sample tasks inserted by this run
    pub inserted: usize,
}

/// What a seed run would do, printed by `--dry-run`
#[derive(Debug, Clone, Serialize)]
pub struct SeedPlan {
    pub database: String,
    pub collection: &'static str,
    pub indexes: Vec<String>,
    pub documents: Vec<Task>,
}

impl SeedPlan {
    pub fn new(database: &str, settings: &SeedSettings, now: DateTime<Utc>) -> Result<Self> {
        Ok(Self {
            database: database.to_string(),
            collection: TASKS_COLLECTION,
            indexes: expected_index_names(),
            documents: if settings.sample_tasks {
                sample_tasks(now)?
            } else {
                Vec::new()
            },
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize seed plan")
    }
}

/// Create the task indexes, then insert the sample tasks unless disabled.
///
/// Indexes always come first so the inserted documents are covered by them.
/// Errors stop the run where they happen; nothing is rolled back.
pub async fn run(db: &Database, settings: &SeedSettings, now: DateTime<Utc>) -> Result<SeedReport> {
    tracing::info!("Seeding {}.{}", db.name(), TASKS_COLLECTION);

    let indexes = db.initialize().await?;

    let inserted = if settings.sample_tasks {
        db.seed_sample_tasks(now).await?
    } else {
        tracing::info!("Sample tasks disabled, skipping insert");
        0
    };

    Ok(SeedReport {
        database: db.name().to_string(),
        indexes,
        inserted,
    })
}
