use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracker_types::{is_iso_date, Task};

use super::schema::{
    expected_index_names, sample_tasks, task_from_document, task_index_models, task_to_document,
    TASKS_COLLECTION,
};
use crate::config::MongoSettings;

/// Snapshot of what a seed run left behind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedStatus {
    /// Documents in the tasks collection
    pub task_count: u64,
    /// Documents with a non-null `assignee_id`
    pub assigned_count: u64,
    /// Every index on the tasks collection, including `_id_`
    pub indexes: Vec<String>,
    /// Expected seed indexes that are not present
    pub missing_indexes: Vec<String>,
    /// Titles of tasks whose `due_date` is not a `YYYY-MM-DD` string
    pub malformed_due_dates: Vec<String>,
}

impl SeedStatus {
    pub fn is_healthy(&self) -> bool {
        self.missing_indexes.is_empty() && self.malformed_due_dates.is_empty()
    }
}

/// True when `due_date` is absent, null, or a `YYYY-MM-DD` string
fn has_well_formed_due_date(document: &Document) -> bool {
    match document.get("due_date") {
        None | Some(Bson::Null) => true,
        Some(Bson::String(text)) => is_iso_date(text),
        Some(_) => false,
    }
}

/// MongoDB handle scoped to the task tracker database
#[derive(Clone)]
pub struct Database {
    client: Client,
    db: mongodb::Database,
}

impl Database {
    /// Build a client from settings and select the configured database.
    ///
    /// The driver connects lazily, so this succeeds even when the server is
    /// down. Call [`Database::ping`] to find out.
    pub async fn connect(settings: &MongoSettings) -> Result<Self> {
        tracing::debug!(
            url = %settings.redacted_url(),
            database = %settings.database,
            "Configuring MongoDB client"
        );

        let mut options = ClientOptions::parse(&settings.url)
            .await
            .context("Failed to parse MongoDB connection string")?;
        options.app_name = Some(settings.app_name.clone());
        options.server_selection_timeout = Some(settings.server_selection_timeout());

        let client = Client::with_options(options).context("Failed to create MongoDB client")?;
        let db = client.database(&settings.database);

        Ok(Self { client, db })
    }

    /// Name of the selected database
    pub fn name(&self) -> &str {
        self.db.name()
    }

    pub fn tasks(&self) -> Collection<Document> {
        self.db.collection(TASKS_COLLECTION)
    }

    /// Round trip to the server so connection problems surface here
    pub async fn ping(&self) -> Result<()> {
        self.db
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context("MongoDB did not answer ping")?;
        Ok(())
    }

    /// Create the task indexes, one at a time in declaration order.
    ///
    /// Safe to run repeatedly: creating an index that already exists with the
    /// same keys is a no-op on the server.
    pub async fn initialize(&self) -> Result<Vec<String>> {
        let tasks = self.tasks();
        let mut names = Vec::new();

        for model in task_index_models() {
            let keys = model.keys.clone();
            let result = tasks
                .create_index(model, None)
                .await
                .with_context(|| format!("Failed to create index {} on tasks", keys))?;
            tracing::info!("Ensured index {} on {}.tasks", result.index_name, self.name());
            names.push(result.index_name);
        }

        Ok(names)
    }

    /// Insert the sample tasks stamped with `now`.
    ///
    /// Not idempotent: nothing guards against inserting them twice.
    pub async fn seed_sample_tasks(&self, now: DateTime<Utc>) -> Result<usize> {
        let tasks = sample_tasks(now)?;
        for task in &tasks {
            task.validate()
                .with_context(|| format!("Sample task {:?} is invalid", task.title))?;
        }

        let documents: Vec<Document> = tasks.iter().map(task_to_document).collect();
        let result = self
            .tasks()
            .insert_many(documents, None)
            .await
            .context("Failed to insert sample tasks")?;

        let inserted = result.inserted_ids.len();
        tracing::info!("Inserted {} sample tasks into {}.tasks", inserted, self.name());
        Ok(inserted)
    }

    /// Every task in the collection, in natural order
    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let documents: Vec<Document> = self
            .tasks()
            .find(None, None)
            .await
            .context("Failed to query tasks")?
            .try_collect()
            .await
            .context("Failed to read tasks")?;

        documents
            .iter()
            .map(|document| {
                task_from_document(document).with_context(|| {
                    format!("Malformed task document {:?}", document.get("_id"))
                })
            })
            .collect()
    }

    /// Read-only check of the collection against what a seed run produces
    pub async fn inspect(&self) -> Result<SeedStatus> {
        let collections = self
            .db
            .list_collection_names(None)
            .await
            .context("Failed to list collections")?;

        // list_indexes fails on a collection that does not exist yet
        if !collections.iter().any(|name| name == TASKS_COLLECTION) {
            return Ok(SeedStatus {
                task_count: 0,
                assigned_count: 0,
                indexes: Vec::new(),
                missing_indexes: expected_index_names(),
                malformed_due_dates: Vec::new(),
            });
        }

        let tasks = self.tasks();
        let task_count = tasks
            .count_documents(doc! {}, None)
            .await
            .context("Failed to count tasks")?;
        let assigned_count = tasks
            .count_documents(doc! { "assignee_id": { "$ne": null } }, None)
            .await
            .context("Failed to count assigned tasks")?;

        let indexes = tasks
            .list_index_names()
            .await
            .context("Failed to list task indexes")?;
        let missing_indexes = expected_index_names()
            .into_iter()
            .filter(|name| !indexes.contains(name))
            .collect();

        // An explicit null due date means "no due date", same as a missing field
        let mut malformed_due_dates = Vec::new();
        let mut cursor = tasks
            .find(doc! { "due_date": { "$ne": null } }, None)
            .await
            .context("Failed to query task due dates")?;
        while let Some(document) = cursor.try_next().await.context("Failed to read task")? {
            if !has_well_formed_due_date(&document) {
                let title = document.get_str("title").unwrap_or("<untitled>");
                malformed_due_dates.push(title.to_string());
            }
        }

        Ok(SeedStatus {
            task_count,
            assigned_count,
            indexes,
            missing_indexes,
            malformed_due_dates,
        })
    }

    /// Drop the selected database
    pub async fn drop_database(&self) -> Result<()> {
        self.db
            .drop(None)
            .await
            .with_context(|| format!("Failed to drop database {}", self.name()))
    }

    /// Close the client, waiting for in-flight operations
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}
