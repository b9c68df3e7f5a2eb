use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use mongodb::bson::{doc, Bson, Document};
use mongodb::IndexModel;
use tracker_types::{parse_due_date, Priority, Task, TaskStatus};

/// Database the task service reads from
pub const DATABASE_NAME: &str = "task_tracker";

/// Collection holding task documents
pub const TASKS_COLLECTION: &str = "tasks";

/// Fields of `tasks` that get a single-field ascending index, in creation order.
///
/// `assignee_id` is indexed even though the sample tasks never set it.
pub const TASK_INDEX_FIELDS: [&str; 4] = ["status", "priority", "assignee_id", "creator_id"];

/// Index definitions for the tasks collection: `{ <field>: 1 }`, non-unique
pub fn task_index_models() -> Vec<IndexModel> {
    TASK_INDEX_FIELDS
        .iter()
        .map(|field| IndexModel::builder().keys(doc! { *field: 1 }).build())
        .collect()
}

/// Names the server assigns to [`task_index_models`]
pub fn expected_index_names() -> Vec<String> {
    TASK_INDEX_FIELDS
        .iter()
        .map(|field| format!("{}_1", field))
        .collect()
}

/// The two sample tasks inserted on every seed run, stamped with `now`
pub fn sample_tasks(now: DateTime<Utc>) -> Result<Vec<Task>> {
    Ok(vec![
        Task::new(
            "Тестовая задача 1",
            "Описание тестовой задачи 1",
            1,
            now,
        )
        .with_status(TaskStatus::Todo)
        .with_priority(Priority::Medium)
        .with_due_date(sample_due_date("2025-04-15")?),
        Task::new(
            "Тестовая задача 2",
            "Описание тестовой задачи 2",
            1,
            now,
        )
        .with_status(TaskStatus::InProgress)
        .with_priority(Priority::High)
        .with_due_date(sample_due_date("2025-04-20")?),
    ])
}

fn sample_due_date(text: &str) -> Result<NaiveDate> {
    parse_due_date(text).with_context(|| format!("Invalid sample due date {}", text))
}

/// Map a task to the document layout of the `tasks` collection.
///
/// Timestamps become BSON dates, `due_date` stays a plain string and absent
/// optionals are left out entirely.
pub fn task_to_document(task: &Task) -> Document {
    let mut document = doc! {
        "title": task.title.as_str(),
        "description": task.description.as_str(),
        "status": task.status.as_str(),
        "priority": task.priority.as_str(),
        "created_at": bson::DateTime::from_chrono(task.created_at),
        "updated_at": bson::DateTime::from_chrono(task.updated_at),
    };
    if let Some(due_date) = task.due_date_text() {
        document.insert("due_date", due_date);
    }
    document.insert("creator_id", task.creator_id);
    if let Some(assignee_id) = task.assignee_id {
        document.insert("assignee_id", assignee_id);
    }
    document
}

/// Read a task back from a stored document
pub fn task_from_document(document: &Document) -> Result<Task> {
    let status = document.get_str("status").context("Missing task status")?;
    let priority = document.get_str("priority").context("Missing task priority")?;

    let due_date = match document.get("due_date") {
        None | Some(Bson::Null) => None,
        Some(Bson::String(text)) => Some(parse_due_date(text)?),
        Some(other) => bail!("due_date must be a string, found {:?}", other.element_type()),
    };

    let assignee_id = match document.get("assignee_id") {
        None | Some(Bson::Null) => None,
        Some(_) => Some(get_integer(document, "assignee_id")?),
    };

    Ok(Task {
        title: document.get_str("title").context("Missing task title")?.to_string(),
        description: document
            .get_str("description")
            .context("Missing task description")?
            .to_string(),
        status: TaskStatus::parse(status).ok_or_else(|| anyhow!("Unknown task status: {}", status))?,
        priority: Priority::parse(priority)
            .ok_or_else(|| anyhow!("Unknown task priority: {}", priority))?,
        created_at: get_timestamp(document, "created_at")?,
        updated_at: get_timestamp(document, "updated_at")?,
        due_date,
        creator_id: get_integer(document, "creator_id")?,
        assignee_id,
    })
}

fn get_timestamp(document: &Document, key: &str) -> Result<DateTime<Utc>> {
    document
        .get_datetime(key)
        .map(|date| date.to_chrono())
        .with_context(|| format!("Missing or non-date {}", key))
}

// Shell-inserted documents may carry ids as int32 or double, the seed writes int64
fn get_integer(document: &Document, key: &str) -> Result<i64> {
    match document.get(key) {
        Some(Bson::Int32(value)) => Ok(i64::from(*value)),
        Some(Bson::Int64(value)) => Ok(*value),
        Some(Bson::Double(value)) if value.fract() == 0.0 => Ok(*value as i64),
        Some(other) => bail!("{} must be an integer, found {:?}", key, other.element_type()),
        None => bail!("Missing {}", key),
    }
}
