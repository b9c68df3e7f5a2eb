use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::enums::{Priority, TaskStatus};

/// Text format of `due_date`. Due dates are stored as plain strings, not BSON dates.
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Longest title the task service accepts
pub const MAX_TITLE_LEN: usize = 100;

static DUE_DATE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("due date pattern is valid"));

// Custom serde module so due dates always round-trip as YYYY-MM-DD strings
mod due_date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(date) => serializer.serialize_str(&super::format_due_date(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| super::parse_due_date(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Format a due date the way it is stored
pub fn format_due_date(date: NaiveDate) -> String {
    date.format(DUE_DATE_FORMAT).to_string()
}

/// Parse a stored due date, rejecting anything that is not exactly `YYYY-MM-DD`
pub fn parse_due_date(s: &str) -> Result<NaiveDate, TaskValidationError> {
    if !DUE_DATE_PATTERN.is_match(s) {
        return Err(TaskValidationError::MalformedDueDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DUE_DATE_FORMAT)
        .map_err(|_| TaskValidationError::MalformedDueDate(s.to_string()))
}

/// True if `s` is a valid calendar date written as `YYYY-MM-DD`
pub fn is_iso_date(s: &str) -> bool {
    parse_due_date(s).is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("title is {0} characters, limit is {}", MAX_TITLE_LEN)]
    TitleTooLong(usize),

    #[error("description must not be empty")]
    EmptyDescription,

    #[error("creator_id must be positive, got {0}")]
    InvalidCreator(i64),

    #[error("assignee_id must be positive, got {0}")]
    InvalidAssignee(i64),

    #[error("updated_at precedes created_at")]
    UpdatedBeforeCreated,

    #[error("due date {0:?} is not a YYYY-MM-DD date")]
    MalformedDueDate(String),
}

/// One document of the `tasks` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "due_date_format"
    )]
    pub due_date: Option<NaiveDate>,
    /// User who created the task. Not checked against any users table.
    pub creator_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i64>,
}

impl Task {
    /// New task with the task service defaults: `todo`, `medium`, no due date, unassigned
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        creator_id: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: TaskStatus::default(),
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
            due_date: None,
            creator_id,
            assignee_id: None,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_assignee(mut self, assignee_id: i64) -> Self {
        self.assignee_id = Some(assignee_id);
        self
    }

    /// Due date as stored text, if any
    pub fn due_date_text(&self) -> Option<String> {
        self.due_date.map(format_due_date)
    }

    /// Check the fields every stored task is expected to carry.
    ///
    /// The database enforces none of this; it is the contract seed data and
    /// application code keep on their own.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        // The service limit counts the raw title, surrounding whitespace included
        let title_len = self.title.chars().count();
        if title_len > MAX_TITLE_LEN {
            return Err(TaskValidationError::TitleTooLong(title_len));
        }
        if self.description.trim().is_empty() {
            return Err(TaskValidationError::EmptyDescription);
        }
        if self.creator_id <= 0 {
            return Err(TaskValidationError::InvalidCreator(self.creator_id));
        }
        if let Some(assignee_id) = self.assignee_id {
            if assignee_id <= 0 {
                return Err(TaskValidationError::InvalidAssignee(assignee_id));
            }
        }
        if self.updated_at < self.created_at {
            return Err(TaskValidationError::UpdatedBeforeCreated);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 12, 0, 0).unwrap()
    }

    fn sample() -> Task {
        Task::new("Write report", "Quarterly numbers", 1, fixed_now())
            .with_due_date(NaiveDate::from_ymd_opt(2025, 4, 15).unwrap())
    }

    #[test]
    fn test_new_task_uses_service_defaults() {
        let task = Task::new("t", "d", 7, fixed_now());
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.due_date.is_none());
        assert!(task.assignee_id.is_none());
    }

    #[test]
    fn test_json_omits_absent_optionals() {
        let task = Task::new("t", "d", 1, fixed_now());
        let value = serde_json::to_value(&task).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("due_date"));
        assert!(!object.contains_key("assignee_id"));
        assert_eq!(object["status"], "todo");
        assert_eq!(object["priority"], "medium");
    }

    #[test]
    fn test_due_date_serializes_as_plain_text() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["due_date"], "2025-04-15");

        let back: Task = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_deserialize_rejects_malformed_due_date() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["due_date"] = "15.04.2025".into();
        assert!(serde_json::from_value::<Task>(value).is_err());
    }

    #[test]
    fn test_validate_accepts_sample() {
        assert_eq!(sample().validate(), Ok(()));
        assert_eq!(sample().with_assignee(3).validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_blank_fields() {
        let mut task = sample();
        task.title = "   ".to_string();
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyTitle));

        let mut task = sample();
        task.description = String::new();
        assert_eq!(task.validate(), Err(TaskValidationError::EmptyDescription));
    }

    #[test]
    fn test_validate_counts_title_in_characters() {
        let mut task = sample();
        task.title = "ж".repeat(MAX_TITLE_LEN);
        assert_eq!(task.validate(), Ok(()));

        task.title.push('ж');
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::TitleTooLong(MAX_TITLE_LEN + 1))
        );
    }

    #[test]
    fn test_validate_counts_surrounding_whitespace() {
        let mut task = sample();
        task.title = format!(" {}", "a".repeat(MAX_TITLE_LEN));
        assert_eq!(
            task.validate(),
            Err(TaskValidationError::TitleTooLong(MAX_TITLE_LEN + 1))
        );
    }

    #[test]
    fn test_title_error_message_names_limit() {
        let message = TaskValidationError::TitleTooLong(120).to_string();
        assert_eq!(message, format!("title is 120 characters, limit is {}", MAX_TITLE_LEN));
    }

    #[test]
    fn test_validate_rejects_bad_references() {
        let mut task = sample();
        task.creator_id = 0;
        assert_eq!(task.validate(), Err(TaskValidationError::InvalidCreator(0)));

        let task = sample().with_assignee(-4);
        assert_eq!(task.validate(), Err(TaskValidationError::InvalidAssignee(-4)));
    }

    #[test]
    fn test_validate_rejects_time_travel() {
        let mut task = sample();
        task.updated_at = task.created_at - Duration::seconds(1);
        assert_eq!(task.validate(), Err(TaskValidationError::UpdatedBeforeCreated));
    }

    #[test]
    fn test_parse_due_date_edge_cases() {
        assert!(is_iso_date("2025-04-20"));
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2025-02-29"));
        assert!(!is_iso_date("2025-4-20"));
        assert!(!is_iso_date("2025-04-20T00:00:00Z"));
        assert!(!is_iso_date(" 2025-04-20"));
        assert!(!is_iso_date(""));
    }

    proptest! {
        #[test]
        fn prop_formatted_dates_are_iso(days in 0i64..3_000_000) {
            let date = NaiveDate::from_ymd_opt(1000, 1, 1).unwrap() + Duration::days(days);
            let text = format_due_date(date);
            prop_assert!(is_iso_date(&text));
            prop_assert_eq!(parse_due_date(&text), Ok(date));
        }

        #[test]
        fn prop_parse_never_panics(s in "\\PC*") {
            let _ = parse_due_date(&s);
        }
    }
}
