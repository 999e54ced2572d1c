use serde::{Deserialize, Deserializer, Serialize};
use chrono::NaiveDate;

use crate::time::parse_server_date;

pub type TaskId = i64;

/// A single to-do item as the server returns it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,

    // The API sends `null` for tasks created without a description.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,

    #[serde(default)]
    pub done: bool,

    #[serde(default)]
    pub user_id: Option<i64>,

    // Kept as the server's strings. The client only displays them.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Task {
    pub fn new(id: TaskId, title: impl Into<String>, done: bool) -> Self {
        Self {
            id,
            title: title.into(),
            description: String::new(),
            done,
            user_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn created_on(&self) -> Option<NaiveDate> {
        self.created_at.as_deref().and_then(parse_server_date)
    }

    pub fn updated_on(&self) -> Option<NaiveDate> {
        self.updated_at.as_deref().and_then(parse_server_date)
    }

    pub fn status_label(&self) -> &'static str {
        if self.done { "Completed" } else { "Pending" }
    }
}

/// Payload for `POST /task`.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
}

impl NewTask {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Partial update payload for `PATCH /task/{id}`. Only `done` is ever sent.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPatch {
    pub done: bool,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_server_shape() {
        let json = r#"{
            "id": 1,
            "title": "Tarefa 1",
            "description": "Descrição 1",
            "done": false,
            "userId": 1,
            "createdAt": "2023-01-01",
            "updatedAt": "2023-01-01"
        }"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.title, "Tarefa 1");
        assert_eq!(task.user_id, Some(1));
        assert_eq!(task.created_on(), NaiveDate::from_ymd_opt(2023, 1, 1));
    }

    #[test]
    fn test_null_description_reads_as_empty() {
        let json = r#"{"id": 7, "title": "x", "description": null, "done": true}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.description, "");
        assert!(task.done);
        assert_eq!(task.created_at, None);
    }

    #[test]
    fn test_payloads_serialize_minimal_fields() {
        let body = serde_json::to_value(NewTask::new("Nova Tarefa", "Nova Descrição")).unwrap();
        assert_eq!(body, serde_json::json!({"title": "Nova Tarefa", "description": "Nova Descrição"}));

        let patch = serde_json::to_value(TaskPatch { done: true }).unwrap();
        assert_eq!(patch, serde_json::json!({"done": true}));
    }
}
