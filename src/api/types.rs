//! Domain types shared by the cache, the views and the HTTP client.
//!
//! The service is loose about shapes: references to users and projects come
//! back either as a bare id or as a populated object, and some names have
//! two spellings. Those quirks are absorbed here with serde attributes so the
//! rest of the crate only sees one shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything with a server-assigned id
pub trait Identified {
  fn id(&self) -> &str;
}

/// Reference to another record: a bare id or the populated object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
  Id(String),
  Populated(T),
}

impl<T: Identified> Ref<T> {
  pub fn id(&self) -> &str {
    match self {
      Ref::Id(id) => id,
      Ref::Populated(value) => value.id(),
    }
  }

  pub fn populated(&self) -> Option<&T> {
    match self {
      Ref::Id(_) => None,
      Ref::Populated(value) => Some(value),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub email: String,
}

impl User {
  /// Name for display, falling back to the local part of the email
  pub fn display_name(&self) -> &str {
    if !self.name.is_empty() {
      &self.name
    } else {
      self.email.split('@').next().unwrap_or(&self.email)
    }
  }
}

impl Identified for User {
  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(alias = "name", default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub created_by: Option<Ref<User>>,
  #[serde(default)]
  pub members: Vec<Ref<User>>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl Project {
  pub fn is_owned_by(&self, user_id: &str) -> bool {
    self
      .created_by
      .as_ref()
      .is_some_and(|owner| owner.id() == user_id)
  }
}

impl Identified for Project {
  fn id(&self) -> &str {
    &self.id
  }
}

/// The slice of a project that tasks embed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStub {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(alias = "name", default)]
  pub title: String,
  #[serde(default)]
  pub created_by: Option<Ref<User>>,
}

impl Identified for ProjectStub {
  fn id(&self) -> &str {
    &self.id
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
  #[default]
  Todo,
  InProgress,
  #[serde(alias = "done")]
  Completed,
}

impl TaskStatus {
  /// Board column order
  pub const ALL: [TaskStatus; 3] = [
    TaskStatus::Todo,
    TaskStatus::InProgress,
    TaskStatus::Completed,
  ];

  pub fn label(self) -> &'static str {
    match self {
      TaskStatus::Todo => "To Do",
      TaskStatus::InProgress => "In Progress",
      TaskStatus::Completed => "Completed",
    }
  }

  pub fn next(self) -> Option<TaskStatus> {
    match self {
      TaskStatus::Todo => Some(TaskStatus::InProgress),
      TaskStatus::InProgress => Some(TaskStatus::Completed),
      TaskStatus::Completed => None,
    }
  }

  pub fn previous(self) -> Option<TaskStatus> {
    match self {
      TaskStatus::Todo => None,
      TaskStatus::InProgress => Some(TaskStatus::Todo),
      TaskStatus::Completed => Some(TaskStatus::InProgress),
    }
  }
}

impl fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  Low,
  #[default]
  Medium,
  High,
}

impl Priority {
  pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

  pub fn label(self) -> &'static str {
    match self {
      Priority::Low => "low",
      Priority::Medium => "medium",
      Priority::High => "high",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
  #[serde(rename = "_id", alias = "id")]
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub status: TaskStatus,
  #[serde(default)]
  pub priority: Priority,
  #[serde(rename = "projectId", alias = "project", default)]
  pub project: Option<Ref<ProjectStub>>,
  #[serde(default)]
  pub assigned_to: Option<Ref<User>>,
  #[serde(default)]
  pub created_by: Option<Ref<User>>,
  #[serde(default)]
  pub due_date: Option<DateTime<Utc>>,
}

impl Task {
  pub fn project_id(&self) -> Option<&str> {
    self.project.as_ref().map(Ref::id)
  }

  pub fn assignee_id(&self) -> Option<&str> {
    self.assigned_to.as_ref().map(Ref::id)
  }

  pub fn creator_id(&self) -> Option<&str> {
    self.created_by.as_ref().map(Ref::id)
  }
}

impl Identified for Task {
  fn id(&self) -> &str {
    &self.id
  }
}

// ============================================================================
// Request payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
  pub name: String,
  pub email: String,
  pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectDraft {
  pub title: String,
  pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectChanges {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
  pub title: String,
  pub description: String,
  pub priority: Priority,
  pub status: TaskStatus,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<NaiveDate>,
}

/// Partial task update; unset fields are left alone by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChanges {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub status: Option<TaskStatus>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<Priority>,
  /// `Some(None)` is sent as `null` and clears the assignee
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_to: Option<Option<String>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub due_date: Option<Option<NaiveDate>>,
}

impl TaskChanges {
  pub fn status(status: TaskStatus) -> Self {
    Self {
      status: Some(status),
      ..Self::default()
    }
  }
}

/// Every field of an edited draft; emptied fields are cleared on the server
impl From<TaskDraft> for TaskChanges {
  fn from(draft: TaskDraft) -> Self {
    Self {
      title: Some(draft.title),
      description: Some(draft.description),
      status: Some(draft.status),
      priority: Some(draft.priority),
      assigned_to: Some(draft.assigned_to),
      due_date: Some(draft.due_date),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_task_accepts_populated_and_bare_refs() {
    let task: Task = serde_json::from_value(json!({
      "_id": "t1",
      "title": "Write docs",
      "status": "in-progress",
      "priority": "high",
      "projectId": { "_id": "p1", "title": "Docs" },
      "assignedTo": "u2",
      "createdBy": { "_id": "u1", "name": "Ada", "email": "ada@example.com" }
    }))
    .unwrap();

    assert_eq!(task.project_id(), Some("p1"));
    assert_eq!(task.assignee_id(), Some("u2"));
    assert_eq!(task.creator_id(), Some("u1"));
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.priority, Priority::High);
  }

  #[test]
  fn test_task_project_key_alias() {
    let task: Task = serde_json::from_value(json!({
      "_id": "t1",
      "project": "p9"
    }))
    .unwrap();
    assert_eq!(task.project_id(), Some("p9"));
    assert_eq!(task.status, TaskStatus::Todo);
  }

  #[test]
  fn test_done_is_completed() {
    let status: TaskStatus = serde_json::from_value(json!("done")).unwrap();
    assert_eq!(status, TaskStatus::Completed);
    assert_eq!(serde_json::to_value(status).unwrap(), json!("completed"));
  }

  #[test]
  fn test_project_name_alias() {
    let project: Project =
      serde_json::from_value(json!({ "_id": "p1", "name": "Apollo", "createdBy": "u1" })).unwrap();
    assert_eq!(project.title, "Apollo");
    assert!(project.is_owned_by("u1"));
    assert!(!project.is_owned_by("u2"));
  }

  #[test]
  fn test_status_only_changes_serialize_sparse() {
    let body = serde_json::to_value(TaskChanges::status(TaskStatus::Completed)).unwrap();
    assert_eq!(body, json!({ "status": "completed" }));
  }

  #[test]
  fn test_edit_clears_emptied_fields() {
    let draft = TaskDraft {
      title: "Write docs".to_string(),
      description: "Cover the sync API".to_string(),
      ..TaskDraft::default()
    };
    let body = serde_json::to_value(TaskChanges::from(draft)).unwrap();
    assert_eq!(body["assignedTo"], json!(null));
    assert_eq!(body["dueDate"], json!(null));
    assert!(body.as_object().unwrap().contains_key("assignedTo"));
    assert!(body.as_object().unwrap().contains_key("dueDate"));
  }

  #[test]
  fn test_edit_sends_set_fields() {
    let draft = TaskDraft {
      title: "Write docs".to_string(),
      description: "Cover the sync API".to_string(),
      assigned_to: Some("u2".to_string()),
      due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
      ..TaskDraft::default()
    };
    let body = serde_json::to_value(TaskChanges::from(draft)).unwrap();
    assert_eq!(body["assignedTo"], json!("u2"));
    assert_eq!(body["dueDate"], json!("2024-06-01"));
  }

  #[test]
  fn test_status_steps() {
    assert_eq!(TaskStatus::Todo.next(), Some(TaskStatus::InProgress));
    assert_eq!(TaskStatus::Completed.next(), None);
    assert_eq!(TaskStatus::Todo.previous(), None);
    assert_eq!(TaskStatus::Completed.previous(), Some(TaskStatus::InProgress));
  }

  #[test]
  fn test_display_name_falls_back_to_email() {
    let user = User {
      id: "u1".to_string(),
      name: String::new(),
      email: "grace@example.com".to_string(),
    };
    assert_eq!(user.display_name(), "grace");
  }
}
