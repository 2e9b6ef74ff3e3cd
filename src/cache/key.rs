//! Cache keys and the payloads stored under them.

use std::fmt;

use crate::api::types::{Project, Task, User};

/// Identity of one cache entry: resource type plus optional id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
  /// Current signed-in user
  Session,
  /// All projects visible to the user
  ProjectList,
  /// A single project by id
  Project(String),
  /// Members of a project
  Members(String),
  /// All tasks visible to the user
  TaskList,
  /// Tasks belonging to one project
  TasksByProject(String),
  /// A single task by id
  Task(String),
}

impl ResourceKey {
  /// Resource type name, used in logs
  pub fn kind(&self) -> &'static str {
    match self {
      ResourceKey::Session => "session",
      ResourceKey::ProjectList => "project_list",
      ResourceKey::Project(_) => "project",
      ResourceKey::Members(_) => "members",
      ResourceKey::TaskList => "task_list",
      ResourceKey::TasksByProject(_) => "tasks_by_project",
      ResourceKey::Task(_) => "task",
    }
  }

  pub fn id(&self) -> Option<&str> {
    match self {
      ResourceKey::Session | ResourceKey::ProjectList | ResourceKey::TaskList => None,
      ResourceKey::Project(id)
      | ResourceKey::Members(id)
      | ResourceKey::TasksByProject(id)
      | ResourceKey::Task(id) => Some(id),
    }
  }
}

impl fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.id() {
      Some(id) => write!(f, "{}:{}", self.kind(), id),
      None => f.write_str(self.kind()),
    }
  }
}

/// Last-known payload of an entry.
///
/// The cache itself never looks inside; typed accessors on
/// [`ResourceCache`](super::ResourceCache) pick the variant they expect.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
  Session(Option<User>),
  Projects(Vec<Project>),
  Project(Box<Project>),
  Members(Vec<User>),
  Tasks(Vec<Task>),
  Task(Box<Task>),
}

impl Resource {
  pub fn kind(&self) -> &'static str {
    match self {
      Resource::Session(_) => "session",
      Resource::Projects(_) => "projects",
      Resource::Project(_) => "project",
      Resource::Members(_) => "members",
      Resource::Tasks(_) => "tasks",
      Resource::Task(_) => "task",
    }
  }
}

/// Lifecycle of an entry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntryStatus {
  /// Never fetched, or invalidated since the last fetch
  #[default]
  Uninitialized,
  Loading,
  Ready,
  /// Last fetch failed; the next read retries
  Error(String),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(ResourceKey::ProjectList.to_string(), "project_list");
    assert_eq!(
      ResourceKey::TasksByProject("p1".to_string()).to_string(),
      "tasks_by_project:p1"
    );
  }

  #[test]
  fn test_keys_with_same_id_differ_by_type() {
    assert_ne!(
      ResourceKey::Project("p1".to_string()),
      ResourceKey::Members("p1".to_string())
    );
  }
}
