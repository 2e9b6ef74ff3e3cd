//! Task filtering, grouping and permission rules used by the board views.

use crate::api::types::{Priority, Project, Task, TaskStatus};

/// Whose tasks to show
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
  #[default]
  Anyone,
  /// Assigned to the signed-in user
  Me,
  User(String),
}

impl AssigneeFilter {
  /// Anyone → Me → each of `people` → Anyone
  pub fn next(&self, people: &[&str]) -> AssigneeFilter {
    let following = match self {
      AssigneeFilter::Anyone => return AssigneeFilter::Me,
      AssigneeFilter::Me => people.first(),
      AssigneeFilter::User(id) => people
        .iter()
        .position(|p| p == id)
        .and_then(|idx| people.get(idx + 1)),
    };
    following.map_or(AssigneeFilter::Anyone, |id| AssigneeFilter::User(id.to_string()))
  }
}

/// Predicates over tasks; every set field must match
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
  pub status: Option<TaskStatus>,
  pub priority: Option<Priority>,
  pub project: Option<String>,
  pub assignee: AssigneeFilter,
  /// Only tasks assigned to or created by the signed-in user
  pub personal: bool,
  /// Case-insensitive match on title or description
  pub search: String,
}

impl TaskFilter {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  pub fn matches(&self, task: &Task, current_user: Option<&str>) -> bool {
    if self.status.is_some_and(|s| task.status != s) {
      return false;
    }
    if self.priority.is_some_and(|p| task.priority != p) {
      return false;
    }
    if let Some(project) = &self.project {
      if task.project_id() != Some(project.as_str()) {
        return false;
      }
    }

    let assignee_ok = match &self.assignee {
      AssigneeFilter::Anyone => true,
      AssigneeFilter::Me => current_user.is_some() && task.assignee_id() == current_user,
      AssigneeFilter::User(id) => task.assignee_id() == Some(id.as_str()),
    };
    if !assignee_ok {
      return false;
    }

    if self.personal {
      let Some(me) = current_user else {
        return false;
      };
      if task.assignee_id() != Some(me) && task.creator_id() != Some(me) {
        return false;
      }
    }

    if !self.search.is_empty() {
      let needle = self.search.to_lowercase();
      if !task.title.to_lowercase().contains(&needle)
        && !task.description.to_lowercase().contains(&needle)
      {
        return false;
      }
    }

    true
  }

  pub fn apply<'a>(&self, tasks: &'a [Task], current_user: Option<&str>) -> Vec<&'a Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task, current_user))
      .collect()
  }

  /// Short description of the active predicates for titles
  pub fn summary(&self) -> String {
    let mut parts = Vec::new();
    if let Some(status) = self.status {
      parts.push(format!("status={}", status));
    }
    if let Some(priority) = self.priority {
      parts.push(format!("priority={}", priority));
    }
    match &self.assignee {
      AssigneeFilter::Anyone => {}
      AssigneeFilter::Me => parts.push("mine".to_string()),
      AssigneeFilter::User(id) => parts.push(format!("assignee={}", id)),
    }
    if self.personal {
      parts.push("personal".to_string());
    }
    if !self.search.is_empty() {
      parts.push(format!("\"{}\"", self.search));
    }
    parts.join(" ")
  }
}

/// Cycle an optional filter value: None → first → ... → last → None
pub fn cycle<T: Copy + PartialEq>(current: Option<T>, values: &[T]) -> Option<T> {
  match current {
    None => values.first().copied(),
    Some(value) => {
      let idx = values.iter().position(|v| *v == value)?;
      values.get(idx + 1).copied()
    }
  }
}

/// Tasks split into the board's status columns
#[derive(Debug, Default)]
pub struct StatusColumns<'a> {
  pub todo: Vec<&'a Task>,
  pub in_progress: Vec<&'a Task>,
  pub completed: Vec<&'a Task>,
}

impl<'a> StatusColumns<'a> {
  pub fn column(&self, status: TaskStatus) -> &[&'a Task] {
    match status {
      TaskStatus::Todo => &self.todo,
      TaskStatus::InProgress => &self.in_progress,
      TaskStatus::Completed => &self.completed,
    }
  }
}

/// Group tasks by status, keeping their relative order
pub fn group_by_status<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> StatusColumns<'a> {
  let mut columns = StatusColumns::default();
  for task in tasks {
    match task.status {
      TaskStatus::Todo => columns.todo.push(task),
      TaskStatus::InProgress => columns.in_progress.push(task),
      TaskStatus::Completed => columns.completed.push(task),
    }
  }
  columns
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
  pub total: usize,
  pub todo: usize,
  pub in_progress: usize,
  pub completed: usize,
}

impl TaskStats {
  pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
    let mut stats = Self::default();
    for task in tasks {
      stats.total += 1;
      match task.status {
        TaskStatus::Todo => stats.todo += 1,
        TaskStatus::InProgress => stats.in_progress += 1,
        TaskStatus::Completed => stats.completed += 1,
      }
    }
    stats
  }

  /// Whole-number completion percentage
  pub fn percent_complete(&self) -> u8 {
    if self.total == 0 {
      return 0;
    }
    ((self.completed * 100) / self.total) as u8
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectStats {
  pub total: usize,
  pub active: usize,
  pub completed: usize,
}

/// Dashboard numbers for everything the user can see
#[derive(Debug, Clone, PartialEq)]
pub struct Overview<'a> {
  pub projects: ProjectStats,
  pub tasks: TaskStats,
  /// Newest first; projects without a creation date sort last
  pub recent: Vec<&'a Project>,
}

pub const RECENT_PROJECTS: usize = 3;

pub fn overview<'a>(projects: &'a [Project], tasks: &[Task]) -> Overview<'a> {
  let count = |status: &str| {
    projects
      .iter()
      .filter(|p| p.status.as_deref() == Some(status))
      .count()
  };

  let mut recent: Vec<&Project> = projects.iter().collect();
  recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
  recent.truncate(RECENT_PROJECTS);

  Overview {
    projects: ProjectStats {
      total: projects.len(),
      active: count("active"),
      completed: count("completed"),
    },
    tasks: TaskStats::from_tasks(tasks),
    recent,
  }
}

/// Only the task's creator or the owner of its project may move it.
///
/// The owner comes from `project` when given, else from the project the
/// task embeds.
pub fn can_change_status(task: &Task, user_id: &str, project: Option<&Project>) -> bool {
  if task.creator_id() == Some(user_id) {
    return true;
  }
  match project {
    Some(project) => project.is_owned_by(user_id),
    None => task
      .project
      .as_ref()
      .and_then(|p| p.populated())
      .and_then(|p| p.created_by.as_ref())
      .is_some_and(|owner| owner.id() == user_id),
  }
}
