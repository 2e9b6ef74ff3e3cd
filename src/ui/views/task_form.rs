use chrono::NaiveDate;

use crate::api::types::{Priority, Task, TaskDraft, TaskStatus, User};
use crate::ui::components::Form;
use crate::validate::{parse_due_date, validate_task};

/// Create/edit form for a task. `assignees` are the project's people.
pub(super) fn task_form(title: impl Into<String>, task: Option<&Task>, assignees: &[User]) -> Form {
  let priorities = Priority::ALL
    .iter()
    .map(|p| (p.label().to_string(), p.label().to_string()))
    .collect();
  let statuses = TaskStatus::ALL
    .iter()
    .map(|s| (s.label().to_string(), s.label().to_string()))
    .collect();
  let mut people = vec![(String::new(), "Unassigned".to_string())];
  people.extend(
    assignees
      .iter()
      .map(|u| (u.id.clone(), u.display_name().to_string())),
  );

  let due = task
    .and_then(|t| t.due_date)
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_default();

  Form::new(title)
    .text("title", "Title", task.map_or("", |t| t.title.as_str()))
    .text(
      "description",
      "Description",
      task.map_or("", |t| t.description.as_str()),
    )
    .choice(
      "priority",
      "Priority",
      priorities,
      task.map_or(Priority::default(), |t| t.priority).label(),
    )
    .choice(
      "status",
      "Status",
      statuses,
      task.map_or(TaskStatus::default(), |t| t.status).label(),
    )
    .choice(
      "assignee",
      "Assignee",
      people,
      task.and_then(Task::assignee_id).unwrap_or(""),
    )
    .text("due", "Due (YYYY-MM-DD)", &due)
}

/// Read and validate the form; errors come back as display strings.
pub(super) fn read_task_form(form: &Form, today: NaiveDate) -> Result<TaskDraft, Vec<String>> {
  let due_date = parse_due_date(form.value("due")).map_err(|e| vec![e.to_string()])?;
  let assignee = form.value("assignee");

  let draft = TaskDraft {
    title: form.value("title").trim().to_string(),
    description: form.value("description").trim().to_string(),
    priority: Priority::ALL
      .into_iter()
      .find(|p| p.label() == form.value("priority"))
      .unwrap_or_default(),
    status: TaskStatus::ALL
      .into_iter()
      .find(|s| s.label() == form.value("status"))
      .unwrap_or_default(),
    assigned_to: (!assignee.is_empty()).then(|| assignee.to_string()),
    due_date,
  };

  if let Err(errors) = validate_task(&draft, today) {
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    return Err(messages);
  }
  Ok(draft)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Ref;
  use chrono::{TimeZone, Utc};
  use pretty_assertions::assert_eq;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
  }

  fn user(id: &str, name: &str) -> User {
    User {
      id: id.to_string(),
      name: name.to_string(),
      email: format!("{}@example.com", id),
    }
  }

  fn task() -> Task {
    Task {
      id: "t1".to_string(),
      title: "Write release notes".to_string(),
      description: "Summarise the changes since May".to_string(),
      status: TaskStatus::InProgress,
      priority: Priority::High,
      project: Some(Ref::Id("p1".to_string())),
      assigned_to: Some(Ref::Id("u2".to_string())),
      created_by: Some(Ref::Id("u1".to_string())),
      due_date: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
    }
  }

  #[test]
  fn test_existing_task_reads_back_unchanged() {
    let people = vec![user("u1", "Ada"), user("u2", "Grace")];
    let form = task_form("Edit", Some(&task()), &people);

    let draft = read_task_form(&form, today()).unwrap();
    assert_eq!(
      draft,
      TaskDraft {
        title: "Write release notes".to_string(),
        description: "Summarise the changes since May".to_string(),
        priority: Priority::High,
        status: TaskStatus::InProgress,
        assigned_to: Some("u2".to_string()),
        due_date: NaiveDate::from_ymd_opt(2024, 6, 1),
      }
    );
  }

  #[test]
  fn test_blank_form_fails_validation() {
    let form = task_form("New task", None, &[]);
    let errors = read_task_form(&form, today()).unwrap_err();
    assert_eq!(
      errors,
      vec![
        "Task title is required".to_string(),
        "Task description is required".to_string(),
      ]
    );
  }

  #[test]
  fn test_blank_form_defaults() {
    let form = task_form("New task", None, &[user("u1", "Ada")]);
    assert_eq!(form.value("priority"), "medium");
    assert_eq!(form.value("status"), "To Do");
    assert_eq!(form.value("assignee"), "");
  }
}
