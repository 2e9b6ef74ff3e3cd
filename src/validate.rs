//! Client-side checks for the task and project forms, run before submitting.

use chrono::NaiveDate;
use std::fmt;

use crate::api::types::{Project, ProjectDraft, TaskDraft, User};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
  Title,
  Description,
  DueDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: Field,
  pub message: &'static str,
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.message)
  }
}

fn error(field: Field, message: &'static str) -> FieldError {
  FieldError { field, message }
}

/// Check a task draft; `today` is the local date the due date is compared to.
pub fn validate_task(draft: &TaskDraft, today: NaiveDate) -> Result<(), Vec<FieldError>> {
  let mut errors = Vec::new();

  let title = draft.title.trim();
  if title.is_empty() {
    errors.push(error(Field::Title, "Task title is required"));
  } else if title.chars().count() < 3 {
    errors.push(error(Field::Title, "Title must be at least 3 characters"));
  }

  let description = draft.description.trim();
  if description.is_empty() {
    errors.push(error(Field::Description, "Task description is required"));
  } else if description.chars().count() < 10 {
    errors.push(error(
      Field::Description,
      "Description must be at least 10 characters",
    ));
  }

  if draft.due_date.is_some_and(|due| due < today) {
    errors.push(error(Field::DueDate, "Due date cannot be in the past"));
  }

  if errors.is_empty() {
    Ok(())
  } else {
    Err(errors)
  }
}

pub fn validate_project(draft: &ProjectDraft) -> Result<(), Vec<FieldError>> {
  if draft.title.trim().is_empty() {
    return Err(vec![error(Field::Title, "Project title is required")]);
  }
  Ok(())
}

/// Parse a `YYYY-MM-DD` form value; blank means no date.
pub fn parse_due_date(input: &str) -> Result<Option<NaiveDate>, FieldError> {
  let input = input.trim();
  if input.is_empty() {
    return Ok(None);
  }
  NaiveDate::parse_from_str(input, "%Y-%m-%d")
    .map(Some)
    .map_err(|_| error(Field::DueDate, "Due date must look like YYYY-MM-DD"))
}

/// Everyone who can be assigned a task: the owner first, then members.
///
/// Users are deduplicated by id, falling back to email when a populated
/// member lacks one.
pub fn project_members(project: &Project, members: &[User]) -> Vec<User> {
  let mut seen: Vec<String> = Vec::new();
  let mut result = Vec::new();

  let mut push = |user: User| {
    let identity = if user.id.is_empty() {
      user.email.clone()
    } else {
      user.id.clone()
    };
    if identity.is_empty() || seen.contains(&identity) {
      return;
    }
    seen.push(identity);
    result.push(user);
  };

  if let Some(owner) = project.created_by.as_ref().and_then(|r| r.populated()) {
    push(owner.clone());
  }
  for member in project.members.iter().filter_map(|r| r.populated()) {
    push(member.clone());
  }
  for member in members {
    push(member.clone());
  }

  result
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Ref;
  use pretty_assertions::assert_eq;

  fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
  }

  fn draft(title: &str, description: &str) -> TaskDraft {
    TaskDraft {
      title: title.to_string(),
      description: description.to_string(),
      ..TaskDraft::default()
    }
  }

  fn messages(result: Result<(), Vec<FieldError>>) -> Vec<&'static str> {
    result.unwrap_err().into_iter().map(|e| e.message).collect()
  }

  fn user(id: &str, email: &str) -> User {
    User {
      id: id.to_string(),
      name: String::new(),
      email: email.to_string(),
    }
  }

  #[test]
  fn test_valid_task() {
    let mut draft = draft("Fix login", "Session cookie expires too soon");
    draft.due_date = Some(today());
    assert_eq!(validate_task(&draft, today()), Ok(()));
  }

  #[test]
  fn test_missing_fields() {
    assert_eq!(
      messages(validate_task(&draft("  ", ""), today())),
      vec!["Task title is required", "Task description is required"]
    );
  }

  #[test]
  fn test_short_fields() {
    assert_eq!(
      messages(validate_task(&draft("ab", "too short"), today())),
      vec![
        "Title must be at least 3 characters",
        "Description must be at least 10 characters"
      ]
    );
  }

  #[test]
  fn test_due_date_in_past() {
    let mut draft = draft("Fix login", "Session cookie expires too soon");
    draft.due_date = today().pred_opt();
    let errors = validate_task(&draft, today()).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, Field::DueDate);
    assert_eq!(errors[0].to_string(), "Due date cannot be in the past");
  }

  #[test]
  fn test_project_title_required() {
    assert_eq!(
      messages(validate_project(&ProjectDraft::default())),
      vec!["Project title is required"]
    );
    let draft = ProjectDraft {
      title: "Apollo".to_string(),
      description: String::new(),
    };
    assert_eq!(validate_project(&draft), Ok(()));
  }

  #[test]
  fn test_parse_due_date() {
    assert_eq!(parse_due_date(""), Ok(None));
    assert_eq!(parse_due_date("2024-05-10"), Ok(Some(today())));
    assert!(parse_due_date("10/05/2024").is_err());
  }

  #[test]
  fn test_project_members_owner_first_without_duplicates() {
    let owner = user("u1", "ada@example.com");
    let project = Project {
      id: "p1".to_string(),
      title: "Apollo".to_string(),
      description: String::new(),
      status: None,
      created_by: Some(Ref::Populated(owner.clone())),
      members: vec![
        Ref::Populated(user("u2", "grace@example.com")),
        Ref::Populated(owner.clone()),
        Ref::Id("u3".to_string()),
      ],
      created_at: None,
    };
    let fetched = vec![user("u2", "grace@example.com"), user("u4", "alan@example.com")];

    let ids: Vec<String> = project_members(&project, &fetched)
      .into_iter()
      .map(|u| u.id)
      .collect();
    assert_eq!(ids, vec!["u1", "u2", "u4"]);
  }
}
