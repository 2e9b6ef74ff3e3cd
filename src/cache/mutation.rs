//! Write operations and the cache entries each one makes stale.

use crate::api::types::{
  Credentials, ProjectChanges, ProjectDraft, Registration, TaskChanges, TaskDraft,
};

use super::key::ResourceKey;

/// A create/update/delete against the remote boundary.
///
/// Mutations are pessimistic: nothing in the cache changes until the server
/// confirms, and then only by invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
  SignIn(Credentials),
  SignUp(Registration),
  SignOut,
  CreateProject(ProjectDraft),
  UpdateProject {
    id: String,
    changes: ProjectChanges,
  },
  DeleteProject {
    id: String,
  },
  AddMember {
    project_id: String,
    email: String,
  },
  RemoveMember {
    project_id: String,
    user_id: String,
  },
  CreateTask {
    project_id: String,
    task: TaskDraft,
  },
  /// `project_id` is the owning project when the caller knows it
  UpdateTask {
    id: String,
    project_id: Option<String>,
    changes: TaskChanges,
  },
  DeleteTask {
    id: String,
    project_id: Option<String>,
  },
}

/// What a successful mutation makes stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
  Keys(Vec<ResourceKey>),
  /// The identity behind every entry changed
  Everything,
}

impl Mutation {
  /// Short name for logs
  pub fn name(&self) -> &'static str {
    match self {
      Mutation::SignIn(_) => "sign_in",
      Mutation::SignUp(_) => "sign_up",
      Mutation::SignOut => "sign_out",
      Mutation::CreateProject(_) => "create_project",
      Mutation::UpdateProject { .. } => "update_project",
      Mutation::DeleteProject { .. } => "delete_project",
      Mutation::AddMember { .. } => "add_member",
      Mutation::RemoveMember { .. } => "remove_member",
      Mutation::CreateTask { .. } => "create_task",
      Mutation::UpdateTask { .. } => "update_task",
      Mutation::DeleteTask { .. } => "delete_task",
    }
  }

  pub fn invalidation(&self) -> Invalidation {
    use ResourceKey::*;

    let keys = match self {
      Mutation::SignIn(_) | Mutation::SignUp(_) | Mutation::SignOut => {
        return Invalidation::Everything
      }
      Mutation::CreateProject(_) | Mutation::DeleteProject { .. } => vec![ProjectList],
      Mutation::UpdateProject { id, .. } => vec![Project(id.clone()), ProjectList],
      Mutation::AddMember { project_id, .. } | Mutation::RemoveMember { project_id, .. } => {
        vec![Members(project_id.clone()), Project(project_id.clone())]
      }
      Mutation::CreateTask { project_id, .. } => {
        vec![TaskList, TasksByProject(project_id.clone())]
      }
      Mutation::UpdateTask { id, project_id, .. } | Mutation::DeleteTask { id, project_id } => {
        let mut keys = vec![TaskList];
        if let Some(project_id) = project_id {
          keys.push(TasksByProject(project_id.clone()));
        }
        keys.push(Task(id.clone()));
        keys
      }
    };
    Invalidation::Keys(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::TaskStatus;
  use pretty_assertions::assert_eq;

  fn keys(mutation: Mutation) -> Vec<ResourceKey> {
    match mutation.invalidation() {
      Invalidation::Keys(keys) => keys,
      Invalidation::Everything => panic!("expected key list"),
    }
  }

  #[test]
  fn test_project_create_and_delete_hit_list_only() {
    assert_eq!(
      keys(Mutation::CreateProject(ProjectDraft::default())),
      vec![ResourceKey::ProjectList]
    );
    assert_eq!(
      keys(Mutation::DeleteProject {
        id: "p1".to_string()
      }),
      vec![ResourceKey::ProjectList]
    );
  }

  #[test]
  fn test_project_update_hits_entry_and_list() {
    assert_eq!(
      keys(Mutation::UpdateProject {
        id: "p1".to_string(),
        changes: ProjectChanges::default(),
      }),
      vec![ResourceKey::Project("p1".to_string()), ResourceKey::ProjectList]
    );
  }

  #[test]
  fn test_membership_hits_members_and_project() {
    assert_eq!(
      keys(Mutation::RemoveMember {
        project_id: "p1".to_string(),
        user_id: "u2".to_string(),
      }),
      vec![
        ResourceKey::Members("p1".to_string()),
        ResourceKey::Project("p1".to_string())
      ]
    );
  }

  #[test]
  fn test_task_update_with_known_project() {
    assert_eq!(
      keys(Mutation::UpdateTask {
        id: "t1".to_string(),
        project_id: Some("p1".to_string()),
        changes: TaskChanges::status(TaskStatus::Completed),
      }),
      vec![
        ResourceKey::TaskList,
        ResourceKey::TasksByProject("p1".to_string()),
        ResourceKey::Task("t1".to_string())
      ]
    );
  }

  #[test]
  fn test_task_delete_without_project() {
    assert_eq!(
      keys(Mutation::DeleteTask {
        id: "t1".to_string(),
        project_id: None,
      }),
      vec![ResourceKey::TaskList, ResourceKey::Task("t1".to_string())]
    );
  }

  #[test]
  fn test_session_changes_invalidate_everything() {
    assert_eq!(Mutation::SignOut.invalidation(), Invalidation::Everything);
  }
}
