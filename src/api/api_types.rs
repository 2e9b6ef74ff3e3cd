//! Wire-level helpers for service responses.
//!
//! Endpoints are inconsistent about envelopes: `getproject` answers
//! `{ "project": {...} }` while `gettaskbyid` answers the task itself, and
//! list endpoints do either. Decoding goes through [`unwrap_envelope`] so
//! both shapes land in the same domain type.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use super::types::User;

/// Envelope keys tried for each resource, most specific first
pub const USER_KEYS: &[&str] = &["user", "data"];
pub const PROJECT_KEYS: &[&str] = &["project", "data"];
pub const PROJECTS_KEYS: &[&str] = &["projects", "data"];
pub const MEMBERS_KEYS: &[&str] = &["members", "data"];
pub const TASK_KEYS: &[&str] = &["task", "data"];
pub const TASKS_KEYS: &[&str] = &["tasks", "data"];

/// Decode `value` as `T`, looking inside the first envelope key present.
///
/// A bare payload is decoded as-is. An object holding one of `keys` is
/// decoded from that field.
pub fn unwrap_envelope<T: DeserializeOwned>(value: Value, keys: &[&str]) -> serde_json::Result<T> {
  if let Value::Object(mut map) = value {
    for key in keys {
      if let Some(inner) = map.remove(*key) {
        return serde_json::from_value(inner);
      }
    }
    return serde_json::from_value(Value::Object(map));
  }
  serde_json::from_value(value)
}

/// Error body sent with non-success statuses
#[derive(Debug, Default, Deserialize)]
pub struct ApiErrorBody {
  pub message: Option<String>,
  pub error: Option<String>,
}

impl ApiErrorBody {
  /// Best human-readable message, if the body carried one
  pub fn into_message(self) -> Option<String> {
    self.message.or(self.error).filter(|m| !m.trim().is_empty())
  }
}

/// `getmembers` may answer a list of users or a project-like object
/// carrying them, depending on the server version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiMembersResponse {
  List(Vec<User>),
  Project { members: Vec<User> },
}

impl ApiMembersResponse {
  pub fn into_members(self) -> Vec<User> {
    match self {
      ApiMembersResponse::List(users) => users,
      ApiMembersResponse::Project { members } => members,
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiAddMemberBody<'a> {
  pub email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRemoveMemberBody<'a> {
  pub user_id: &'a str,
}
