use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::cache::{Mutation, Remote, Resource, ResourceKey};
use crate::config::ApiConfig;

use super::api_types::{
  unwrap_envelope, ApiAddMemberBody, ApiErrorBody, ApiMembersResponse, ApiRemoveMemberBody,
  MEMBERS_KEYS, PROJECTS_KEYS, PROJECT_KEYS, TASKS_KEYS, TASK_KEYS, USER_KEYS,
};
use super::error::{ApiError, ApiResult};
use super::types::{
  Credentials, Project, ProjectChanges, ProjectDraft, Registration, Task, TaskChanges, TaskDraft,
  User,
};

/// HTTP client for the project/task service.
///
/// The session lives in the client's cookie jar; no token is passed around.
/// Signing out swaps in a fresh client, which drops the jar.
#[derive(Clone)]
pub struct ApiClient {
  base: Url,
  timeout: Duration,
  http: Arc<RwLock<reqwest::Client>>,
}

fn build_http(timeout: Duration) -> reqwest::Result<reqwest::Client> {
  reqwest::Client::builder()
    .cookie_store(true)
    .timeout(timeout)
    .build()
}

/// Map a non-success status and its body to the error taxonomy
fn error_for_status(status: StatusCode, body: ApiErrorBody) -> ApiError {
  if status == StatusCode::UNAUTHORIZED {
    return ApiError::Unauthenticated;
  }
  let message = body.into_message().unwrap_or_else(|| {
    status
      .canonical_reason()
      .unwrap_or("Request failed")
      .to_string()
  });
  ApiError::RequestFailed {
    status: Some(status.as_u16()),
    message,
  }
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let mut base = config.url.trim().to_string();
    // Url::join replaces the last segment unless the base ends with '/'
    if !base.ends_with('/') {
      base.push('/');
    }
    let base = Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    let timeout = Duration::from_secs(config.timeout_secs);
    let http = build_http(timeout).map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      base,
      timeout,
      http: Arc::new(RwLock::new(http)),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> ApiResult<Url> {
    self
      .base
      .join(path)
      .map_err(|e| ApiError::request_failed(format!("Invalid endpoint {}: {}", path, e)))
  }

  fn http(&self) -> reqwest::Client {
    self
      .http
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  async fn send(&self, method: Method, path: &str, body: Option<Value>) -> ApiResult<Value> {
    let url = self.endpoint(path)?;
    debug!(%method, %url, "Request");

    let mut request: RequestBuilder = self.http().request(method, url);
    if let Some(body) = body {
      request = request.json(&body);
    }

    let response = request.send().await?;
    let status = response.status();
    debug!(status = status.as_u16(), path, "Response");

    if !status.is_success() {
      let body = response.json::<ApiErrorBody>().await.unwrap_or_default();
      return Err(error_for_status(status, body));
    }

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
      return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
  }

  async fn get(&self, path: &str) -> ApiResult<Value> {
    self.send(Method::GET, path, None).await
  }

  async fn post(&self, path: &str, body: impl Serialize) -> ApiResult<Value> {
    self
      .send(Method::POST, path, Some(serde_json::to_value(body)?))
      .await
  }

  async fn patch(&self, path: &str, body: impl Serialize) -> ApiResult<Value> {
    self
      .send(Method::PATCH, path, Some(serde_json::to_value(body)?))
      .await
  }

  async fn delete(&self, path: &str, body: Option<Value>) -> ApiResult<Value> {
    self.send(Method::DELETE, path, body).await
  }

  // ==========================================================================
  // Session
  // ==========================================================================

  /// Current user; `Unauthenticated` when there is no session
  pub async fn me(&self) -> ApiResult<User> {
    Ok(unwrap_envelope(self.get("auth/me").await?, USER_KEYS)?)
  }

  pub async fn sign_in(&self, credentials: &Credentials) -> ApiResult<Value> {
    self.post("auth/signin", credentials).await
  }

  pub async fn sign_up(&self, registration: &Registration) -> ApiResult<Value> {
    self.post("auth/signup", registration).await
  }

  /// Client-side only: the service keeps no server state to end
  pub fn sign_out(&self) -> ApiResult<Value> {
    let fresh = build_http(self.timeout)?;
    *self.http.write().unwrap_or_else(PoisonError::into_inner) = fresh;
    Ok(json!({ "message": "Logged out successfully" }))
  }

  // ==========================================================================
  // Projects
  // ==========================================================================

  pub async fn projects(&self) -> ApiResult<Vec<Project>> {
    Ok(unwrap_envelope(
      self.get("project/getprojects").await?,
      PROJECTS_KEYS,
    )?)
  }

  pub async fn project(&self, id: &str) -> ApiResult<Project> {
    let path = format!("project/getproject/{}", id);
    Ok(unwrap_envelope(self.get(&path).await?, PROJECT_KEYS)?)
  }

  pub async fn create_project(&self, draft: &ProjectDraft) -> ApiResult<Value> {
    self.post("project/createproject", draft).await
  }

  pub async fn update_project(&self, id: &str, changes: &ProjectChanges) -> ApiResult<Value> {
    self
      .patch(&format!("project/updateproject/{}", id), changes)
      .await
  }

  pub async fn delete_project(&self, id: &str) -> ApiResult<Value> {
    self
      .delete(&format!("project/deleteproject/{}", id), None)
      .await
  }

  pub async fn members(&self, project_id: &str) -> ApiResult<Vec<User>> {
    let path = format!("project/getmembers/{}", project_id);
    let response: ApiMembersResponse = unwrap_envelope(self.get(&path).await?, MEMBERS_KEYS)?;
    Ok(response.into_members())
  }

  pub async fn add_member(&self, project_id: &str, email: &str) -> ApiResult<Value> {
    self
      .post(
        &format!("project/addmember/{}", project_id),
        ApiAddMemberBody { email },
      )
      .await
  }

  pub async fn remove_member(&self, project_id: &str, user_id: &str) -> ApiResult<Value> {
    let body = serde_json::to_value(ApiRemoveMemberBody { user_id })?;
    self
      .delete(&format!("project/deletemember/{}", project_id), Some(body))
      .await
  }

  // ==========================================================================
  // Tasks
  // ==========================================================================

  pub async fn tasks(&self) -> ApiResult<Vec<Task>> {
    Ok(unwrap_envelope(self.get("task/gettasks").await?, TASKS_KEYS)?)
  }

  pub async fn project_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
    let path = format!("task/gettasks/{}", project_id);
    Ok(unwrap_envelope(self.get(&path).await?, TASKS_KEYS)?)
  }

  pub async fn task(&self, id: &str) -> ApiResult<Task> {
    let path = format!("task/gettaskbyid/{}", id);
    Ok(unwrap_envelope(self.get(&path).await?, TASK_KEYS)?)
  }

  pub async fn create_task(&self, project_id: &str, draft: &TaskDraft) -> ApiResult<Value> {
    self
      .post(&format!("task/createtask/{}", project_id), draft)
      .await
  }

  pub async fn update_task(&self, id: &str, changes: &TaskChanges) -> ApiResult<Value> {
    self.patch(&format!("task/updatetask/{}", id), changes).await
  }

  pub async fn delete_task(&self, id: &str) -> ApiResult<Value> {
    self.delete(&format!("task/deleteTask/{}", id), None).await
  }
}

#[async_trait]
impl Remote for ApiClient {
  async fn fetch(&self, key: &ResourceKey) -> ApiResult<Resource> {
    Ok(match key {
      ResourceKey::Session => Resource::Session(Some(self.me().await?)),
      ResourceKey::ProjectList => Resource::Projects(self.projects().await?),
      ResourceKey::Project(id) => Resource::Project(Box::new(self.project(id).await?)),
      ResourceKey::Members(id) => Resource::Members(self.members(id).await?),
      ResourceKey::TaskList => Resource::Tasks(self.tasks().await?),
      ResourceKey::TasksByProject(id) => Resource::Tasks(self.project_tasks(id).await?),
      ResourceKey::Task(id) => Resource::Task(Box::new(self.task(id).await?)),
    })
  }

  async fn execute(&self, mutation: &Mutation) -> ApiResult<Value> {
    match mutation {
      Mutation::SignIn(credentials) => self.sign_in(credentials).await,
      Mutation::SignUp(registration) => self.sign_up(registration).await,
      Mutation::SignOut => self.sign_out(),
      Mutation::CreateProject(draft) => self.create_project(draft).await,
      Mutation::UpdateProject { id, changes } => self.update_project(id, changes).await,
      Mutation::DeleteProject { id } => self.delete_project(id).await,
      Mutation::AddMember { project_id, email } => self.add_member(project_id, email).await,
      Mutation::RemoveMember {
        project_id,
        user_id,
      } => self.remove_member(project_id, user_id).await,
      Mutation::CreateTask { project_id, task } => self.create_task(project_id, task).await,
      Mutation::UpdateTask { id, changes, .. } => self.update_task(id, changes).await,
      Mutation::DeleteTask { id, .. } => self.delete_task(id).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(url: &str) -> ApiClient {
    ApiClient::new(&ApiConfig {
      url: url.to_string(),
      ..ApiConfig::default()
    })
    .unwrap()
  }

  #[test]
  fn test_endpoint_keeps_base_path() {
    let client = client("http://localhost:8000/api");
    assert_eq!(
      client.endpoint("project/getprojects").unwrap().as_str(),
      "http://localhost:8000/api/project/getprojects"
    );
  }

  #[test]
  fn test_endpoint_with_trailing_slash() {
    let client = client("https://tasks.example.com/api/");
    assert_eq!(
      client.endpoint("task/gettaskbyid/t1").unwrap().as_str(),
      "https://tasks.example.com/api/task/gettaskbyid/t1"
    );
  }

  #[test]
  fn test_invalid_url_is_rejected() {
    let result = ApiClient::new(&ApiConfig {
      url: "not a url".to_string(),
      ..ApiConfig::default()
    });
    assert!(result.is_err());
  }

  #[test]
  fn test_unauthorized_maps_to_unauthenticated() {
    let err = error_for_status(StatusCode::UNAUTHORIZED, ApiErrorBody::default());
    assert_eq!(err, ApiError::Unauthenticated);
  }

  #[test]
  fn test_server_message_is_kept() {
    let body = ApiErrorBody {
      message: Some("Task title is required".to_string()),
      error: None,
    };
    assert_eq!(
      error_for_status(StatusCode::BAD_REQUEST, body),
      ApiError::RequestFailed {
        status: Some(400),
        message: "Task title is required".to_string(),
      }
    );
  }

  #[test]
  fn test_missing_message_uses_reason() {
    assert_eq!(
      error_for_status(StatusCode::NOT_FOUND, ApiErrorBody::default()),
      ApiError::RequestFailed {
        status: Some(404),
        message: "Not Found".to_string(),
      }
    );
  }
}
