use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failure classes of the remote boundary.
///
/// Callers branch on the class: `Unauthenticated` sends the user back to the
/// sign-in view, everything else is reported as a toast and leaves
/// navigation alone. Clone is required because one failed request is
/// delivered to every reader that was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// No session, or the session cookie expired
  #[error("Not signed in")]
  Unauthenticated,

  /// Validation, not-found and server errors
  #[error("{message}")]
  RequestFailed { status: Option<u16>, message: String },

  /// The server could not be reached at all
  #[error("Server unreachable: {0}")]
  Network(String),
}

impl ApiError {
  pub fn request_failed(message: impl Into<String>) -> Self {
    ApiError::RequestFailed {
      status: None,
      message: message.into(),
    }
  }

  pub fn is_unauthenticated(&self) -> bool {
    matches!(self, ApiError::Unauthenticated)
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_connect() || e.is_timeout() {
      ApiError::Network(e.to_string())
    } else if e.is_decode() {
      ApiError::request_failed(format!("Invalid response: {}", e))
    } else {
      ApiError::RequestFailed {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
      }
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(e: serde_json::Error) -> Self {
    ApiError::request_failed(format!("Invalid response: {}", e))
  }
}
