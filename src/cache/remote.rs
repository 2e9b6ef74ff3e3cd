//! The seam between the cache and whatever answers requests.

use async_trait::async_trait;
use serde_json::Value;

use crate::api::ApiResult;

use super::key::{Resource, ResourceKey};
use super::mutation::Mutation;

/// Request/response boundary consumed by [`ResourceCache`](super::ResourceCache).
///
/// The HTTP client implements it for the real service; tests implement it
/// in memory.
#[async_trait]
pub trait Remote: Send + Sync + 'static {
  /// Fetch the payload for one cache key
  async fn fetch(&self, key: &ResourceKey) -> ApiResult<Resource>;

  /// Perform a write and return the server's response body
  async fn execute(&self, mutation: &Mutation) -> ApiResult<Value>;
}
