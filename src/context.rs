//! Shared handles passed to every view.

use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::api::types::User;
use crate::api::{ApiClient, ApiResult};
use crate::cache::{Mutation, ResourceCache, ResourceKey};
use crate::config::Config;
use crate::query::Query;
use crate::toast::ToastQueue;

pub type Cache = ResourceCache<ApiClient>;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AppContext {
  pub cache: Cache,
  pub toasts: ToastQueue,
  pub config: Arc<Config>,
}

impl AppContext {
  pub fn new(cache: Cache, toasts: ToastQueue, config: Config) -> Self {
    Self {
      cache,
      toasts,
      config: Arc::new(config),
    }
  }

  /// Build and start a query over `keys`, refetching when any is invalidated.
  pub fn query<T, F, Fut>(&self, keys: Vec<ResourceKey>, read: F) -> Query<T>
  where
    T: Send + 'static,
    F: Fn(Cache) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let cache = self.cache.clone();
    let mut query = Query::new(move || {
      let read = read(cache.clone());
      async move { read.await.map_err(|e| e.to_string()) }
    })
    .watching(self.cache.subscribe(keys));
    query.fetch();
    query
  }

  /// Query for the signed-in user
  pub fn session(&self) -> Query<Option<User>> {
    self.query(vec![ResourceKey::Session], |cache| async move {
      cache.session().await
    })
  }

  /// Run a mutation in the background and report the outcome as a toast.
  ///
  /// `success` is shown when the server accepts the write; failures show
  /// the server's message.
  pub fn submit(&self, mutation: Mutation, success: impl Into<String>) -> PendingMutation {
    let (tx, rx) = oneshot::channel();
    let cache = self.cache.clone();
    let toasts = self.toasts.clone();
    let success = success.into();

    tokio::spawn(async move {
      let name = mutation.name();
      let signing_in = matches!(mutation, Mutation::SignIn(_) | Mutation::SignUp(_));
      let result = cache.mutate(mutation).await;
      match &result {
        Ok(_) => {
          if !success.is_empty() {
            toasts.success(success);
          }
        }
        Err(e) if e.is_unauthenticated() && signing_in => {
          toasts.error(INVALID_CREDENTIALS);
        }
        Err(e) if e.is_unauthenticated() => {
          toasts.warning("Your session has expired, please sign in again");
        }
        Err(e) => {
          toasts.error(e.to_string());
        }
      }
      debug!(mutation = name, ok = result.is_ok(), "Mutation finished");
      // The view may be gone already
      let _ = tx.send(result);
    });

    PendingMutation { rx: Some(rx) }
  }
}

/// A write in flight; views keep one to disable their controls meanwhile.
pub struct PendingMutation {
  rx: Option<oneshot::Receiver<ApiResult<Value>>>,
}

impl PendingMutation {
  /// The result once the write finished; `None` while still running.
  pub fn poll(&mut self) -> Option<ApiResult<Value>> {
    let rx = self.rx.as_mut()?;
    match rx.try_recv() {
      Ok(result) => {
        self.rx = None;
        Some(result)
      }
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => {
        self.rx = None;
        Some(Err(crate::api::ApiError::request_failed(
          "Request was cancelled",
        )))
      }
    }
  }
}
