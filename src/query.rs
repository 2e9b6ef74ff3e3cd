//! Async query abstraction binding views to the resource cache.
//!
//! A `Query<T>` runs its fetcher on a spawned task and hands the result back
//! over a channel, so views can poll it from their tick handler without
//! blocking the render loop. A query may hold a cache [`Subscription`]; when
//! one of its keys is invalidated the next `poll()` refetches, and the last
//! good data stays visible until the new result lands.
//!
//! # Example
//!
//! ```ignore
//! let cache = ctx.cache.clone();
//! let mut query = Query::new(move || {
//!     let cache = cache.clone();
//!     async move { cache.projects().await.map_err(|e| e.to_string()) }
//! })
//! .watching(ctx.cache.subscribe(vec![ResourceKey::ProjectList]));
//!
//! query.fetch();
//!
//! // In the view's tick()
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::Subscription;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
pub struct Query<T> {
  state: QueryState<T>,
  /// Last successful data, shown while a refetch is running or failed
  previous: Option<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  subscription: Option<Subscription>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` starts a
  /// request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      previous: None,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      subscription: None,
    }
  }

  /// Refetch whenever the subscription reports one of its keys went stale.
  ///
  /// The subscription also keeps those cache entries alive for as long as
  /// the query exists.
  pub fn watching(mut self, subscription: Subscription) -> Self {
    self.subscription = Some(subscription);
    self
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Current data, or the last good data while reloading
  pub fn data(&self) -> Option<&T> {
    self.state.data().or(self.previous.as_ref())
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already loading or data exists.
  pub fn refetch(&mut self) {
    // Dropping the receiver discards the pending result
    self.receiver = None;
    self.start_fetch();
  }

  /// Poll for results and cache invalidations.
  ///
  /// Returns `true` if the state changed. Call this from the view's tick.
  pub fn poll(&mut self) -> bool {
    let stale = self
      .subscription
      .as_mut()
      .is_some_and(|subscription| subscription.take_invalidated());
    if stale {
      debug!("Watched cache keys invalidated, refetching");
      self.refetch();
      return true;
    }

    let Some(receiver) = &mut self.receiver else {
      return false;
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.previous = None;
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    if let QueryState::Success(data) = std::mem::replace(&mut self.state, QueryState::Loading) {
      self.previous = Some(data);
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      // Receiver may have been dropped by a refetch
      let _ = tx.send(future.await);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("previous", &self.previous)
      .field("watching", &self.subscription.as_ref().map(|s| s.keys()))
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Project, ProjectDraft};
  use crate::api::{ApiError, ApiResult};
  use crate::cache::{Mutation, Remote, Resource, ResourceCache, ResourceKey};
  use async_trait::async_trait;
  use serde_json::Value;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(counter.fetch_add(1, Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch was received
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_previous_data_survives_reload() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if n == 0 {
          Ok(n)
        } else {
          Err("offline".to_string())
        }
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(40)).await;
    query.poll();
    assert_eq!(query.data(), Some(&0));

    query.refetch();
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(40)).await;
    query.poll();
    assert_eq!(query.error(), Some("offline"));
    assert_eq!(query.data(), Some(&0));
  }

  /// Remote whose project list grows with every create
  #[derive(Default)]
  struct Projects {
    titles: std::sync::Mutex<Vec<String>>,
  }

  #[async_trait]
  impl Remote for Projects {
    async fn fetch(&self, _key: &ResourceKey) -> ApiResult<Resource> {
      let titles = self.titles.lock().unwrap().clone();
      Ok(Resource::Projects(
        titles
          .into_iter()
          .enumerate()
          .map(|(i, title)| Project {
            id: format!("p{}", i),
            title,
            description: String::new(),
            status: None,
            created_by: None,
            members: Vec::new(),
            created_at: None,
          })
          .collect(),
      ))
    }

    async fn execute(&self, mutation: &Mutation) -> ApiResult<Value> {
      match mutation {
        Mutation::CreateProject(draft) => {
          self.titles.lock().unwrap().push(draft.title.clone());
          Ok(Value::Null)
        }
        _ => Err(ApiError::request_failed("unsupported")),
      }
    }
  }

  #[tokio::test]
  async fn test_watching_query_refetches_after_invalidation() {
    let cache = ResourceCache::new(Projects::default());
    let reader = cache.clone();
    let mut query = Query::new(move || {
      let cache = reader.clone();
      async move {
        cache
          .projects()
          .await
          .map(|projects| projects.len())
          .map_err(|e| e.to_string())
      }
    })
    .watching(cache.subscribe(vec![ResourceKey::ProjectList]));

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&0));

    cache
      .mutate(Mutation::CreateProject(ProjectDraft {
        title: "Apollo".to_string(),
        description: String::new(),
      }))
      .await
      .unwrap();

    assert!(query.poll());
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&0));

    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&1));
  }
}
