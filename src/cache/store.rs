//! Resource cache that coalesces reads and invalidates after writes.

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::api::types::{Project, Task, User};
use crate::api::{ApiError, ApiResult};

use super::key::{EntryStatus, Resource, ResourceKey};
use super::mutation::{Invalidation, Mutation};
use super::remote::Remote;

type SharedFetch = Shared<BoxFuture<'static, ApiResult<Resource>>>;
type Entries = Arc<Mutex<HashMap<ResourceKey, CacheEntry>>>;

/// Notifications broadcast to subscribers and the app
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// Entry was marked stale; its next read refetches
  Invalidated(ResourceKey),
  /// A fetch committed fresh data
  Updated(ResourceKey),
  /// Every entry was dropped (identity changed)
  Reset,
  /// A request was rejected because the session is gone
  Unauthenticated,
}

struct InFlight {
  id: u64,
  fetch: SharedFetch,
  /// Invalidated while running; its result is never committed
  stale: bool,
}

enum ReadStep {
  Done(Resource),
  Await(u64, SharedFetch),
  /// Let an invalidated fetch finish before starting the next one
  Drain(u64, SharedFetch),
}

#[derive(Default)]
struct CacheEntry {
  status: EntryStatus,
  value: Option<Resource>,
  subscribers: usize,
  fetched_at: Option<Instant>,
  in_flight: Option<InFlight>,
}

struct Inner<R> {
  remote: Arc<R>,
  entries: Entries,
  events: broadcast::Sender<CacheEvent>,
  next_fetch: AtomicU64,
  keep_unused: Duration,
}

/// Single source of truth for server-derived data.
///
/// Reads are served from memory while an entry is ready. A miss starts one
/// fetch per key; concurrent readers of that key await the same shared
/// future, so the remote sees a single request. Writes go through
/// [`mutate`](Self::mutate), which invalidates the entries named by the
/// mutation's rules once the server confirms.
pub struct ResourceCache<R: Remote> {
  inner: Arc<Inner<R>>,
}

impl<R: Remote> ResourceCache<R> {
  pub fn new(remote: R) -> Self {
    let (events, _) = broadcast::channel(256);
    Self {
      inner: Arc::new(Inner {
        remote: Arc::new(remote),
        entries: Arc::new(Mutex::new(HashMap::new())),
        events,
        next_fetch: AtomicU64::new(1),
        keep_unused: Duration::from_secs(60),
      }),
    }
  }

  /// How long an entry without subscribers is served before refetching.
  pub fn with_keep_unused(mut self, keep_unused: Duration) -> Self {
    if let Some(inner) = Arc::get_mut(&mut self.inner) {
      inner.keep_unused = keep_unused;
    }
    self
  }

  pub fn remote(&self) -> &R {
    &self.inner.remote
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<ResourceKey, CacheEntry>> {
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn emit(&self, event: CacheEvent) {
    // No receivers is fine
    let _ = self.inner.events.send(event);
  }

  /// Receive invalidation, update and session events
  pub fn events(&self) -> broadcast::Receiver<CacheEvent> {
    self.inner.events.subscribe()
  }

  fn fresh_value(&self, entry: &CacheEntry) -> Option<Resource> {
    if entry.status != EntryStatus::Ready {
      return None;
    }
    let retained = entry.subscribers > 0
      || entry
        .fetched_at
        .is_some_and(|at| at.elapsed() < self.inner.keep_unused);
    if retained {
      entry.value.clone()
    } else {
      None
    }
  }

  /// Return the cached payload for `key`, fetching it when not ready.
  ///
  /// At most one request per key is ever in flight. A fetch invalidated
  /// while running is awaited, then replaced by a single fresh one.
  pub async fn read(&self, key: &ResourceKey) -> ApiResult<Resource> {
    loop {
      match self.next_step(key) {
        ReadStep::Done(value) => return Ok(value),
        ReadStep::Await(fetch_id, fetch) => {
          let result = fetch.await;
          self.settle(key, fetch_id, &result);
          return result;
        }
        ReadStep::Drain(fetch_id, fetch) => {
          debug!(%key, "Waiting for invalidated request");
          let _ = fetch.await;
          self.discard(key, fetch_id);
        }
      }
    }
  }

  fn next_step(&self, key: &ResourceKey) -> ReadStep {
    let mut entries = self.lock();
    let entry = entries.entry(key.clone()).or_default();

    if let Some(value) = self.fresh_value(entry) {
      return ReadStep::Done(value);
    }

    match &entry.in_flight {
      Some(in_flight) if in_flight.stale => ReadStep::Drain(in_flight.id, in_flight.fetch.clone()),
      Some(in_flight) => {
        debug!(%key, "Joining in-flight request");
        ReadStep::Await(in_flight.id, in_flight.fetch.clone())
      }
      None => {
        let id = self.inner.next_fetch.fetch_add(1, Ordering::Relaxed);
        let fetch = self.start_fetch(key.clone());
        entry.in_flight = Some(InFlight {
          id,
          fetch: fetch.clone(),
          stale: false,
        });
        entry.status = EntryStatus::Loading;
        ReadStep::Await(id, fetch)
      }
    }
  }

  /// Forget a finished fetch that was invalidated while running.
  fn discard(&self, key: &ResourceKey, fetch_id: u64) {
    let mut entries = self.lock();
    if let Some(entry) = entries.get_mut(key) {
      if entry.in_flight.as_ref().map(|f| f.id) == Some(fetch_id) {
        entry.in_flight = None;
      }
    }
  }

  fn start_fetch(&self, key: ResourceKey) -> SharedFetch {
    let remote = Arc::clone(&self.inner.remote);
    async move {
      debug!(%key, "Fetching");
      match remote.fetch(&key).await {
        // No session is a normal state, not a failure
        Err(ApiError::Unauthenticated) if key == ResourceKey::Session => Ok(Resource::Session(None)),
        other => other,
      }
    }
    .boxed()
    .shared()
  }

  /// Commit a finished fetch, unless the entry moved on while it ran.
  fn settle(&self, key: &ResourceKey, fetch_id: u64, result: &ApiResult<Resource>) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(key) else {
      return;
    };
    // Already committed by another reader
    if entry.in_flight.as_ref().map(|f| f.id) != Some(fetch_id) {
      return;
    }
    if entry.in_flight.take().is_some_and(|f| f.stale) {
      debug!(%key, "Dropping result invalidated mid-flight");
      return;
    }

    match result {
      Ok(value) => {
        entry.value = Some(value.clone());
        entry.status = EntryStatus::Ready;
        entry.fetched_at = Some(Instant::now());
        drop(entries);
        self.emit(CacheEvent::Updated(key.clone()));
      }
      Err(e) => {
        warn!(%key, error = %e, "Fetch failed");
        entry.status = EntryStatus::Error(e.to_string());
        drop(entries);
        if e.is_unauthenticated() {
          self.emit(CacheEvent::Unauthenticated);
        }
      }
    }
  }

  /// Perform a write; on success invalidate the entries it affects.
  ///
  /// On failure the cache is left exactly as it was.
  pub async fn mutate(&self, mutation: Mutation) -> ApiResult<Value> {
    info!(mutation = mutation.name(), "Submitting mutation");

    match self.inner.remote.execute(&mutation).await {
      Ok(body) => {
        match mutation.invalidation() {
          Invalidation::Keys(keys) => self.invalidate(&keys),
          Invalidation::Everything => self.reset(),
        }
        Ok(body)
      }
      Err(e) => {
        warn!(mutation = mutation.name(), error = %e, "Mutation failed");
        if e.is_unauthenticated() {
          self.emit(CacheEvent::Unauthenticated);
        }
        Err(e)
      }
    }
  }

  /// Mark entries stale so their next read refetches.
  ///
  /// A fetch still running for one of these keys will not be committed.
  pub fn invalidate(&self, keys: &[ResourceKey]) {
    {
      let mut entries = self.lock();
      for key in keys {
        if let Some(entry) = entries.get_mut(key) {
          entry.status = EntryStatus::Uninitialized;
          mark_stale(entry);
        }
      }
    }
    for key in keys {
      info!(%key, "Invalidated");
      self.emit(CacheEvent::Invalidated(key.clone()));
    }
  }

  /// Drop every payload, keeping subscriber counts.
  pub fn reset(&self) {
    {
      let mut entries = self.lock();
      for entry in entries.values_mut() {
        entry.status = EntryStatus::Uninitialized;
        entry.value = None;
        entry.fetched_at = None;
        mark_stale(entry);
      }
    }
    info!("Cache reset");
    self.emit(CacheEvent::Reset);
  }

  /// Evict idle entries nobody subscribes to. Returns how many went.
  pub fn prune(&self) -> usize {
    let keep_unused = self.inner.keep_unused;
    let mut entries = self.lock();
    let before = entries.len();
    entries.retain(|_, entry| {
      entry.subscribers > 0
        || entry.in_flight.is_some()
        || (entry.status == EntryStatus::Ready
          && entry.fetched_at.is_some_and(|at| at.elapsed() < keep_unused))
    });
    let evicted = before - entries.len();
    if evicted > 0 {
      debug!(evicted, "Pruned cache entries");
    }
    evicted
  }

  /// Register interest in `keys` until the returned guard is dropped.
  pub fn subscribe(&self, keys: Vec<ResourceKey>) -> Subscription {
    {
      let mut entries = self.lock();
      for key in &keys {
        entries.entry(key.clone()).or_default().subscribers += 1;
      }
    }
    Subscription {
      keys,
      events: self.inner.events.subscribe(),
      entries: Arc::downgrade(&self.inner.entries),
    }
  }

  // ==========================================================================
  // Typed reads
  // ==========================================================================

  /// Current user, or `None` when nobody is signed in
  pub async fn session(&self) -> ApiResult<Option<User>> {
    let key = ResourceKey::Session;
    match self.read(&key).await? {
      Resource::Session(user) => Ok(user),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn projects(&self) -> ApiResult<Vec<Project>> {
    let key = ResourceKey::ProjectList;
    match self.read(&key).await? {
      Resource::Projects(projects) => Ok(projects),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn project(&self, id: &str) -> ApiResult<Project> {
    let key = ResourceKey::Project(id.to_string());
    match self.read(&key).await? {
      Resource::Project(project) => Ok(*project),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn members(&self, project_id: &str) -> ApiResult<Vec<User>> {
    let key = ResourceKey::Members(project_id.to_string());
    match self.read(&key).await? {
      Resource::Members(members) => Ok(members),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn tasks(&self) -> ApiResult<Vec<Task>> {
    let key = ResourceKey::TaskList;
    match self.read(&key).await? {
      Resource::Tasks(tasks) => Ok(tasks),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn project_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
    let key = ResourceKey::TasksByProject(project_id.to_string());
    match self.read(&key).await? {
      Resource::Tasks(tasks) => Ok(tasks),
      other => Err(unexpected(&key, &other)),
    }
  }

  pub async fn task(&self, id: &str) -> ApiResult<Task> {
    let key = ResourceKey::Task(id.to_string());
    match self.read(&key).await? {
      Resource::Task(task) => Ok(*task),
      other => Err(unexpected(&key, &other)),
    }
  }
}

/// Entry inspection for tests
#[cfg(test)]
impl<R: Remote> ResourceCache<R> {
  fn status(&self, key: &ResourceKey) -> EntryStatus {
    self
      .lock()
      .get(key)
      .map(|entry| entry.status.clone())
      .unwrap_or_default()
  }

  fn subscriber_count(&self, key: &ResourceKey) -> usize {
    self.lock().get(key).map_or(0, |entry| entry.subscribers)
  }

  /// Last-known payload regardless of status
  fn peek(&self, key: &ResourceKey) -> Option<Resource> {
    self.lock().get(key).and_then(|entry| entry.value.clone())
  }
}

impl<R: Remote> Clone for ResourceCache<R> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

fn mark_stale(entry: &mut CacheEntry) {
  if let Some(in_flight) = &mut entry.in_flight {
    in_flight.stale = true;
  }
}

fn unexpected(key: &ResourceKey, resource: &Resource) -> ApiError {
  ApiError::request_failed(format!(
    "Unexpected {} payload for {}",
    resource.kind(),
    key
  ))
}

/// Guard counting a view as a consumer of some cache keys.
pub struct Subscription {
  keys: Vec<ResourceKey>,
  events: broadcast::Receiver<CacheEvent>,
  entries: Weak<Mutex<HashMap<ResourceKey, CacheEntry>>>,
}

impl Subscription {
  pub fn keys(&self) -> &[ResourceKey] {
    &self.keys
  }

  /// Drain pending events; true if any watched key went stale.
  pub fn take_invalidated(&mut self) -> bool {
    use broadcast::error::TryRecvError;

    let mut stale = false;
    loop {
      match self.events.try_recv() {
        Ok(CacheEvent::Invalidated(key)) if self.keys.contains(&key) => stale = true,
        Ok(CacheEvent::Reset) => stale = true,
        Ok(_) => {}
        // Missed events may have included ours
        Err(TryRecvError::Lagged(_)) => stale = true,
        Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
      }
    }
    stale
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(entries) = self.entries.upgrade() else {
      return;
    };
    let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
    for key in &self.keys {
      if let Some(entry) = entries.get_mut(key) {
        entry.subscribers = entry.subscribers.saturating_sub(1);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{ProjectChanges, ProjectDraft, Ref};
  use async_trait::async_trait;
  use pretty_assertions::assert_eq;
  use serde_json::json;
  use std::sync::atomic::AtomicUsize;

  fn user(id: &str) -> User {
    User {
      id: id.to_string(),
      name: id.to_uppercase(),
      email: format!("{}@example.com", id),
    }
  }

  fn project(id: &str, title: &str) -> Project {
    Project {
      id: id.to_string(),
      title: title.to_string(),
      description: String::new(),
      status: None,
      created_by: Some(Ref::Id("u1".to_string())),
      members: Vec::new(),
      created_at: None,
    }
  }

  #[derive(Default)]
  struct Server {
    projects: Vec<Project>,
    members: HashMap<String, Vec<User>>,
    session: Option<User>,
  }

  /// In-memory remote counting fetches per key
  #[derive(Default)]
  struct FakeRemote {
    server: Mutex<Server>,
    fetches: Mutex<HashMap<ResourceKey, usize>>,
    writes: AtomicUsize,
    /// Requests currently running, and the most seen at once
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Option<Duration>,
    fail_writes: bool,
    unauthenticated_reads: bool,
  }

  impl FakeRemote {
    fn seeded() -> Self {
      let mut members = HashMap::new();
      members.insert("p1".to_string(), vec![user("u1"), user("u2")]);
      Self {
        server: Mutex::new(Server {
          projects: vec![project("p1", "Apollo"), project("p2", "Gemini")],
          members,
          session: Some(user("u1")),
        }),
        ..Self::default()
      }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
      self.delay = Some(delay);
      self
    }

    fn fetch_count(&self, key: &ResourceKey) -> usize {
      self.fetches.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn max_concurrent(&self) -> usize {
      self.max_active.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Remote for FakeRemote {
    async fn fetch(&self, key: &ResourceKey) -> ApiResult<Resource> {
      *self.fetches.lock().unwrap().entry(key.clone()).or_default() += 1;
      let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
      self.max_active.fetch_max(running, Ordering::SeqCst);
      if let Some(delay) = self.delay {
        tokio::time::sleep(delay).await;
      }
      self.active.fetch_sub(1, Ordering::SeqCst);
      if self.unauthenticated_reads {
        return Err(ApiError::Unauthenticated);
      }

      let server = self.server.lock().unwrap();
      match key {
        ResourceKey::Session => Ok(Resource::Session(server.session.clone())),
        ResourceKey::ProjectList => Ok(Resource::Projects(server.projects.clone())),
        ResourceKey::Project(id) => server
          .projects
          .iter()
          .find(|p| &p.id == id)
          .map(|p| Resource::Project(Box::new(p.clone())))
          .ok_or_else(|| ApiError::RequestFailed {
            status: Some(404),
            message: "Project not found".to_string(),
          }),
        ResourceKey::Members(id) => Ok(Resource::Members(
          server.members.get(id).cloned().unwrap_or_default(),
        )),
        _ => Ok(Resource::Tasks(Vec::new())),
      }
    }

    async fn execute(&self, mutation: &Mutation) -> ApiResult<Value> {
      self.writes.fetch_add(1, Ordering::SeqCst);
      if self.fail_writes {
        return Err(ApiError::request_failed("Title is required"));
      }

      let mut server = self.server.lock().unwrap();
      match mutation {
        Mutation::CreateProject(draft) => {
          let id = format!("p{}", server.projects.len() + 1);
          server.projects.push(project(&id, &draft.title));
          Ok(json!({ "project": { "_id": id } }))
        }
        Mutation::UpdateProject { id, changes } => {
          let project = server
            .projects
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| ApiError::request_failed("Project not found"))?;
          if let Some(title) = &changes.title {
            project.title = title.clone();
          }
          Ok(json!({ "project": { "_id": id } }))
        }
        Mutation::RemoveMember {
          project_id,
          user_id,
        } => {
          if let Some(members) = server.members.get_mut(project_id) {
            members.retain(|m| &m.id != user_id);
          }
          Ok(json!({ "message": "Member removed" }))
        }
        Mutation::SignOut => {
          server.session = None;
          Ok(json!({}))
        }
        _ => Ok(json!({})),
      }
    }
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_request() {
    let cache = ResourceCache::new(FakeRemote::seeded().with_delay(Duration::from_millis(20)));

    let (first, second) = tokio::join!(cache.projects(), cache.projects());

    assert_eq!(first.unwrap().len(), 2);
    assert_eq!(second.unwrap().len(), 2);
    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 1);
    assert_eq!(cache.status(&ResourceKey::ProjectList), EntryStatus::Ready);
  }

  #[tokio::test]
  async fn test_ready_entry_is_served_from_memory() {
    let cache = ResourceCache::new(FakeRemote::seeded());

    cache.projects().await.unwrap();
    cache.projects().await.unwrap();

    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 1);
  }

  #[tokio::test]
  async fn test_distinct_keys_fetch_separately() {
    let cache = ResourceCache::new(FakeRemote::seeded());

    cache.project("p1").await.unwrap();
    cache.project("p2").await.unwrap();

    assert_eq!(
      cache
        .remote()
        .fetch_count(&ResourceKey::Project("p1".to_string())),
      1
    );
    assert_eq!(
      cache
        .remote()
        .fetch_count(&ResourceKey::Project("p2".to_string())),
      1
    );
  }

  #[tokio::test]
  async fn test_project_update_refreshes_entry_and_list() {
    let cache = ResourceCache::new(FakeRemote::seeded());
    assert_eq!(cache.project("p1").await.unwrap().title, "Apollo");
    cache.projects().await.unwrap();

    cache
      .mutate(Mutation::UpdateProject {
        id: "p1".to_string(),
        changes: ProjectChanges {
          title: Some("Artemis".to_string()),
          ..ProjectChanges::default()
        },
      })
      .await
      .unwrap();

    let project_key = ResourceKey::Project("p1".to_string());
    assert_eq!(cache.status(&project_key), EntryStatus::Uninitialized);
    assert_eq!(
      cache.status(&ResourceKey::ProjectList),
      EntryStatus::Uninitialized
    );

    assert_eq!(cache.project("p1").await.unwrap().title, "Artemis");
    let titles: Vec<String> = cache
      .projects()
      .await
      .unwrap()
      .into_iter()
      .map(|p| p.title)
      .collect();
    assert_eq!(titles, vec!["Artemis".to_string(), "Gemini".to_string()]);
    assert_eq!(cache.remote().fetch_count(&project_key), 2);
    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 2);
  }

  #[tokio::test]
  async fn test_failed_mutation_leaves_cache_alone() {
    let remote = FakeRemote {
      fail_writes: true,
      ..FakeRemote::seeded()
    };
    let cache = ResourceCache::new(remote);
    cache.projects().await.unwrap();

    let err = cache
      .mutate(Mutation::CreateProject(ProjectDraft::default()))
      .await
      .unwrap_err();

    assert_eq!(err, ApiError::request_failed("Title is required"));
    assert_eq!(cache.status(&ResourceKey::ProjectList), EntryStatus::Ready);
    cache.projects().await.unwrap();
    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 1);
  }

  #[tokio::test]
  async fn test_removed_member_disappears_on_next_read() {
    let cache = ResourceCache::new(FakeRemote::seeded());
    let before: Vec<String> = cache
      .members("p1")
      .await
      .unwrap()
      .into_iter()
      .map(|u| u.id)
      .collect();
    assert_eq!(before, vec!["u1".to_string(), "u2".to_string()]);

    cache
      .mutate(Mutation::RemoveMember {
        project_id: "p1".to_string(),
        user_id: "u2".to_string(),
      })
      .await
      .unwrap();

    let after: Vec<String> = cache
      .members("p1")
      .await
      .unwrap()
      .into_iter()
      .map(|u| u.id)
      .collect();
    assert_eq!(after, vec!["u1".to_string()]);
  }

  #[tokio::test]
  async fn test_unauthenticated_session_is_no_session() {
    let remote = FakeRemote {
      unauthenticated_reads: true,
      ..FakeRemote::seeded()
    };
    let cache = ResourceCache::new(remote);
    let mut events = cache.events();

    assert_eq!(cache.session().await.unwrap(), None);
    assert_eq!(cache.status(&ResourceKey::Session), EntryStatus::Ready);
    // Only Updated, never Unauthenticated, for the session key
    assert_eq!(
      events.try_recv().unwrap(),
      CacheEvent::Updated(ResourceKey::Session)
    );
    assert!(events.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_unauthenticated_read_is_broadcast() {
    let remote = FakeRemote {
      unauthenticated_reads: true,
      ..FakeRemote::seeded()
    };
    let cache = ResourceCache::new(remote);
    let mut events = cache.events();

    let err = cache.projects().await.unwrap_err();

    assert!(err.is_unauthenticated());
    assert_eq!(events.try_recv().unwrap(), CacheEvent::Unauthenticated);
    assert!(matches!(
      cache.status(&ResourceKey::ProjectList),
      EntryStatus::Error(_)
    ));
  }

  #[tokio::test]
  async fn test_fetch_invalidated_mid_flight_is_not_committed() {
    let cache = ResourceCache::new(FakeRemote::seeded().with_delay(Duration::from_millis(30)));
    let key = ResourceKey::ProjectList;

    let (result, _) = tokio::join!(cache.read(&key), async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      cache.invalidate(&[key.clone()]);
    });

    assert!(result.is_ok());
    assert_eq!(cache.status(&key), EntryStatus::Uninitialized);
    cache.read(&key).await.unwrap();
    assert_eq!(cache.remote().fetch_count(&key), 2);
  }

  #[tokio::test]
  async fn test_read_after_mid_flight_invalidation_waits_for_old_request() {
    let cache = ResourceCache::new(FakeRemote::seeded().with_delay(Duration::from_millis(50)));
    let key = ResourceKey::ProjectList;

    let first = tokio::spawn({
      let cache = cache.clone();
      let key = key.clone();
      async move { cache.read(&key).await }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;
    cache.invalidate(&[key.clone()]);
    let second = tokio::spawn({
      let cache = cache.clone();
      let key = key.clone();
      async move { cache.read(&key).await }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(cache.remote().fetch_count(&key), 1);

    assert!(first.await.unwrap().is_ok());
    assert!(second.await.unwrap().is_ok());
    assert_eq!(cache.remote().fetch_count(&key), 2);
    assert_eq!(cache.remote().max_concurrent(), 1);
    assert_eq!(cache.status(&key), EntryStatus::Ready);
  }

  #[tokio::test]
  async fn test_readers_after_reset_share_one_fresh_request() {
    let cache = ResourceCache::new(FakeRemote::seeded().with_delay(Duration::from_millis(30)));
    let key = ResourceKey::Session;

    let (old, (again, other)) = tokio::join!(cache.read(&key), async {
      tokio::time::sleep(Duration::from_millis(5)).await;
      cache.reset();
      tokio::join!(cache.read(&key), cache.read(&key))
    });

    assert!(old.is_ok());
    assert!(again.is_ok());
    assert!(other.is_ok());
    assert_eq!(cache.remote().fetch_count(&key), 2);
    assert_eq!(cache.remote().max_concurrent(), 1);
  }

  #[tokio::test]
  async fn test_subscription_counts_and_reports_invalidation() {
    let cache = ResourceCache::new(FakeRemote::seeded());
    let mut subscription = cache.subscribe(vec![ResourceKey::ProjectList]);
    assert_eq!(cache.subscriber_count(&ResourceKey::ProjectList), 1);
    assert!(!subscription.take_invalidated());

    cache
      .mutate(Mutation::CreateProject(ProjectDraft {
        title: "Mercury".to_string(),
        description: String::new(),
      }))
      .await
      .unwrap();
    assert!(subscription.take_invalidated());
    assert!(!subscription.take_invalidated());

    drop(subscription);
    assert_eq!(cache.subscriber_count(&ResourceKey::ProjectList), 0);
  }

  #[tokio::test]
  async fn test_unrelated_invalidation_is_ignored() {
    let cache = ResourceCache::new(FakeRemote::seeded());
    let mut subscription = cache.subscribe(vec![ResourceKey::TaskList]);

    cache.invalidate(&[ResourceKey::ProjectList]);

    assert!(!subscription.take_invalidated());
  }

  #[tokio::test]
  async fn test_unsubscribed_entries_expire() {
    let cache = ResourceCache::new(FakeRemote::seeded()).with_keep_unused(Duration::ZERO);

    cache.projects().await.unwrap();
    cache.projects().await.unwrap();
    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 2);

    let _subscription = cache.subscribe(vec![ResourceKey::ProjectList]);
    cache.projects().await.unwrap();
    cache.projects().await.unwrap();
    assert_eq!(cache.remote().fetch_count(&ResourceKey::ProjectList), 2);
  }

  #[tokio::test]
  async fn test_prune_keeps_subscribed_entries() {
    let cache = ResourceCache::new(FakeRemote::seeded()).with_keep_unused(Duration::ZERO);
    cache.projects().await.unwrap();
    cache.members("p1").await.unwrap();
    let _subscription = cache.subscribe(vec![ResourceKey::Members("p1".to_string())]);

    assert_eq!(cache.prune(), 1);
    assert_eq!(cache.peek(&ResourceKey::ProjectList), None);
    assert!(cache
      .peek(&ResourceKey::Members("p1".to_string()))
      .is_some());
  }

  #[tokio::test]
  async fn test_sign_out_resets_everything() {
    let cache = ResourceCache::new(FakeRemote::seeded());
    assert!(cache.session().await.unwrap().is_some());
    cache.projects().await.unwrap();
    let mut subscription = cache.subscribe(vec![ResourceKey::TaskList]);

    cache.mutate(Mutation::SignOut).await.unwrap();

    assert!(subscription.take_invalidated());
    assert_eq!(cache.peek(&ResourceKey::ProjectList), None);
    assert_eq!(cache.session().await.unwrap(), None);
  }
}
