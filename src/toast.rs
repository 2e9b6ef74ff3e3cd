//! Short-lived notifications ("toasts") with timed auto-dismissal.
//!
//! Every toast with a positive lifetime gets a cancellable timer keyed by its
//! id. The deadline is always `created_at + ttl`, never "ttl from now", so a
//! timer re-armed after [`ToastQueue::suspend`] fires on the original
//! schedule. Reads sweep expired toasts first, which keeps the deadline even
//! when no runtime is around to drive timers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

pub type ToastId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
  Success,
  Error,
  Warning,
  Info,
}

impl ToastKind {
  pub fn icon(self) -> &'static str {
    match self {
      ToastKind::Success => "✓",
      ToastKind::Error => "✕",
      ToastKind::Warning => "⚠",
      ToastKind::Info => "ℹ",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
  pub id: ToastId,
  pub message: String,
  pub kind: ToastKind,
  pub created_at: Instant,
  /// `None` keeps the toast until dismissed
  pub ttl: Option<Duration>,
}

impl Toast {
  pub fn expires_at(&self) -> Option<Instant> {
    self.ttl.map(|ttl| self.created_at + ttl)
  }

  pub fn is_expired(&self, now: Instant) -> bool {
    self.expires_at().is_some_and(|at| now >= at)
  }
}

#[derive(Default)]
struct QueueState {
  toasts: Vec<Toast>,
  timers: HashMap<ToastId, AbortHandle>,
  next_id: ToastId,
  suspended: bool,
}

impl QueueState {
  fn remove(&mut self, id: ToastId) -> bool {
    if let Some(timer) = self.timers.remove(&id) {
      timer.abort();
    }
    let before = self.toasts.len();
    self.toasts.retain(|t| t.id != id);
    self.toasts.len() != before
  }

  fn sweep(&mut self, now: Instant) -> bool {
    let expired: Vec<ToastId> = self
      .toasts
      .iter()
      .filter(|t| t.is_expired(now))
      .map(|t| t.id)
      .collect();
    for id in &expired {
      self.remove(*id);
    }
    !expired.is_empty()
  }

  fn cancel_timers(&mut self) {
    for (_, timer) in self.timers.drain() {
      timer.abort();
    }
  }
}

/// Ordered collection of live toasts, newest last.
///
/// Cloning shares the queue.
#[derive(Clone)]
pub struct ToastQueue {
  state: Arc<Mutex<QueueState>>,
  default_duration_ms: i64,
}

impl ToastQueue {
  pub fn new(default_duration_ms: i64) -> Self {
    Self {
      state: Arc::new(Mutex::new(QueueState {
        next_id: 1,
        ..QueueState::default()
      })),
      default_duration_ms,
    }
  }

  fn lock(&self) -> MutexGuard<'_, QueueState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Append a toast and arm its removal timer.
  ///
  /// `duration_ms <= 0` keeps it until [`dismiss`](Self::dismiss).
  pub fn push(&self, message: impl Into<String>, kind: ToastKind, duration_ms: i64) -> ToastId {
    let now = Instant::now();
    let ttl = u64::try_from(duration_ms)
      .ok()
      .filter(|ms| *ms > 0)
      .map(Duration::from_millis);

    let mut state = self.lock();
    let id = state.next_id;
    state.next_id += 1;

    let toast = Toast {
      id,
      message: message.into(),
      kind,
      created_at: now,
      ttl,
    };
    let deadline = toast.expires_at();
    state.toasts.push(toast);

    if let Some(deadline) = deadline {
      if !state.suspended {
        self.arm(&mut state, id, deadline);
      }
    }
    debug!(id, ?kind, ?ttl, "Toast pushed");
    id
  }

  pub fn success(&self, message: impl Into<String>) -> ToastId {
    self.push(message, ToastKind::Success, self.default_duration_ms)
  }

  pub fn error(&self, message: impl Into<String>) -> ToastId {
    self.push(message, ToastKind::Error, self.default_duration_ms)
  }

  pub fn warning(&self, message: impl Into<String>) -> ToastId {
    self.push(message, ToastKind::Warning, self.default_duration_ms)
  }

  pub fn info(&self, message: impl Into<String>) -> ToastId {
    self.push(message, ToastKind::Info, self.default_duration_ms)
  }

  fn arm(&self, state: &mut QueueState, id: ToastId, deadline: Instant) {
    // Outside a runtime the read-time sweep enforces the deadline
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
      return;
    };

    let queue = Arc::downgrade(&self.state);
    let timer = runtime.spawn(async move {
      tokio::time::sleep_until(deadline).await;
      if let Some(queue) = queue.upgrade() {
        let mut state = queue.lock().unwrap_or_else(PoisonError::into_inner);
        // Drop our own handle first so remove() does not abort this task
        state.timers.remove(&id);
        if state.remove(id) {
          debug!(id, "Toast expired");
        }
      }
    });

    if let Some(previous) = state.timers.insert(id, timer.abort_handle()) {
      previous.abort();
    }
  }

  /// Remove a toast now. Unknown or already removed ids are ignored.
  pub fn dismiss(&self, id: ToastId) {
    if self.lock().remove(id) {
      debug!(id, "Toast dismissed");
    }
  }

  /// Dismiss the most recent toast, if any
  pub fn dismiss_latest(&self) {
    let latest = self.lock().toasts.last().map(|t| t.id);
    if let Some(id) = latest {
      self.dismiss(id);
    }
  }

  pub fn clear(&self) {
    let mut state = self.lock();
    state.cancel_timers();
    state.toasts.clear();
  }

  /// Live toasts in display order.
  pub fn toasts(&self) -> Vec<Toast> {
    let mut state = self.lock();
    state.sweep(Instant::now());
    state.toasts.clone()
  }

  /// Remove expired toasts; true if anything went
  pub fn sweep(&self) -> bool {
    self.lock().sweep(Instant::now())
  }

  /// Stop all timers, e.g. while the UI is not being drawn.
  pub fn suspend(&self) {
    let mut state = self.lock();
    state.suspended = true;
    state.cancel_timers();
  }

  /// Re-arm timers from each toast's original deadline.
  ///
  /// Toasts whose deadline passed while suspended go immediately.
  pub fn resume(&self) {
    let now = Instant::now();
    let mut state = self.lock();
    state.suspended = false;
    state.sweep(now);

    let pending: Vec<(ToastId, Instant)> = state
      .toasts
      .iter()
      .filter_map(|t| t.expires_at().map(|at| (t.id, at)))
      .collect();
    for (id, deadline) in pending {
      self.arm(&mut state, id, deadline);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  fn ids(queue: &ToastQueue) -> Vec<ToastId> {
    queue.toasts().iter().map(|t| t.id).collect()
  }

  /// Toasts still stored, without sweeping
  fn stored(queue: &ToastQueue) -> usize {
    queue.lock().toasts.len()
  }

  async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    tokio::task::yield_now().await;
  }

  #[tokio::test(start_paused = true)]
  async fn test_toast_expires_on_schedule() {
    let queue = ToastQueue::new(5000);
    let id = queue.push("Saved", ToastKind::Success, 3000);

    advance(2999).await;
    assert_eq!(ids(&queue), vec![id]);

    advance(2).await;
    assert!(ids(&queue).is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_timer_removes_without_reads() {
    let queue = ToastQueue::new(5000);
    queue.info("Syncing");

    tokio::time::sleep(Duration::from_millis(5001)).await;
    tokio::task::yield_now().await;

    assert_eq!(stored(&queue), 0);
    assert!(queue.lock().timers.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_non_positive_duration_is_sticky() {
    let queue = ToastQueue::new(5000);
    let zero = queue.push("Pinned", ToastKind::Warning, 0);
    let negative = queue.push("Also pinned", ToastKind::Info, -1);

    advance(3_600_000).await;

    assert_eq!(ids(&queue), vec![zero, negative]);
    assert!(queue.lock().timers.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_double_dismiss_is_harmless() {
    let queue = ToastQueue::new(5000);
    let first = queue.error("Failed to save");
    let second = queue.success("Created");

    queue.dismiss(first);
    assert_eq!(ids(&queue), vec![second]);
    queue.dismiss(first);
    assert_eq!(ids(&queue), vec![second]);
    assert_eq!(queue.lock().timers.len(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_insertion_order_is_display_order() {
    let queue = ToastQueue::new(5000);
    let a = queue.info("a");
    let b = queue.warning("b");
    let c = queue.success("c");

    assert_eq!(ids(&queue), vec![a, b, c]);
    assert!(a < b && b < c);

    queue.dismiss_latest();
    assert_eq!(ids(&queue), vec![a, b]);
  }

  #[tokio::test(start_paused = true)]
  async fn test_overdue_toast_goes_on_resume() {
    let queue = ToastQueue::new(5000);
    queue.push("Backgrounded", ToastKind::Info, 3000);
    queue.suspend();

    advance(5000).await;
    assert_eq!(stored(&queue), 1);

    queue.resume();
    assert_eq!(stored(&queue), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_resume_keeps_original_deadline() {
    let queue = ToastQueue::new(5000);
    queue.push("Half way", ToastKind::Info, 3000);

    advance(1000).await;
    queue.suspend();
    queue.resume();

    advance(1999).await;
    assert_eq!(stored(&queue), 1);

    advance(2).await;
    assert_eq!(stored(&queue), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn test_push_while_suspended_arms_on_resume() {
    let queue = ToastQueue::new(5000);
    queue.suspend();
    queue.push("Queued", ToastKind::Success, 1000);
    assert!(queue.lock().timers.is_empty());

    queue.resume();
    assert_eq!(queue.lock().timers.len(), 1);
  }

  #[test]
  fn test_works_without_runtime() {
    let queue = ToastQueue::new(5000);
    let id = queue.info("No runtime");
    assert_eq!(ids(&queue), vec![id]);
    queue.clear();
    assert!(queue.toasts().is_empty());
  }

  #[test]
  fn test_icons() {
    assert_eq!(ToastKind::Success.icon(), "✓");
    assert_eq!(ToastKind::Error.icon(), "✕");
    assert_eq!(ToastKind::Warning.icon(), "⚠");
    assert_eq!(ToastKind::Info.icon(), "ℹ");
  }
}
