use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutInfo {
  pub key: &'static str,
  pub label: &'static str,
  pub priority: u8, // Lower = shown first
}

impl ShortcutInfo {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self {
      key,
      label,
      priority: 100,
    }
  }

  pub const fn with_priority(mut self, priority: u8) -> Self {
    self.priority = priority;
    self
  }
}

pub type Shortcut = ShortcutInfo;

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// No action needed
  None,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views handle their own input modes (search, forms, prompts) and return
/// actions for the App to execute: App → View → Components.
///
/// Views that load data use a cache-bound `Query<T>` and poll it in
/// `tick()`.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  fn render(&mut self, frame: &mut Frame, area: Rect);

  fn breadcrumb_label(&self) -> String;

  /// Called on each tick to poll queries and pending writes.
  ///
  /// Every view on the stack is ticked; only the top view's action is
  /// applied.
  fn tick(&mut self) -> ViewAction {
    ViewAction::None
  }

  /// True while a text field or modal owns the keyboard, so global keys
  /// (`:` and `x`) reach the view instead of the app.
  fn captures_input(&self) -> bool {
    false
  }

  /// Views showing account data get covered by the sign-in view when the
  /// session ends.
  fn requires_session(&self) -> bool {
    true
  }

  /// Keyboard shortcuts shown in the header
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("q", "back").with_priority(30),
    ]
  }
}
