pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::ListState;

use crate::app::App;
use renderfns::{draw_footer, draw_header, draw_toasts};

/// Keep a list selection inside `0..len`, selecting the first row when
/// rows appear and clearing it when the list empties.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let mut shortcuts = app.shortcuts();
  shortcuts.sort_by_key(|s| s.priority);
  draw_header(
    frame,
    chunks[0],
    &app.header_title(),
    app.user_name().as_deref(),
    &shortcuts,
  );

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  let toasts = app.toasts();
  draw_footer(frame, chunks[2], &app.breadcrumb(), toasts.len());

  app.command().render_overlay(frame, chunks[1]);
  draw_toasts(frame, chunks[1], &toasts);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_selection_clamped_to_len() {
    let mut state = ListState::default().with_selected(Some(7));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));
  }

  #[test]
  fn test_selection_starts_at_first_row() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 5);
    assert_eq!(state.selected(), Some(0));
  }

  #[test]
  fn test_empty_list_clears_selection() {
    let mut state = ListState::default().with_selected(Some(1));
    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }
}
