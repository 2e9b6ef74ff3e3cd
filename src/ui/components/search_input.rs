use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search query changed (emitted on each keystroke, empty string on cancel)
  Changed(String),
  /// Search submitted (overlay closed, filter persists)
  Submitted,
}

/// `/` search box filtering the list underneath as you type
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the box, keeping the current query for editing
  pub fn activate(&mut self) {
    self.active = true;
  }

  pub fn clear(&mut self) {
    self.active = false;
    self.input.clear();
  }

  /// Handle a key event.
  ///
  /// Call this regardless of active state; `/` opens the box.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input.clear();
        KeyResult::Event(SearchEvent::Changed(String::new()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // Swallow everything else while typing
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let mut spans = vec![Span::styled("/", Style::default().fg(Color::Yellow))];
    spans.extend(self.input.spans(true));
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('j'))), KeyResult::NotHandled);
    assert_eq!(search.handle_key(key(KeyCode::Char('/'))), KeyResult::Handled);
    assert!(search.is_active());
  }

  #[test]
  fn test_typing_emits_changes_and_enter_keeps_query() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    assert_eq!(
      search.handle_key(key(KeyCode::Char('d'))),
      KeyResult::Event(SearchEvent::Changed("d".to_string()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(SearchEvent::Submitted)
    );
    assert!(!search.is_active());
    assert_eq!(search.query(), "d");
  }

  #[test]
  fn test_escape_clears() {
    let mut search = SearchInput::new();
    search.handle_key(key(KeyCode::Char('/')));
    search.handle_key(key(KeyCode::Char('d')));
    assert_eq!(
      search.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(SearchEvent::Changed(String::new()))
    );
    assert_eq!(search.query(), "");
  }
}
