use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;

/// Result of handling a key event in an input component
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputResult {
  /// Key was handled, continue input mode
  Consumed,
  /// Enter pressed, here's the submitted value
  Submitted(String),
  /// Escape pressed, input cancelled
  Cancelled,
  /// Key not handled, pass to next handler
  NotHandled,
}

/// Reusable single-line text input.
///
/// The cursor counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
  buffer: String,
  cursor: usize,
  masked: bool,
}

impl TextInput {
  pub fn new() -> Self {
    Self::default()
  }

  /// Input that renders every character as `•`
  pub fn masked() -> Self {
    Self {
      masked: true,
      ..Self::default()
    }
  }

  pub fn with_value(mut self, value: &str) -> Self {
    self.set_value(value);
    self
  }

  pub fn value(&self) -> &str {
    &self.buffer
  }

  pub fn set_value(&mut self, value: &str) {
    self.buffer = value.to_string();
    self.cursor = self.len();
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
    self.cursor = 0;
  }

  fn len(&self) -> usize {
    self.buffer.chars().count()
  }

  /// Byte offset of a character index
  fn byte_at(&self, idx: usize) -> usize {
    self
      .buffer
      .char_indices()
      .nth(idx)
      .map(|(i, _)| i)
      .unwrap_or(self.buffer.len())
  }

  /// Handle a key event, returning the result
  pub fn handle_key(&mut self, key: KeyEvent) -> InputResult {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => InputResult::Cancelled,
      KeyCode::Enter => InputResult::Submitted(self.buffer.clone()),
      KeyCode::Backspace => {
        if self.cursor > 0 {
          self.cursor -= 1;
          let at = self.byte_at(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Delete => {
        if self.cursor < self.len() {
          let at = self.byte_at(self.cursor);
          self.buffer.remove(at);
        }
        InputResult::Consumed
      }
      KeyCode::Left => {
        self.cursor = self.cursor.saturating_sub(1);
        InputResult::Consumed
      }
      KeyCode::Right => {
        self.cursor = (self.cursor + 1).min(self.len());
        InputResult::Consumed
      }
      KeyCode::Home => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::End => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('a') if ctrl => {
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('e') if ctrl => {
        self.cursor = self.len();
        InputResult::Consumed
      }
      KeyCode::Char('u') if ctrl => {
        // Clear line before cursor
        let at = self.byte_at(self.cursor);
        self.buffer.drain(..at);
        self.cursor = 0;
        InputResult::Consumed
      }
      KeyCode::Char('w') if ctrl => {
        // Delete word before cursor
        let at = self.byte_at(self.cursor);
        let start = self.buffer[..at]
          .trim_end()
          .rfind(' ')
          .map(|i| i + 1)
          .unwrap_or(0);
        self.buffer.drain(start..at);
        self.cursor = self.buffer[..start].chars().count();
        InputResult::Consumed
      }
      KeyCode::Char(_) if ctrl => InputResult::NotHandled,
      KeyCode::Char(c) => {
        let at = self.byte_at(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
        InputResult::Consumed
      }
      _ => InputResult::NotHandled,
    }
  }

  pub fn cursor_position(&self) -> usize {
    self.cursor
  }

  /// Text as it should appear on screen
  pub fn display_value(&self) -> String {
    if self.masked {
      "•".repeat(self.len())
    } else {
      self.buffer.clone()
    }
  }

  /// Spans for the value with a block cursor when focused
  pub fn spans(&self, focused: bool) -> Vec<Span<'static>> {
    let text = self.display_value();
    if !focused {
      return vec![Span::raw(text)];
    }

    let split = text
      .char_indices()
      .nth(self.cursor)
      .map(|(i, _)| i)
      .unwrap_or(text.len());
    let (before, rest) = text.split_at(split);
    let mut chars = rest.chars();
    let under = chars.next().map(String::from).unwrap_or_else(|| " ".to_string());
    let cursor_style = Style::default().fg(Color::Black).bg(Color::Yellow);

    vec![
      Span::raw(before.to_string()),
      Span::styled(under, cursor_style),
      Span::raw(chars.as_str().to_string()),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl_key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::CONTROL)
  }

  fn type_str(input: &mut TextInput, s: &str) {
    for c in s.chars() {
      input.handle_key(key(KeyCode::Char(c)));
    }
  }

  #[test]
  fn test_basic_input() {
    let mut input = TextInput::new();
    assert!(input.is_empty());

    type_str(&mut input, "hi");
    assert_eq!(input.value(), "hi");
  }

  #[test]
  fn test_submit() {
    let mut input = TextInput::new();
    type_str(&mut input, "test");

    let result = input.handle_key(key(KeyCode::Enter));
    assert_eq!(result, InputResult::Submitted("test".to_string()));
  }

  #[test]
  fn test_cancel() {
    let mut input = TextInput::new();
    type_str(&mut input, "x");

    let result = input.handle_key(key(KeyCode::Esc));
    assert_eq!(result, InputResult::Cancelled);
  }

  #[test]
  fn test_backspace() {
    let mut input = TextInput::new();
    type_str(&mut input, "abc");
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "ab");
  }

  #[test]
  fn test_cursor_movement() {
    let mut input = TextInput::new();
    type_str(&mut input, "ac");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Char('b')));
    assert_eq!(input.value(), "abc");
  }

  #[test]
  fn test_multibyte_editing() {
    let mut input = TextInput::new();
    type_str(&mut input, "café");
    input.handle_key(key(KeyCode::Left));
    input.handle_key(key(KeyCode::Backspace));
    assert_eq!(input.value(), "caé");
    input.handle_key(key(KeyCode::Delete));
    assert_eq!(input.value(), "ca");
  }

  #[test]
  fn test_ctrl_u_clear_before_cursor() {
    let mut input = TextInput::new();
    type_str(&mut input, "hello world");
    for _ in 0..5 {
      input.handle_key(key(KeyCode::Left));
    }
    input.handle_key(ctrl_key(KeyCode::Char('u')));
    assert_eq!(input.value(), "world");
    assert_eq!(input.cursor_position(), 0);
  }

  #[test]
  fn test_ctrl_w_deletes_word() {
    let mut input = TextInput::new();
    type_str(&mut input, "fix login bug");
    input.handle_key(ctrl_key(KeyCode::Char('w')));
    assert_eq!(input.value(), "fix login ");
  }

  #[test]
  fn test_masked_display() {
    let mut input = TextInput::masked();
    type_str(&mut input, "s3cret");
    assert_eq!(input.value(), "s3cret");
    assert_eq!(input.display_value(), "••••••");
  }

  #[test]
  fn test_with_value_puts_cursor_at_end() {
    let input = TextInput::new().with_value("Apollo");
    assert_eq!(input.cursor_position(), 6);
  }
}
