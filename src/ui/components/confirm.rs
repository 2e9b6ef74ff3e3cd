use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by the confirmation prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent<T> {
  /// User answered yes; carries the value the prompt was opened with
  Confirmed(T),
  Cancelled,
}

/// y/n prompt guarding destructive actions
#[derive(Debug, Clone)]
pub struct Confirm<T> {
  pending: Option<(String, T)>,
}

impl<T> Default for Confirm<T> {
  fn default() -> Self {
    Self { pending: None }
  }
}

impl<T: Clone> Confirm<T> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  pub fn ask(&mut self, question: impl Into<String>, value: T) {
    self.pending = Some((question.into(), value));
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent<T>> {
    let Some((_, value)) = &self.pending else {
      return KeyResult::NotHandled;
    };

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => {
        let value = value.clone();
        self.pending = None;
        KeyResult::Event(ConfirmEvent::Confirmed(value))
      }
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
        self.pending = None;
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      // Modal: swallow everything else
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((question, _)) = &self.pending else {
      return;
    };

    let width = (question.chars().count() as u16 + 6)
      .clamp(24, 60)
      .min(area.width);
    let height = 5.min(area.height);
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(" Confirm ");

    let text = vec![
      Line::raw(question.as_str()),
      Line::from(vec![
        Span::styled("y", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" yes   ", Style::default().fg(Color::DarkGray)),
        Span::styled("n", Style::default().fg(Color::Cyan).bold()),
        Span::styled(" no", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .alignment(Alignment::Center)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay_area);
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
  fn test_yes_returns_value() {
    let mut confirm = Confirm::new();
    confirm.ask("Delete project Apollo?", "p1".to_string());
    assert!(confirm.is_active());
    assert_eq!(confirm.handle_key(key(KeyCode::Char('j'))), KeyResult::Handled);
    assert_eq!(
      confirm.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed("p1".to_string()))
    );
    assert!(!confirm.is_active());
  }

  #[test]
  fn test_inactive_and_cancel() {
    let mut confirm: Confirm<String> = Confirm::new();
    assert_eq!(confirm.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);

    confirm.ask("Delete?", "t1".to_string());
    assert_eq!(
      confirm.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(ConfirmEvent::Cancelled)
    );
  }
}
