use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by a form that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  Submitted,
  Cancelled,
}

#[derive(Debug, Clone)]
enum FieldKind {
  Text(TextInput),
  /// (value, label) pairs cycled with left/right
  Choice {
    options: Vec<(String, String)>,
    selected: usize,
  },
}

#[derive(Debug, Clone)]
struct Field {
  key: &'static str,
  label: &'static str,
  kind: FieldKind,
}

/// Modal multi-field form: Tab/↑↓ move between fields, Enter submits.
#[derive(Debug, Clone)]
pub struct Form {
  title: String,
  fields: Vec<Field>,
  focused: usize,
  errors: Vec<String>,
  busy: bool,
}

impl Form {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      title: title.into(),
      fields: Vec::new(),
      focused: 0,
      errors: Vec::new(),
      busy: false,
    }
  }

  pub fn text(mut self, key: &'static str, label: &'static str, value: &str) -> Self {
    self.fields.push(Field {
      key,
      label,
      kind: FieldKind::Text(TextInput::new().with_value(value)),
    });
    self
  }

  pub fn password(mut self, key: &'static str, label: &'static str) -> Self {
    self.fields.push(Field {
      key,
      label,
      kind: FieldKind::Text(TextInput::masked()),
    });
    self
  }

  /// A fixed set of options; `selected` picks the initial value
  pub fn choice(
    mut self,
    key: &'static str,
    label: &'static str,
    options: Vec<(String, String)>,
    selected: &str,
  ) -> Self {
    let selected = options
      .iter()
      .position(|(value, _)| value == selected)
      .unwrap_or(0);
    self.fields.push(Field {
      key,
      label,
      kind: FieldKind::Choice { options, selected },
    });
    self
  }

  /// Move focus to the named field
  pub fn focus(mut self, key: &str) -> Self {
    if let Some(idx) = self.fields.iter().position(|f| f.key == key) {
      self.focused = idx;
    }
    self
  }

  /// Current value of a field; empty for unknown keys
  pub fn value(&self, key: &str) -> &str {
    let Some(field) = self.fields.iter().find(|f| f.key == key) else {
      return "";
    };
    match &field.kind {
      FieldKind::Text(input) => input.value(),
      FieldKind::Choice { options, selected } => options
        .get(*selected)
        .map(|(value, _)| value.as_str())
        .unwrap_or(""),
    }
  }

  pub fn set_errors(&mut self, errors: Vec<String>) {
    self.errors = errors;
  }

  /// While busy, submitting is disabled (a request is in flight)
  pub fn set_busy(&mut self, busy: bool) {
    self.busy = busy;
  }

  pub fn is_busy(&self) -> bool {
    self.busy
  }

  fn move_focus(&mut self, forward: bool) {
    let len = self.fields.len();
    if len == 0 {
      return;
    }
    self.focused = if forward {
      (self.focused + 1) % len
    } else {
      self.focused.checked_sub(1).unwrap_or(len - 1)
    };
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Esc => return KeyResult::Event(FormEvent::Cancelled),
      KeyCode::Enter => {
        if self.busy {
          return KeyResult::Handled;
        }
        self.errors.clear();
        return KeyResult::Event(FormEvent::Submitted);
      }
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(true);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(false);
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focused) else {
      return KeyResult::NotHandled;
    };
    match &mut field.kind {
      FieldKind::Text(input) => match input.handle_key(key) {
        InputResult::NotHandled => KeyResult::NotHandled,
        _ => KeyResult::Handled,
      },
      FieldKind::Choice { options, selected } => {
        let len = options.len().max(1);
        match key.code {
          KeyCode::Left | KeyCode::Char('h') => {
            *selected = selected.checked_sub(1).unwrap_or(len - 1);
            KeyResult::Handled
          }
          KeyCode::Right | KeyCode::Char('l') | KeyCode::Char(' ') => {
            *selected = (*selected + 1) % len;
            KeyResult::Handled
          }
          _ => KeyResult::Handled,
        }
      }
    }
  }

  /// Render centered over `area`
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.len())
      .max()
      .unwrap_or(0) as u16
      + 2;
    let width = 64.min(area.width.saturating_sub(4)).max(30.min(area.width));
    let height = (self.fields.len() as u16 + self.errors.len() as u16 + 4).min(area.height);

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let overlay_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, overlay_area);

    let title = if self.busy {
      format!(" {} (saving...) ", self.title)
    } else {
      format!(" {} ", self.title)
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title)
      .title_bottom(Line::from(" Tab: next  Enter: save  Esc: cancel ").right_aligned());

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    let mut lines: Vec<Line> = Vec::new();
    for (idx, field) in self.fields.iter().enumerate() {
      let focused = idx == self.focused;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::DarkGray)
      };
      let mut spans = vec![Span::styled(
        format!("{:<width$}", field.label, width = label_width as usize),
        label_style,
      )];
      match &field.kind {
        FieldKind::Text(input) => spans.extend(input.spans(focused)),
        FieldKind::Choice { options, selected } => {
          let label = options
            .get(*selected)
            .map(|(_, label)| label.as_str())
            .unwrap_or("-");
          spans.push(Span::styled(
            format!("◀ {} ▶", label),
            Style::default().fg(Color::Cyan),
          ));
        }
      }
      lines.push(Line::from(spans));
    }

    if !self.errors.is_empty() {
      lines.push(Line::raw(""));
      for error in &self.errors {
        lines.push(Line::styled(
          format!("✕ {}", error),
          Style::default().fg(Color::Red),
        ));
      }
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
  }
}
