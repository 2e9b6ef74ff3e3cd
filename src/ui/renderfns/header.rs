use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::ui::view::ShortcutInfo;

/// Draw the header bar with logo, context, and shortcuts
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  title: &str,
  user: Option<&str>,
  shortcuts: &[ShortcutInfo],
) {
  let separator = Span::styled("│", Style::default().fg(Color::DarkGray));
  let mut spans = vec![
    Span::styled(" taskdeck ", Style::default().fg(Color::Cyan).bold()),
    separator.clone(),
    Span::styled(format!(" {} ", title), Style::default().fg(Color::White)),
    separator,
    match user {
      Some(name) => Span::styled(format!(" {} ", name), Style::default().fg(Color::Yellow).bold()),
      None => Span::styled(" not signed in ", Style::default().fg(Color::DarkGray)),
    },
    Span::raw("  "),
  ];

  // Keys highlighted, descriptions dimmed
  for shortcut in shortcuts {
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
