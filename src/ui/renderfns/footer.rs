use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar: view breadcrumb left, toast hint right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], toast_count: usize) {
  let mut spans = vec![Span::raw(" ")];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i == breadcrumb.len() - 1 {
      Style::default().fg(Color::Cyan).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  let background = Style::default().bg(Color::Black);
  frame.render_widget(Paragraph::new(Line::from(spans)).style(background), area);

  if toast_count > 0 {
    let hint = Line::from(vec![
      Span::styled("<x>", Style::default().fg(Color::Cyan)),
      Span::styled(
        format!(" dismiss ({}) ", toast_count),
        Style::default().fg(Color::DarkGray),
      ),
    ])
    .right_aligned();
    frame.render_widget(Paragraph::new(hint), area);
  }
}
