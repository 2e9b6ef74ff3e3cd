use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use super::utils::{toast_color, truncate};
use crate::toast::Toast;

const TOAST_WIDTH: u16 = 44;
const TOAST_HEIGHT: u16 = 3;

/// The newest toasts that fit in `height` rows, oldest first
fn visible(toasts: &[Toast], height: u16) -> &[Toast] {
  let fits = (height / TOAST_HEIGHT) as usize;
  &toasts[toasts.len().saturating_sub(fits)..]
}

/// Stack toasts in the top-right corner, oldest on top.
///
/// When they overflow, the oldest ones are left out.
pub fn draw_toasts(frame: &mut Frame, area: Rect, toasts: &[Toast]) {
  let width = TOAST_WIDTH.min(area.width);
  let x = area.x + area.width - width;
  let mut y = area.y;

  for toast in visible(toasts, area.height) {
    let height = TOAST_HEIGHT;
    let toast_area = Rect::new(x, y, width, height);
    let color = toast_color(toast.kind);

    frame.render_widget(Clear, toast_area);
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(color));
    let text = Line::from(vec![
      Span::styled(format!("{} ", toast.kind.icon()), Style::default().fg(color).bold()),
      Span::raw(truncate(&toast.message, width.saturating_sub(6) as usize)),
    ]);
    frame.render_widget(
      Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
      toast_area,
    );

    y += height;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::toast::ToastKind;
  use pretty_assertions::assert_eq;
  use tokio::time::Instant;

  fn toasts(count: u64) -> Vec<Toast> {
    (1..=count)
      .map(|id| Toast {
        id,
        message: format!("toast {}", id),
        kind: ToastKind::Info,
        created_at: Instant::now(),
        ttl: None,
      })
      .collect()
  }

  fn ids(toasts: &[Toast]) -> Vec<u64> {
    toasts.iter().map(|t| t.id).collect()
  }

  #[test]
  fn test_overflow_keeps_newest() {
    let all = toasts(5);
    assert_eq!(ids(visible(&all, 7)), vec![4, 5]);
  }

  #[test]
  fn test_all_shown_when_they_fit() {
    let all = toasts(2);
    assert_eq!(ids(visible(&all, 30)), vec![1, 2]);
  }

  #[test]
  fn test_too_short_shows_none() {
    let all = toasts(3);
    assert!(visible(&all, 2).is_empty());
  }
}
