use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

use crate::api::types::{Priority, TaskStatus};
use crate::toast::ToastKind;

/// Truncate a string to at most `max_len` characters, adding "..." if cut
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn status_color(status: TaskStatus) -> Color {
  match status {
    TaskStatus::Completed => Color::Green,
    TaskStatus::InProgress => Color::Yellow,
    TaskStatus::Todo => Color::White,
  }
}

pub fn priority_color(priority: Priority) -> Color {
  match priority {
    Priority::High => Color::Red,
    Priority::Medium => Color::Yellow,
    Priority::Low => Color::DarkGray,
  }
}

pub fn toast_color(kind: ToastKind) -> Color {
  match kind {
    ToastKind::Success => Color::Green,
    ToastKind::Error => Color::Red,
    ToastKind::Warning => Color::Yellow,
    ToastKind::Info => Color::Cyan,
  }
}

/// `2024-05-10`, or `-` when unset
pub fn format_date(date: Option<&DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%Y-%m-%d").to_string())
    .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("résumé review", 7), "résu...");
  }

  #[test]
  fn test_status_color() {
    assert_eq!(status_color(TaskStatus::Completed), Color::Green);
    assert_eq!(status_color(TaskStatus::InProgress), Color::Yellow);
    assert_eq!(status_color(TaskStatus::Todo), Color::White);
  }

  #[test]
  fn test_format_date() {
    let date = Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap();
    assert_eq!(format_date(Some(&date)), "2024-05-10");
    assert_eq!(format_date(None), "-");
  }
}
