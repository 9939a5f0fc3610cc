use crate::api::types::{Priority, Resolution};
use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if
/// truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

pub fn priority_color(priority: Option<Priority>) -> Color {
  match priority {
    Some(Priority::Showstopper | Priority::Emergency) => Color::Red,
    Some(Priority::High) => Color::Yellow,
    Some(Priority::Low | Priority::Routine) => Color::White,
    Some(Priority::Defer) | None => Color::DarkGray,
  }
}

pub fn resolution_color(resolution: Option<Resolution>) -> Color {
  match resolution {
    Some(Resolution::New) => Color::Cyan,
    Some(Resolution::Reviewed | Resolution::Tested) => Color::Yellow,
    Some(Resolution::Fixed | Resolution::Released) => Color::Green,
    Some(Resolution::PartiallyFixed) => Color::LightGreen,
    Some(Resolution::Duplicate | Resolution::CannotReproduce) | None => Color::DarkGray,
  }
}

/// Day/month/year, or empty when there is no date
pub fn format_date(date: Option<DateTime<Utc>>) -> String {
  date
    .map(|d| d.format("%d/%m/%Y").to_string())
    .unwrap_or_default()
}
