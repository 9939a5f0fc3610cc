use super::utils::{format_date, priority_color, resolution_color, truncate};
use crate::api::types::Issue;
use ratatui::prelude::*;
use ratatui::widgets::{Cell, Row};

/// Column widths for issue tables: number, date, priority, resolution,
/// description
pub const ISSUE_WIDTHS: [Constraint; 5] = [
  Constraint::Length(8),
  Constraint::Length(11),
  Constraint::Length(12),
  Constraint::Length(17),
  Constraint::Min(10),
];

pub fn issue_header() -> Row<'static> {
  Row::new(["Issue #", "Date", "Priority", "Resolution", "Description"]).style(
    Style::default()
      .fg(Color::DarkGray)
      .add_modifier(Modifier::BOLD),
  )
}

pub fn issue_row(issue: &Issue) -> Row<'static> {
  let number = issue.number.map(|n| n.to_string()).unwrap_or_default();
  let priority = issue.priority.map(|p| p.to_string()).unwrap_or_default();
  let resolution = issue.resolution.map(|r| r.to_string()).unwrap_or_default();
  // First line only; descriptions are free text
  let description = issue
    .description
    .as_deref()
    .and_then(|d| d.lines().next())
    .unwrap_or("");

  Row::new(vec![
    Cell::from(number).style(Style::default().fg(Color::Cyan)),
    Cell::from(format_date(issue.reported_date)),
    Cell::from(priority).style(Style::default().fg(priority_color(issue.priority))),
    Cell::from(resolution).style(Style::default().fg(resolution_color(issue.resolution))),
    Cell::from(truncate(description, 80)),
  ])
}
