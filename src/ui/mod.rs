pub mod renderfns;
pub mod view;
pub mod views;

use crate::app::App;
use ratatui::prelude::*;
use ratatui::widgets::TableState;
use renderfns::{draw_footer, draw_header};

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(frame.area());

  let shortcuts = app
    .current_view()
    .map(|view| view.shortcuts())
    .unwrap_or_default();
  draw_header(frame, chunks[0], app.api_url(), &shortcuts);

  if let Some(view) = app.current_view_mut() {
    view.render(frame, chunks[1]);
  }

  draw_footer(frame, chunks[2], &app.breadcrumb(), &app.footer_note());
}

/// Keep the selection inside `0..len`, selecting the first row when rows
/// appear and clearing it when they go away
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}
