use crate::ui::view::Shortcut;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with app name, backend host and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, api_url: &str, shortcuts: &[Shortcut]) {
  let mut spans = vec![
    Span::styled(" issuedesk ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", extract_host(api_url)),
      Style::default().fg(Color::White),
    ),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::raw(" "),
  ];

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

/// Host (and port) part of the API url
fn extract_host(url: &str) -> &str {
  let rest = url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url);
  rest.split('/').next().unwrap_or(rest)
}
