use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar: view breadcrumb on the left, a status note on the
/// right
pub fn draw_footer(frame: &mut Frame, area: Rect, breadcrumb: &[String], note: &str) {
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

  let left = Paragraph::new(Line::from(spans));
  let right = Paragraph::new(Span::styled(
    format!("{} ", note),
    Style::default().fg(Color::DarkGray),
  ))
  .alignment(Alignment::Right);

  let background = Style::default().bg(Color::Black);
  frame.render_widget(left.style(background), area);
  frame.render_widget(right.style(background), area);
}
