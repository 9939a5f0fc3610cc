use super::spawn_intent;
use crate::api::types::{Entity, Issue, Resolution};
use crate::store::Store;
use crate::ui::renderfns::{format_date, priority_color, resolution_color};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use serde_json::json;
use tracing::warn;

/// View for displaying a single issue with its comments
pub struct IssueDetailView {
  id: i64,
  issues: Store<Issue>,
  /// Draft error from the last edit, shown until the next one
  edit_error: Option<String>,
}

impl IssueDetailView {
  pub fn new(id: i64, issues: Store<Issue>) -> Self {
    let view = Self {
      id,
      issues,
      edit_error: None,
    };
    view.fetch();
    view
  }

  fn fetch(&self) {
    let store = self.issues.clone();
    let id = self.id;
    spawn_intent(async move { store.get_one(id).await });
  }

  /// Set the resolution on the current record and save it
  fn mark(&mut self, resolution: Resolution) {
    if self.issues.with_state(|state| state.current.id()) != Some(self.id) {
      return;
    }

    match self
      .issues
      .set_draft_field("resolution", json!(resolution.as_str()), None)
    {
      Ok(()) => {
        self.edit_error = None;
        let store = self.issues.clone();
        let draft = store.snapshot().current;
        spawn_intent(async move { store.update(draft).await });
      }
      Err(e) => {
        warn!(error = %e, "could not set resolution");
        self.edit_error = Some(e.to_string());
      }
    }
  }

  fn build_lines(issue: &Issue) -> Vec<Line<'static>> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
      Line::from(vec![
        Span::styled("Issue #:    ", label),
        Span::styled(
          issue.number.map(|n| n.to_string()).unwrap_or_default(),
          Style::default().fg(Color::Cyan).bold(),
        ),
      ]),
      Line::from(vec![
        Span::styled("Reported:   ", label),
        Span::raw(format_date(issue.reported_date)),
      ]),
      Line::from(vec![
        Span::styled("Priority:   ", label),
        Span::styled(
          issue.priority.map(|p| p.to_string()).unwrap_or_default(),
          Style::default().fg(priority_color(issue.priority)),
        ),
      ]),
      Line::from(vec![
        Span::styled("Resolution: ", label),
        Span::styled(
          issue.resolution.map(|r| r.to_string()).unwrap_or_default(),
          Style::default().fg(resolution_color(issue.resolution)),
        ),
      ]),
    ];

    if let Some(login) = issue.user.as_ref().and_then(|u| u.login.clone()) {
      lines.push(Line::from(vec![
        Span::styled("Reporter:   ", label),
        Span::raw(login),
      ]));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
      "Description",
      Style::default().fg(Color::Yellow).bold(),
    )));
    for line in issue.description.as_deref().unwrap_or("").lines() {
      lines.push(Line::from(line.to_string()));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
      format!("Comments ({})", issue.comments.len()),
      Style::default().fg(Color::Yellow).bold(),
    )));
    for comment in &issue.comments {
      lines.push(Line::from(Span::styled(
        format!(
          "{} {}",
          format_date(comment.date),
          comment
            .user
            .as_ref()
            .and_then(|u| u.login.as_deref())
            .unwrap_or("")
        ),
        label,
      )));
      for line in comment.description.as_deref().unwrap_or("").lines() {
        lines.push(Line::from(format!("  {}", line)));
      }
    }

    lines
  }
}

impl View for IssueDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => self.fetch(),
      KeyCode::Char('v') => self.mark(Resolution::Reviewed),
      KeyCode::Char('f') => self.mark(Resolution::Fixed),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => return ViewAction::NotHandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let (issue, loading, updating, error) = self.issues.with_state(|state| {
      let issue = (state.current.id() == Some(self.id)).then(|| state.current.clone());
      (
        issue,
        state.is_loading(),
        state.is_updating(),
        state.last_error.as_ref().map(|e| e.to_string()),
      )
    });

    let status = if loading {
      " (loading...)".to_string()
    } else if updating {
      " (saving...)".to_string()
    } else if let Some(e) = self.edit_error.as_ref().or(error.as_ref()) {
      format!(" (error: {})", e)
    } else {
      String::new()
    };

    let block = Block::default()
      .title(format!(" Issue {}{} ", self.id, status))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let paragraph = match issue {
      Some(issue) => Paragraph::new(Self::build_lines(&issue)).wrap(Wrap { trim: false }),
      None => Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray)),
    };

    frame.render_widget(paragraph.block(block), area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Issue {}", self.id)
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("v", "reviewed"),
      Shortcut::new("f", "fixed"),
      Shortcut::new("r", "reload"),
      Shortcut::new("q", "back"),
    ]
  }
}
