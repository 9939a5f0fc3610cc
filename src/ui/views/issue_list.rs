use super::spawn_intent;
use crate::api::types::{Entity, Issue};
use crate::store::Store;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{issue_header, issue_row, ISSUE_WIDTHS};
use crate::ui::view::{Shortcut, View, ViewAction};
use crate::ui::views::IssueDetailView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Table, TableState};

/// View for browsing the full issue collection
pub struct IssueListView {
  issues: Store<Issue>,
  table_state: TableState,
  /// Id awaiting a `y` to confirm deletion
  pending_delete: Option<i64>,
}

impl IssueListView {
  pub fn new(issues: Store<Issue>) -> Self {
    let store = issues.clone();
    spawn_intent(async move { store.list().await });

    Self {
      issues,
      table_state: TableState::default(),
      pending_delete: None,
    }
  }

  fn selected_issue(&self) -> Option<Issue> {
    let idx = self.table_state.selected()?;
    self.issues.with_state(|state| state.items.get(idx).cloned())
  }

  fn refresh(&self) {
    let store = self.issues.clone();
    spawn_intent(async move { store.list().await });
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let (rows, loading, updating, error) = self.issues.with_state(|state| {
      let rows: Vec<_> = state.items.iter().map(issue_row).collect();
      (
        rows,
        state.is_loading(),
        state.is_updating(),
        state.last_error.as_ref().map(|e| e.to_string()),
      )
    });
    ensure_valid_selection(&mut self.table_state, rows.len());

    let title = if loading {
      " Issues (loading...) ".to_string()
    } else if updating {
      " Issues (saving...) ".to_string()
    } else if let Some(e) = &error {
      format!(" Issues (error: {}) ", e)
    } else {
      format!(" Issues ({}) ", rows.len())
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if rows.is_empty() && !loading {
      let content = if error.is_some() {
        "Failed to load issues. Press 'r' to retry."
      } else {
        "No issues found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let table = Table::new(rows, ISSUE_WIDTHS)
      .header(issue_header())
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }

  fn render_confirm(&self, frame: &mut Frame, area: Rect) {
    let Some(id) = self.pending_delete else {
      return;
    };

    let bar = Rect {
      x: area.x + 1,
      y: area.y + area.height.saturating_sub(2),
      width: area.width.saturating_sub(2),
      height: 1,
    };
    let paragraph = Paragraph::new(format!(" Delete issue {}? (y/n) ", id))
      .style(Style::default().fg(Color::Black).bg(Color::Yellow));
    frame.render_widget(paragraph, bar);
  }
}

impl View for IssueListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if let Some(id) = self.pending_delete.take() {
      if key.code == KeyCode::Char('y') {
        let store = self.issues.clone();
        spawn_intent(async move { store.delete(id).await });
      }
      return ViewAction::None;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.table_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.table_state.select_previous();
      }
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('d') => {
        self.pending_delete = self.selected_issue().and_then(|issue| issue.id());
      }
      KeyCode::Enter => {
        if let Some(id) = self.selected_issue().and_then(|issue| issue.id()) {
          return ViewAction::Push(Box::new(IssueDetailView::new(id, self.issues.clone())));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => return ViewAction::NotHandled,
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    self.render_confirm(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Issues".to_string()
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("enter", "open"),
      Shortcut::new("r", "refresh"),
      Shortcut::new("d", "delete"),
      Shortcut::new("m", "monitor"),
      Shortcut::new("q", "back"),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::Resolution;
  use crate::store::testing::{wait_until, MemoryBackend};
  use ratatui::backend::TestBackend;
  use ratatui::Terminal;
  use std::sync::Arc;

  fn issue(id: i64) -> Issue {
    Issue {
      id: Some(id),
      number: Some(id as i32),
      resolution: Some(Resolution::New),
      ..Default::default()
    }
  }

  fn press(view: &mut IssueListView, c: char) -> ViewAction {
    view.handle_key(KeyEvent::from(KeyCode::Char(c)))
  }

  fn draw(view: &mut IssueListView) {
    let mut terminal = Terminal::new(TestBackend::new(100, 12)).unwrap();
    terminal
      .draw(|frame| {
        let area = frame.area();
        view.render(frame, area);
      })
      .unwrap();
  }

  async fn loaded_view(backend: &Arc<MemoryBackend<Issue>>) -> (IssueListView, Store<Issue>) {
    let store = Store::new(backend.clone(), true);
    let mut view = IssueListView::new(store.clone());
    wait_until(|| store.with_state(|s| s.items.len()) == backend.items().len()).await;
    draw(&mut view);
    (view, store)
  }

  #[tokio::test]
  async fn test_delete_needs_confirmation() {
    let backend = MemoryBackend::with(vec![issue(1), issue(2)]);
    let (mut view, store) = loaded_view(&backend).await;
    assert_eq!(view.table_state.selected(), Some(0));

    press(&mut view, 'd');
    assert_eq!(view.pending_delete, Some(1));
    press(&mut view, 'n');
    assert_eq!(view.pending_delete, None);

    tokio::task::yield_now().await;
    assert_eq!(backend.items().len(), 2);
    assert_eq!(store.snapshot().items.len(), 2);
  }

  #[tokio::test]
  async fn test_confirmed_delete_removes_and_refreshes() {
    let backend = MemoryBackend::with(vec![issue(1), issue(2)]);
    let (mut view, store) = loaded_view(&backend).await;
    let lists_before = backend.list_calls();

    press(&mut view, 'j');
    press(&mut view, 'd');
    assert_eq!(view.pending_delete, Some(2));
    press(&mut view, 'y');

    wait_until(|| backend.find(2).is_none()).await;
    wait_until(|| backend.list_calls() == lists_before + 1).await;
    wait_until(|| store.with_state(|s| s.items.len() == 1 && !s.is_loading())).await;
    assert_eq!(store.snapshot().items, vec![issue(1)]);
  }

  #[tokio::test]
  async fn test_enter_opens_selected_issue() {
    let backend = MemoryBackend::with(vec![issue(4)]);
    let (mut view, _store) = loaded_view(&backend).await;

    match view.handle_key(KeyEvent::from(KeyCode::Enter)) {
      ViewAction::Push(detail) => assert_eq!(detail.breadcrumb_label(), "Issue 4"),
      _ => panic!("expected the detail view"),
    }
  }

  #[tokio::test]
  async fn test_unbound_keys_fall_through() {
    let backend = MemoryBackend::<Issue>::with(vec![]);
    let (mut view, _store) = loaded_view(&backend).await;
    assert!(matches!(press(&mut view, 'm'), ViewAction::NotHandled));
    assert!(matches!(press(&mut view, 'q'), ViewAction::Pop));
  }
}
