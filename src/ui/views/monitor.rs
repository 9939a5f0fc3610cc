use crate::api::types::Issue;
use crate::config::MonitorConfig;
use crate::store::Store;
use crate::ui::renderfns::{issue_header, issue_row, ISSUE_WIDTHS};
use crate::ui::view::{Shortcut, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use futures::future::join_all;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Table};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Fetch state of one dashboard table
#[derive(Debug, Clone, PartialEq, Eq)]
enum SubsetFetch {
  Loading,
  Loaded,
  Failed(String),
}

type FetchStates = Arc<Mutex<BTreeMap<String, SubsetFetch>>>;

/// Dashboard of the configured issue subsets, refreshed on a fixed interval
pub struct MonitorView {
  issues: Store<Issue>,
  subsets: Vec<String>,
  poll_interval: Duration,
  last_poll: Option<Instant>,
  /// Per table outcome; the store only keeps the last error of any intent
  fetches: FetchStates,
}

impl MonitorView {
  pub fn new(issues: Store<Issue>, config: &MonitorConfig) -> Self {
    let mut view = Self {
      issues,
      subsets: config.subsets.clone(),
      poll_interval: config.poll_interval(),
      last_poll: None,
      fetches: Arc::default(),
    };
    view.poll();
    view
  }

  /// Fetch every subset concurrently
  fn poll(&mut self) {
    let fetches: Vec<_> = self
      .subsets
      .iter()
      .map(|name| {
        let store = self.issues.clone();
        let states = Arc::clone(&self.fetches);
        let name = name.clone();
        lock(&states).insert(name.clone(), SubsetFetch::Loading);

        async move {
          let outcome = match store.list_subset(&name).await {
            Ok(_) => SubsetFetch::Loaded,
            Err(e) => SubsetFetch::Failed(e.to_string()),
          };
          let failed = matches!(outcome, SubsetFetch::Failed(_));
          lock(&states).insert(name, outcome);
          failed
        }
      })
      .collect();

    tokio::spawn(async move {
      let failed = join_all(fetches).await.into_iter().filter(|f| *f).count();
      if failed > 0 {
        debug!(failed, "monitor poll finished with errors");
      }
    });
    self.last_poll = Some(Instant::now());
  }

  fn poll_due(&self, now: Instant) -> bool {
    match self.last_poll {
      Some(last) => now.duration_since(last) >= self.poll_interval,
      None => true,
    }
  }

  fn fetch_state(&self, name: &str) -> SubsetFetch {
    lock(&self.fetches)
      .get(name)
      .cloned()
      .unwrap_or(SubsetFetch::Loading)
  }

  fn render_subset(&self, frame: &mut Frame, area: Rect, name: &str) {
    let rows: Vec<_> = self
      .issues
      .with_state(|state| state.subset(name).iter().map(issue_row).collect());
    let fetch = self.fetch_state(name);

    let title = match &fetch {
      SubsetFetch::Loading => format!(" {} issues (loading...) ", capitalize(name)),
      SubsetFetch::Failed(e) => format!(" {} issues (error: {}) ", capitalize(name), e),
      SubsetFetch::Loaded => format!(" {} issues ({}) ", capitalize(name), rows.len()),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if rows.is_empty() && fetch != SubsetFetch::Loading {
      let paragraph = Paragraph::new(format!(
        "It looks like there are no {} issues at this time!",
        name
      ))
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let table = Table::new(rows, ISSUE_WIDTHS)
      .header(issue_header())
      .block(block);
    frame.render_widget(table, area);
  }
}

fn lock(states: &FetchStates) -> MutexGuard<'_, BTreeMap<String, SubsetFetch>> {
  states.lock().unwrap_or_else(PoisonError::into_inner)
}

fn capitalize(s: &str) -> String {
  let mut chars = s.chars();
  match chars.next() {
    Some(first) => first.to_uppercase().chain(chars).collect(),
    None => String::new(),
  }
}

impl View for MonitorView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.poll();
        ViewAction::None
      }
      KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
      _ => ViewAction::NotHandled,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    if self.subsets.is_empty() {
      let paragraph = Paragraph::new("No subsets configured under monitor.subsets.")
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let constraints = vec![Constraint::Ratio(1, self.subsets.len() as u32); self.subsets.len()];
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints(constraints)
      .split(area);

    for (name, chunk) in self.subsets.iter().zip(chunks.iter()) {
      self.render_subset(frame, *chunk, name);
    }
  }

  fn breadcrumb_label(&self) -> String {
    "Monitor".to_string()
  }

  fn tick(&mut self) {
    if self.poll_due(Instant::now()) {
      self.poll();
    }
  }

  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![
      Shortcut::new("r", "refresh"),
      Shortcut::new("i", "issues"),
      Shortcut::new("q", "quit"),
    ]
  }
}
