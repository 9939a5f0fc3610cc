use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::store::{Phase, Registry, Status, StoreEvent};
use crate::ui;
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{IssueListView, MonitorView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

/// Root view the terminal UI opens on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartView {
  Monitor,
  Browse,
}

/// Main application state
pub struct App {
  /// Navigation stack, root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  registry: Registry,

  config: Config,

  /// Outcome of the last write, shown in the footer
  notice: Option<String>,

  should_quit: bool,
}

impl App {
  pub fn new(config: Config, registry: Registry, start: StartView) -> Self {
    let mut app = Self {
      view_stack: Vec::new(),
      registry,
      config,
      notice: None,
      should_quit: false,
    };
    app.switch_root(start);
    app
  }

  pub async fn run(&mut self) -> Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Restore the terminal even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(Duration::from_millis(250));
    events.forward(self.registry.issues().subscribe());

    while !self.should_quit {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Tick) => {
          if let Some(view) = self.current_view_mut() {
            view.tick();
          }
        }
        Some(Event::Store(change)) => self.note_change(&change),
        Some(Event::Resize) => {}
        None => break,
      }
    }

    Ok(())
  }

  pub fn api_url(&self) -> &str {
    &self.config.api.url
  }

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|view| view.breadcrumb_label())
      .collect()
  }

  /// Footer text: last write outcome and the issue store's status
  pub fn footer_note(&self) -> String {
    let status = match self.registry.issues().status() {
      Status::Idle => "idle",
      Status::Loading => "loading",
      Status::Updating => "saving",
    };

    match &self.notice {
      Some(notice) => format!("{} | {} | ctrl-c quit", notice, status),
      None => format!("{} | ctrl-c quit", status),
    }
  }

  fn note_change(&mut self, change: &StoreEvent) {
    if let Some(notice) = notice_for(change) {
      self.notice = Some(notice);
    }
  }

  fn switch_root(&mut self, start: StartView) {
    let root: Box<dyn View> = match start {
      StartView::Monitor => Box::new(MonitorView::new(
        self.registry.issues().clone(),
        &self.config.monitor,
      )),
      StartView::Browse => Box::new(IssueListView::new(self.registry.issues().clone())),
    };
    info!(view = %root.breadcrumb_label(), "switching root view");
    self.view_stack.clear();
    self.view_stack.push(root);
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let action = match self.current_view_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::Pop,
    };

    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::NotHandled => self.handle_global_key(key),
    }
  }

  fn handle_global_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('m') => self.switch_root(StartView::Monitor),
      KeyCode::Char('i') => self.switch_root(StartView::Browse),
      _ => {}
    }
  }
}

/// Footer notice for a write outcome
fn notice_for(change: &StoreEvent) -> Option<String> {
  let StoreEvent::Transition { seq, kind, phase } = change else {
    return None;
  };

  match phase {
    Phase::Success if kind.is_write() => Some(format!("{} done", kind.label())),
    Phase::Failure if kind.is_write() => Some(format!("{} failed", kind.label())),
    Phase::Discarded => {
      debug!(seq, intent = %kind.label(), "stale response dropped");
      None
    }
    _ => None,
  }
}
