use crossterm::event::KeyEvent;
use ratatui::prelude::*;

/// A keyboard shortcut hint for display in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortcut {
  pub key: &'static str,
  pub label: &'static str,
}

impl Shortcut {
  pub const fn new(key: &'static str, label: &'static str) -> Self {
    Self { key, label }
  }
}

/// Actions that a view can request in response to user input
pub enum ViewAction {
  /// Key consumed, nothing else to do
  None,
  /// Key not used by the view; the app may treat it as a global key
  NotHandled,
  /// Push a new view onto the stack
  Push(Box<dyn View>),
  /// Pop current view from stack (go back)
  Pop,
}

/// Trait for view behavior
///
/// Views read entity state straight from their store on every render and
/// issue intents by spawning store calls; they never wait on a request.
pub trait View {
  /// Handle a key event, returning an action for App to execute
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction;

  /// Render the view to the frame
  fn render(&mut self, frame: &mut Frame, area: Rect);

  /// Get the breadcrumb label for this view
  fn breadcrumb_label(&self) -> String;

  /// Called on each tick while the view is on top of the stack
  fn tick(&mut self) {}

  /// Keyboard shortcuts to display in the header
  fn shortcuts(&self) -> Vec<Shortcut> {
    vec![Shortcut::new("q", "back")]
  }
}
