use crate::store::StoreEvent;
use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::debug;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized; the next draw picks up the new size
  Resize,
  /// Periodic tick for redraws and dashboard polling
  Tick,
  /// A store applied a change; redraw without waiting for the next tick
  Store(StoreEvent),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let input_tx = tx.clone();

    // Terminal polling blocks, keep it off the async workers
    tokio::task::spawn_blocking(move || loop {
      let event = match event::poll(tick_rate) {
        Ok(true) => match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Event::Key(key),
          Ok(CrosstermEvent::Resize(_, _)) => Event::Resize,
          _ => continue,
        },
        Ok(false) => Event::Tick,
        Err(_) => break,
      };

      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Feed a store's change stream into the event queue
  pub fn forward(&self, changes: broadcast::Receiver<StoreEvent>) {
    tokio::spawn(forward_changes(changes, self.tx.clone()));
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

async fn forward_changes(
  mut changes: broadcast::Receiver<StoreEvent>,
  tx: mpsc::UnboundedSender<Event>,
) {
  loop {
    match changes.recv().await {
      Ok(change) => {
        if tx.send(Event::Store(change)).is_err() {
          break;
        }
      }
      // Only redraw hints are lost; the state itself is current
      Err(RecvError::Lagged(skipped)) => debug!(skipped, "store events lagged"),
      Err(RecvError::Closed) => break,
    }
  }
}
