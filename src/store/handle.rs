use super::backend::Backend;
use super::draft::{DraftError, DraftField};
use super::sequence::SequenceGuard;
use super::state::{Action, CollectionState, IntentKind, Payload, Status};
use crate::api::error::RequestError;
use crate::api::types::Entity;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 256;

/// Lifecycle phase reported to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Request,
  Success,
  Failure,
  /// A response arrived after a newer intent of the same kind was issued
  /// and was dropped without touching the state
  Discarded,
}

/// Notification of a change applied to a store, in application order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
  Transition {
    seq: u64,
    kind: IntentKind,
    phase: Phase,
  },
  Reset,
  DraftFieldSet {
    name: String,
  },
}

/// Result of a create/update/delete.
///
/// `refresh` is the base list fetch chained after the write; it has been
/// spawned but not necessarily completed.
#[derive(Debug)]
pub struct WriteOutcome<T, E> {
  pub value: T,
  pub refresh: JoinHandle<Result<Vec<E>, RequestError>>,
}

struct Shared<E> {
  state: CollectionState<E>,
  sequence: SequenceGuard,
}

struct Inner<E> {
  backend: Arc<dyn Backend<E>>,
  shared: Mutex<Shared<E>>,
  events: broadcast::Sender<StoreEvent>,
  discard_stale: bool,
}

/// Request lifecycle store for one entity type.
///
/// Cloning is cheap and every clone sees the same state. Each phase
/// transition is applied under a single lock, so readers never observe a
/// half-applied phase.
pub struct Store<E> {
  inner: Arc<Inner<E>>,
}

impl<E> Clone for Store<E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
    }
  }
}

impl<E: Entity> Store<E> {
  /// Create a store over `backend`.
  ///
  /// With `discard_stale` set, a response is applied only if no newer
  /// intent of the same kind was issued in the meantime. Without it the
  /// last response to arrive wins.
  pub fn new(backend: Arc<dyn Backend<E>>, discard_stale: bool) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Inner {
        backend,
        shared: Mutex::new(Shared {
          state: CollectionState::new(),
          sequence: SequenceGuard::new(),
        }),
        events,
        discard_stale,
      }),
    }
  }

  // Read projections

  /// Clone of the current state
  pub fn snapshot(&self) -> CollectionState<E> {
    self.lock().state.clone()
  }

  /// Borrow the current state without cloning it
  pub fn with_state<R>(&self, f: impl FnOnce(&CollectionState<E>) -> R) -> R {
    f(&self.lock().state)
  }

  pub fn status(&self) -> Status {
    self.lock().state.status
  }

  /// Subscribe to every change applied from now on
  pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
    self.inner.events.subscribe()
  }

  // Intents

  /// Fetch the base collection, replacing `items`
  pub async fn list(&self) -> Result<Vec<E>, RequestError> {
    let seq = self.begin(IntentKind::List);
    self.fetch_list(seq).await
  }

  /// Fetch a named subset, replacing only that subset
  pub async fn list_subset(&self, name: &str) -> Result<Vec<E>, RequestError> {
    let kind = IntentKind::ListSubset(name.to_string());
    let seq = self.begin(kind.clone());
    let result = self.inner.backend.list_subset(name).await;
    self.resolve(
      seq,
      kind,
      result.clone().map(|items| Payload::Subset {
        name: name.to_string(),
        items,
      }),
    );
    result
  }

  /// Fetch one record into `current`
  pub async fn get_one(&self, id: i64) -> Result<E, RequestError> {
    let seq = self.begin(IntentKind::GetOne);
    let result = self.inner.backend.get(id).await;
    self.resolve(seq, IntentKind::GetOne, result.clone().map(Payload::One));
    result
  }

  pub async fn create(&self, entity: E) -> Result<WriteOutcome<E, E>, RequestError> {
    let seq = self.begin(IntentKind::Create);
    let result = self.inner.backend.create(&entity).await;
    self.resolve(seq, IntentKind::Create, result.clone().map(Payload::Saved));
    let saved = result?;
    Ok(WriteOutcome {
      value: saved,
      refresh: self.spawn_refresh(),
    })
  }

  pub async fn update(&self, entity: E) -> Result<WriteOutcome<E, E>, RequestError> {
    let seq = self.begin(IntentKind::Update);
    let result = self.inner.backend.update(&entity).await;
    self.resolve(seq, IntentKind::Update, result.clone().map(Payload::Saved));
    let saved = result?;
    Ok(WriteOutcome {
      value: saved,
      refresh: self.spawn_refresh(),
    })
  }

  pub async fn delete(&self, id: i64) -> Result<WriteOutcome<(), E>, RequestError> {
    let seq = self.begin(IntentKind::Delete);
    let result = self.inner.backend.delete(id).await;
    self.resolve(
      seq,
      IntentKind::Delete,
      result.clone().map(|()| Payload::Deleted),
    );
    result?;
    Ok(WriteOutcome {
      value: (),
      refresh: self.spawn_refresh(),
    })
  }

  /// Merge a field (and optionally its content type) into `current`
  pub fn set_draft_field(
    &self,
    name: &str,
    value: Value,
    content_type: Option<&str>,
  ) -> Result<(), DraftError> {
    let mut field = DraftField::new(name, value);
    if let Some(ct) = content_type {
      field = field.with_content_type(ct);
    }

    let mut shared = self.lock();
    shared.state.reduce(Action::SetDraftField(field))?;
    self.emit(StoreEvent::DraftFieldSet {
      name: name.to_string(),
    });
    Ok(())
  }

  /// Return the state to its initial shape
  pub fn reset(&self) {
    let mut shared = self.lock();
    shared.state.apply_phase(Action::Reset);
    self.emit(StoreEvent::Reset);
  }

  // Lifecycle plumbing

  fn lock(&self) -> MutexGuard<'_, Shared<E>> {
    self
      .inner
      .shared
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn emit(&self, event: StoreEvent) {
    // No subscribers is fine
    let _ = self.inner.events.send(event);
  }

  /// Apply the Request phase and return the intent's sequence number
  fn begin(&self, kind: IntentKind) -> u64 {
    let mut shared = self.lock();
    let seq = shared.sequence.issue(&kind);
    shared.state.apply_phase(Action::Request(kind.clone()));
    debug!(entity = E::NAME, intent = %kind.label(), seq, "request");
    self.emit(StoreEvent::Transition {
      seq,
      kind,
      phase: Phase::Request,
    });
    seq
  }

  /// Apply the Success or Failure phase, unless the response is stale
  fn resolve(&self, seq: u64, kind: IntentKind, outcome: Result<Payload<E>, RequestError>) {
    let mut shared = self.lock();

    if self.inner.discard_stale && !shared.sequence.is_latest(&kind, seq) {
      debug!(entity = E::NAME, intent = %kind.label(), seq, "discarding stale response");
      self.emit(StoreEvent::Transition {
        seq,
        kind,
        phase: Phase::Discarded,
      });
      return;
    }

    let (phase, action) = match outcome {
      Ok(payload) => {
        debug!(entity = E::NAME, intent = %kind.label(), seq, "success");
        (Phase::Success, Action::Success(payload))
      }
      Err(error) => {
        warn!(entity = E::NAME, intent = %kind.label(), seq, %error, "request failed");
        (Phase::Failure, Action::Failure(error))
      }
    };
    shared.state.apply_phase(action);
    self.emit(StoreEvent::Transition { seq, kind, phase });
  }

  async fn fetch_list(&self, seq: u64) -> Result<Vec<E>, RequestError> {
    let result = self.inner.backend.list().await;
    self.resolve(seq, IntentKind::List, result.clone().map(Payload::List));
    result
  }

  /// Re-issue the base list after a successful write
  fn spawn_refresh(&self) -> JoinHandle<Result<Vec<E>, RequestError>> {
    let store = self.clone();
    tokio::spawn(async move { store.list().await })
  }
}
