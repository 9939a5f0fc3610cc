//! Request lifecycle state for one entity collection and its reducer.
//!
//! Every intent goes through a Request phase and then exactly one of
//! Success or Failure. The reducer maps those phases onto a snapshot that
//! views read from; it is the only code that mutates `CollectionState`.

use super::draft::{self, DraftError, DraftField};
use crate::api::error::RequestError;
use crate::api::types::Entity;
use std::collections::BTreeMap;
use tracing::warn;

/// What the collection is busy with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
  #[default]
  Idle,
  /// A read intent is in flight
  Loading,
  /// A write intent is in flight
  Updating,
}

/// The kind of intent a lifecycle phase belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntentKind {
  List,
  ListSubset(String),
  GetOne,
  Create,
  Update,
  Delete,
}

impl IntentKind {
  pub fn is_write(&self) -> bool {
    matches!(
      self,
      IntentKind::Create | IntentKind::Update | IntentKind::Delete
    )
  }

  pub fn label(&self) -> String {
    match self {
      IntentKind::List => "list".to_string(),
      IntentKind::ListSubset(name) => format!("list[{}]", name),
      IntentKind::GetOne => "get".to_string(),
      IntentKind::Create => "create".to_string(),
      IntentKind::Update => "update".to_string(),
      IntentKind::Delete => "delete".to_string(),
    }
  }
}

/// Resolved value of a successful intent
#[derive(Debug, Clone, PartialEq)]
pub enum Payload<E> {
  List(Vec<E>),
  Subset { name: String, items: Vec<E> },
  One(E),
  /// Create or update result
  Saved(E),
  Deleted,
}

/// Input to the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum Action<E> {
  Request(IntentKind),
  Success(Payload<E>),
  Failure(RequestError),
  Reset,
  SetDraftField(DraftField),
}

/// Snapshot of one entity collection as seen by the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<E> {
  /// Last base list, replaced wholesale on every successful List
  pub items: Vec<E>,
  /// Server-filtered views of the same collection, by subset name
  pub named_subsets: BTreeMap<String, Vec<E>>,
  /// Last fetched or written record, or the empty record
  pub current: E,
  pub status: Status,
  pub last_error: Option<RequestError>,
  pub last_write_succeeded: bool,
}

impl<E: Default> Default for CollectionState<E> {
  fn default() -> Self {
    Self {
      items: Vec::new(),
      named_subsets: BTreeMap::new(),
      current: E::default(),
      status: Status::Idle,
      last_error: None,
      last_write_succeeded: false,
    }
  }
}

impl<E: Entity> CollectionState<E> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Items of a named subset; an unfetched subset reads as empty
  pub fn subset(&self, name: &str) -> &[E] {
    self
      .named_subsets
      .get(name)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn is_loading(&self) -> bool {
    self.status == Status::Loading
  }

  pub fn is_updating(&self) -> bool {
    self.status == Status::Updating
  }

  /// Apply one lifecycle phase.
  ///
  /// Only a draft edit can fail; on failure the state is left untouched.
  pub fn reduce(&mut self, action: Action<E>) -> Result<(), DraftError> {
    match action {
      Action::Request(kind) => {
        self.last_error = None;
        self.last_write_succeeded = false;
        self.status = if kind.is_write() {
          Status::Updating
        } else {
          Status::Loading
        };
      }
      Action::Success(payload) => {
        self.status = Status::Idle;
        match payload {
          Payload::List(items) => self.items = items,
          Payload::Subset { name, items } => {
            self.named_subsets.insert(name, items);
          }
          Payload::One(entity) => self.current = entity,
          Payload::Saved(entity) => {
            self.current = entity;
            self.last_write_succeeded = true;
          }
          Payload::Deleted => {
            self.current = E::default();
            self.last_write_succeeded = true;
          }
        }
      }
      Action::Failure(error) => {
        self.status = Status::Idle;
        self.last_write_succeeded = false;
        self.last_error = Some(error);
      }
      Action::Reset => *self = Self::default(),
      Action::SetDraftField(field) => {
        self.current = draft::merge_field(&self.current, &field)?;
      }
    }
    Ok(())
  }

  /// Apply a lifecycle phase, which unlike a draft edit cannot fail
  pub(crate) fn apply_phase(&mut self, action: Action<E>) {
    if let Err(e) = self.reduce(action) {
      warn!(error = %e, "lifecycle phase rejected");
    }
  }
}
