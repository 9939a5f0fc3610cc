//! In-memory backend shared by store, view and command tests.

use super::backend::Backend;
use crate::api::error::RequestError;
use crate::api::types::{Comment, Entity, Issue, Resolution};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// How a record answers the server-side subset filters
pub(crate) trait SubsetMember {
  /// `None` when the subset does not exist
  fn in_subset(&self, name: &str) -> Option<bool>;
}

impl SubsetMember for Issue {
  fn in_subset(&self, name: &str) -> Option<bool> {
    match name {
      "open" => Some(self.resolution == Some(Resolution::New)),
      "reviewed" => Some(self.resolution == Some(Resolution::Reviewed)),
      _ => None,
    }
  }
}

impl SubsetMember for Comment {
  fn in_subset(&self, _name: &str) -> Option<bool> {
    None
  }
}

/// Collection kept in memory, with scriptable failures and list gates
pub(crate) struct MemoryBackend<E> {
  items: Mutex<Vec<E>>,
  next_id: AtomicI64,
  fail_next: Mutex<Option<RequestError>>,
  list_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
  list_calls: AtomicUsize,
  subset_calls: AtomicUsize,
  update_calls: AtomicUsize,
}

impl<E: Entity + SubsetMember> MemoryBackend<E> {
  pub(crate) fn with(items: Vec<E>) -> Arc<Self> {
    Arc::new(Self {
      items: Mutex::new(items),
      next_id: AtomicI64::new(100),
      fail_next: Mutex::new(None),
      list_gates: Mutex::new(VecDeque::new()),
      list_calls: AtomicUsize::new(0),
      subset_calls: AtomicUsize::new(0),
      update_calls: AtomicUsize::new(0),
    })
  }

  pub(crate) fn items(&self) -> Vec<E> {
    self.items.lock().unwrap().clone()
  }

  pub(crate) fn find(&self, id: i64) -> Option<E> {
    self.items().into_iter().find(|e| e.id() == Some(id))
  }

  pub(crate) fn push(&self, item: E) {
    self.items.lock().unwrap().push(item);
  }

  pub(crate) fn clear(&self) {
    self.items.lock().unwrap().clear();
  }

  pub(crate) fn fail_next(&self, error: RequestError) {
    *self.fail_next.lock().unwrap() = Some(error);
  }

  /// Hold the next list response until the returned sender fires
  pub(crate) fn gate_next_list(&self) -> oneshot::Sender<()> {
    let (tx, rx) = oneshot::channel();
    self.list_gates.lock().unwrap().push_back(rx);
    tx
  }

  pub(crate) fn list_calls(&self) -> usize {
    self.list_calls.load(Ordering::SeqCst)
  }

  pub(crate) fn subset_calls(&self) -> usize {
    self.subset_calls.load(Ordering::SeqCst)
  }

  pub(crate) fn update_calls(&self) -> usize {
    self.update_calls.load(Ordering::SeqCst)
  }

  fn take_failure(&self) -> Result<(), RequestError> {
    match self.fail_next.lock().unwrap().take() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  fn assign_id(entity: &E, id: i64) -> E {
    let mut value = serde_json::to_value(entity).unwrap();
    value["id"] = json!(id);
    serde_json::from_value(value).unwrap()
  }
}

#[async_trait]
impl<E: Entity + SubsetMember> Backend<E> for MemoryBackend<E> {
  async fn list(&self) -> Result<Vec<E>, RequestError> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    let items = self.items();
    let gate = self.list_gates.lock().unwrap().pop_front();
    if let Some(gate) = gate {
      let _ = gate.await;
    }
    self.take_failure()?;
    Ok(items)
  }

  async fn list_subset(&self, name: &str) -> Result<Vec<E>, RequestError> {
    self.subset_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    if E::default().in_subset(name).is_none() {
      return Err(RequestError::UnknownSubset(name.to_string()));
    }
    Ok(
      self
        .items()
        .into_iter()
        .filter(|item| item.in_subset(name) == Some(true))
        .collect(),
    )
  }

  async fn get(&self, id: i64) -> Result<E, RequestError> {
    self.take_failure()?;
    self
      .find(id)
      .ok_or_else(|| RequestError::from_status(404, "Not Found"))
  }

  async fn create(&self, entity: &E) -> Result<E, RequestError> {
    self.take_failure()?;
    let saved = Self::assign_id(entity, self.next_id.fetch_add(1, Ordering::SeqCst));
    self.push(saved.clone());
    Ok(saved)
  }

  async fn update(&self, entity: &E) -> Result<E, RequestError> {
    self.update_calls.fetch_add(1, Ordering::SeqCst);
    self.take_failure()?;
    let mut items = self.items.lock().unwrap();
    let slot = items
      .iter_mut()
      .find(|e| e.id().is_some() && e.id() == entity.id())
      .ok_or_else(|| RequestError::from_status(400, "Invalid id"))?;
    *slot = entity.clone();
    Ok(entity.clone())
  }

  async fn delete(&self, id: i64) -> Result<(), RequestError> {
    self.take_failure()?;
    self.items.lock().unwrap().retain(|e| e.id() != Some(id));
    Ok(())
  }
}

/// Poll `condition` until it holds, failing the test after about a second
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
  for _ in 0..200 {
    if condition() {
      return;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
  }
  panic!("condition not reached");
}
