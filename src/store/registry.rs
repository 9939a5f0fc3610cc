use super::backend::Backend;
use super::handle::Store;
use crate::api::client::RestClient;
use crate::api::types::{Comment, Entity, Issue};
use crate::config::Config;
use std::sync::Arc;

/// One store per entity type, handed to every view and command that needs
/// entity state
#[derive(Clone)]
pub struct Registry {
  issues: Store<Issue>,
  comments: Store<Comment>,
}

/// Entity types that have a store in the registry
pub trait Registered: Entity {
  fn store(registry: &Registry) -> &Store<Self>;
}

impl Registered for Issue {
  fn store(registry: &Registry) -> &Store<Self> {
    &registry.issues
  }
}

impl Registered for Comment {
  fn store(registry: &Registry) -> &Store<Self> {
    &registry.comments
  }
}

impl Registry {
  pub fn new(issues: Store<Issue>, comments: Store<Comment>) -> Self {
    Self { issues, comments }
  }

  /// Stores backed by the REST API
  pub fn connect(client: &RestClient, config: &Config) -> Self {
    let issues: Arc<dyn Backend<Issue>> =
      Arc::new(client.collection::<Issue>(config.issues.subsets.clone()));
    let comments: Arc<dyn Backend<Comment>> =
      Arc::new(client.collection::<Comment>(config.comments.subsets.clone()));

    Self::new(
      Store::new(issues, config.discard_stale_responses),
      Store::new(comments, config.discard_stale_responses),
    )
  }

  pub fn store<E: Registered>(&self) -> &Store<E> {
    E::store(self)
  }

  pub fn issues(&self) -> &Store<Issue> {
    &self.issues
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::Status;

  #[test]
  fn test_stores_are_keyed_by_type() {
    let config = Config::from_url("http://127.0.0.1:9/api/");
    let client = RestClient::new(&config.api, None).unwrap();
    let registry = Registry::connect(&client, &config);

    registry
      .store::<Issue>()
      .set_draft_field("description", serde_json::json!("issue draft"), None)
      .unwrap();

    assert_eq!(
      registry.issues().snapshot().current.description.as_deref(),
      Some("issue draft")
    );
    assert_eq!(registry.store::<Comment>().snapshot().current, Comment::default());
    assert_eq!(registry.store::<Comment>().status(), Status::Idle);
  }

  #[test]
  fn test_clones_share_state() {
    let config = Config::from_url("http://127.0.0.1:9/api/");
    let client = RestClient::new(&config.api, None).unwrap();
    let registry = Registry::connect(&client, &config);
    let other = registry.clone();

    other
      .store::<Comment>()
      .set_draft_field("description", serde_json::json!("shared"), None)
      .unwrap();
    assert_eq!(
      registry.store::<Comment>().snapshot().current.description.as_deref(),
      Some("shared")
    );
  }
}
