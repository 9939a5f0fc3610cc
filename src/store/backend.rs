use crate::api::error::RequestError;
use async_trait::async_trait;

/// Remote collection resource a store issues its intents against
#[async_trait]
pub trait Backend<E>: Send + Sync {
  async fn list(&self) -> Result<Vec<E>, RequestError>;

  async fn list_subset(&self, name: &str) -> Result<Vec<E>, RequestError>;

  async fn get(&self, id: i64) -> Result<E, RequestError>;

  async fn create(&self, entity: &E) -> Result<E, RequestError>;

  async fn update(&self, entity: &E) -> Result<E, RequestError>;

  async fn delete(&self, id: i64) -> Result<(), RequestError>;
}
