//! In-progress edits to the current record, addressed by field name.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// One field edit, optionally paired with the content type of a binary
/// attachment stored under `<name>ContentType`
#[derive(Debug, Clone, PartialEq)]
pub struct DraftField {
  pub name: String,
  pub value: Value,
  pub content_type: Option<String>,
}

impl DraftField {
  pub fn new(name: impl Into<String>, value: Value) -> Self {
    Self {
      name: name.into(),
      value,
      content_type: None,
    }
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }

  pub fn content_type_key(&self) -> String {
    format!("{}ContentType", self.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
  #[error("record does not serialize to an object")]
  NotAnObject,
  #[error("field '{name}' rejected: {reason}")]
  Rejected { name: String, reason: String },
}

/// Merge `field` into `current`, returning the edited record.
pub fn merge_field<E>(current: &E, field: &DraftField) -> Result<E, DraftError>
where
  E: Serialize + DeserializeOwned,
{
  let rejected = |e: serde_json::Error| DraftError::Rejected {
    name: field.name.clone(),
    reason: e.to_string(),
  };

  let mut value = serde_json::to_value(current).map_err(rejected)?;
  let object = value.as_object_mut().ok_or(DraftError::NotAnObject)?;

  object.insert(field.name.clone(), field.value.clone());
  match &field.content_type {
    Some(ct) => {
      object.insert(field.content_type_key(), Value::String(ct.clone()));
    }
    None => {
      object.remove(&field.content_type_key());
    }
  }

  serde_json::from_value(value).map_err(rejected)
}
