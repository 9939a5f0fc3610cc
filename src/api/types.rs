//! Entity records exchanged with the issue tracker backend.
//!
//! Every field is optional so that the empty record (`{}`) is a valid value:
//! it is what a store holds before anything is fetched and after a delete.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// A record kept in an entity store.
pub trait Entity:
  Serialize + DeserializeOwned + Clone + Default + fmt::Debug + Send + Sync + 'static
{
  /// Path segment of the collection resource, relative to the API root
  const COLLECTION: &'static str;
  /// Singular name used in logs
  const NAME: &'static str;

  fn id(&self) -> Option<i64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
  Showstopper,
  Emergency,
  High,
  Low,
  Routine,
  Defer,
}

impl Priority {
  pub const ALL: [Priority; 6] = [
    Priority::Showstopper,
    Priority::Emergency,
    Priority::High,
    Priority::Low,
    Priority::Routine,
    Priority::Defer,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Priority::Showstopper => "SHOWSTOPPER",
      Priority::Emergency => "EMERGENCY",
      Priority::High => "HIGH",
      Priority::Low => "LOW",
      Priority::Routine => "ROUTINE",
      Priority::Defer => "DEFER",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
  New,
  Released,
  Duplicate,
  Tested,
  Fixed,
  PartiallyFixed,
  Reviewed,
  CannotReproduce,
}

impl Resolution {
  pub const ALL: [Resolution; 8] = [
    Resolution::New,
    Resolution::Released,
    Resolution::Duplicate,
    Resolution::Tested,
    Resolution::Fixed,
    Resolution::PartiallyFixed,
    Resolution::Reviewed,
    Resolution::CannotReproduce,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      Resolution::New => "NEW",
      Resolution::Released => "RELEASED",
      Resolution::Duplicate => "DUPLICATE",
      Resolution::Tested => "TESTED",
      Resolution::Fixed => "FIXED",
      Resolution::PartiallyFixed => "PARTIALLY_FIXED",
      Resolution::Reviewed => "REVIEWED",
      Resolution::CannotReproduce => "CANNOT_REPRODUCE",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl fmt::Display for Resolution {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when parsing an enumeration value from text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
  kind: &'static str,
  value: String,
}

fn normalize(s: &str) -> String {
  s.trim().replace(['-', ' '], "_").to_uppercase()
}

impl FromStr for Priority {
  type Err = ParseEnumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = normalize(s);
    Priority::ALL
      .into_iter()
      .find(|p| p.as_str() == wanted)
      .ok_or_else(|| ParseEnumError {
        kind: "priority",
        value: s.to_string(),
      })
  }
}

impl FromStr for Resolution {
  type Err = ParseEnumError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = normalize(s);
    Resolution::ALL
      .into_iter()
      .find(|r| r.as_str() == wanted)
      .ok_or_else(|| ParseEnumError {
        kind: "resolution",
        value: s.to_string(),
      })
  }
}

/// Reference to a related record; only the id travels on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
}

/// Reference to the owning user account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub login: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub number: Option<i32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub priority: Option<Priority>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolution: Option<Resolution>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reviewer_id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reported_date: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub comments: Vec<Comment>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<UserRef>,
  // Anything else the backend or a draft edit puts on the record
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub date: Option<DateTime<Utc>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub issue: Option<EntityRef>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user: Option<UserRef>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Entity for Issue {
  const COLLECTION: &'static str = "issues";
  const NAME: &'static str = "issue";

  fn id(&self) -> Option<i64> {
    self.id
  }
}

impl Entity for Comment {
  const COLLECTION: &'static str = "comments";
  const NAME: &'static str = "comment";

  fn id(&self) -> Option<i64> {
    self.id
  }
}
