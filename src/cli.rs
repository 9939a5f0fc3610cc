use crate::api::types::{Comment, Entity, Issue, Priority, Resolution};
use crate::store::{Registered, Registry, Store, WriteOutcome};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Dashboard of the configured issue subsets (default)
  Monitor,
  /// Browse and edit the full issue list
  Browse,
  /// Issue operations, printed as JSON
  #[command(subcommand)]
  Issue(IssueCommand),
  /// Comment operations, printed as JSON
  #[command(subcommand)]
  Comment(CommentCommand),
}

#[derive(Subcommand, Debug)]
pub enum IssueCommand {
  /// List all issues, or a named subset
  List {
    /// Subset name, e.g. open or reviewed
    #[arg(long)]
    subset: Option<String>,
  },
  /// Fetch one issue by id
  Get { id: i64 },
  /// Create an issue
  Create {
    #[arg(long)]
    number: i32,
    #[command(flatten)]
    fields: IssueFields,
  },
  /// Change fields of an existing issue
  Update {
    id: i64,
    #[arg(long)]
    number: Option<i32>,
    #[command(flatten)]
    fields: IssueFields,
  },
  /// Delete an issue by id
  Delete { id: i64 },
}

#[derive(Args, Debug, Default)]
pub struct IssueFields {
  /// SHOWSTOPPER, EMERGENCY, HIGH, LOW, ROUTINE or DEFER
  #[arg(long)]
  priority: Option<Priority>,
  /// NEW, REVIEWED, FIXED, ...
  #[arg(long)]
  resolution: Option<Resolution>,
  #[arg(long)]
  description: Option<String>,
  /// Id of the reviewing user
  #[arg(long)]
  reviewer_id: Option<i64>,
  /// RFC 3339 instant, e.g. 2024-03-01T09:30:00Z
  #[arg(long)]
  reported_date: Option<DateTime<Utc>>,
}

#[derive(Subcommand, Debug)]
pub enum CommentCommand {
  /// List all comments
  List,
  /// Fetch one comment by id
  Get { id: i64 },
  /// Add a comment to an issue
  Create {
    /// Id of the issue being commented on
    #[arg(long)]
    issue: i64,
    #[arg(long)]
    description: String,
  },
  /// Change the text of an existing comment
  Update {
    id: i64,
    #[arg(long)]
    description: Option<String>,
  },
  /// Delete a comment by id
  Delete { id: i64 },
}

pub async fn run_issue(registry: &Registry, command: IssueCommand) -> Result<()> {
  match command {
    IssueCommand::List { subset: None } => list::<Issue>(registry).await,
    IssueCommand::List { subset: Some(name) } => {
      print_json(&registry.issues().list_subset(&name).await?)
    }
    IssueCommand::Get { id } => get::<Issue>(registry, id).await,
    IssueCommand::Create { number, fields } => {
      create::<Issue>(registry, |store| {
        store.set_draft_field("number", json!(number), None)?;
        store.set_draft_field("reportedDate", json!(Utc::now()), None)?;
        apply_issue_fields(store, fields)
      })
      .await
    }
    IssueCommand::Update { id, number, fields } => {
      update::<Issue>(registry, id, |store| {
        if let Some(number) = number {
          store.set_draft_field("number", json!(number), None)?;
        }
        apply_issue_fields(store, fields)
      })
      .await
    }
    IssueCommand::Delete { id } => delete::<Issue>(registry, id).await,
  }
}

pub async fn run_comment(registry: &Registry, command: CommentCommand) -> Result<()> {
  match command {
    CommentCommand::List => list::<Comment>(registry).await,
    CommentCommand::Get { id } => get::<Comment>(registry, id).await,
    CommentCommand::Create { issue, description } => {
      create::<Comment>(registry, |store| {
        store.set_draft_field("description", json!(description), None)?;
        store.set_draft_field("date", json!(Utc::now()), None)?;
        store.set_draft_field("issue", json!({ "id": issue }), None)?;
        Ok(())
      })
      .await
    }
    CommentCommand::Update { id, description } => {
      update::<Comment>(registry, id, |store| {
        if let Some(description) = description {
          store.set_draft_field("description", json!(description), None)?;
        }
        Ok(())
      })
      .await
    }
    CommentCommand::Delete { id } => delete::<Comment>(registry, id).await,
  }
}

async fn list<E: Registered>(registry: &Registry) -> Result<()> {
  print_json(&registry.store::<E>().list().await?)
}

async fn get<E: Registered>(registry: &Registry, id: i64) -> Result<()> {
  print_json(&registry.store::<E>().get_one(id).await?)
}

/// Build the draft from an empty record and create it
async fn create<E: Registered>(
  registry: &Registry,
  fill: impl FnOnce(&Store<E>) -> Result<()>,
) -> Result<()> {
  let store = registry.store::<E>();
  store.reset();
  fill(store)?;

  let draft = store.snapshot().current;
  finish_write(store.create(draft).await?).await
}

/// Load the stored record into the draft, edit it and save it
async fn update<E: Registered>(
  registry: &Registry,
  id: i64,
  edit: impl FnOnce(&Store<E>) -> Result<()>,
) -> Result<()> {
  let store = registry.store::<E>();
  store.get_one(id).await?;
  edit(store)?;

  let draft = store.snapshot().current;
  finish_write(store.update(draft).await?).await
}

async fn delete<E: Registered>(registry: &Registry, id: i64) -> Result<()> {
  finish_write(registry.store::<E>().delete(id).await?).await
}

fn apply_issue_fields(store: &Store<Issue>, fields: IssueFields) -> Result<()> {
  if let Some(priority) = fields.priority {
    store.set_draft_field("priority", json!(priority.as_str()), None)?;
  }
  if let Some(resolution) = fields.resolution {
    store.set_draft_field("resolution", json!(resolution.as_str()), None)?;
  }
  if let Some(description) = fields.description {
    store.set_draft_field("description", json!(description), None)?;
  }
  if let Some(reviewer_id) = fields.reviewer_id {
    store.set_draft_field("reviewerId", json!(reviewer_id), None)?;
  }
  if let Some(reported_date) = fields.reported_date {
    store.set_draft_field("reportedDate", json!(reported_date), None)?;
  }
  Ok(())
}

/// Print the write result, then wait for the chained list refresh so the
/// process does not exit with it in flight
async fn finish_write<T: Serialize, E: Entity>(outcome: WriteOutcome<T, E>) -> Result<()> {
  print_json(&outcome.value)?;

  let items = outcome
    .refresh
    .await?
    .map_err(|e| eyre!("write succeeded but the refresh failed: {}", e))?;
  info!(count = items.len(), "refreshed list after write");
  eprintln!("{}: {} after refresh", E::COLLECTION, items.len());
  Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
