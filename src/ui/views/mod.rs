mod issue_detail;
mod issue_list;
mod monitor;

pub use issue_detail::IssueDetailView;
pub use issue_list::IssueListView;
pub use monitor::MonitorView;

use crate::api::error::RequestError;
use std::future::Future;
use tracing::debug;

/// Run a store intent in the background. Its outcome is already recorded in
/// the store state, so only a debug line is kept here.
pub(crate) fn spawn_intent<F, T>(intent: F)
where
  F: Future<Output = Result<T, RequestError>> + Send + 'static,
  T: Send + 'static,
{
  tokio::spawn(async move {
    if let Err(e) = intent.await {
      debug!(error = %e, "intent failed");
    }
  });
}
