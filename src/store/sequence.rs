use super::state::IntentKind;
use std::collections::HashMap;

/// Tags intents with increasing sequence numbers so that a response which
/// was overtaken by a newer intent of the same kind can be recognised.
#[derive(Debug, Default)]
pub struct SequenceGuard {
  last_issued: u64,
  latest: HashMap<IntentKind, u64>,
}

impl SequenceGuard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a new intent and return its sequence number
  pub fn issue(&mut self, kind: &IntentKind) -> u64 {
    self.last_issued += 1;
    self.latest.insert(kind.clone(), self.last_issued);
    self.last_issued
  }

  /// Whether `seq` is still the newest intent issued for `kind`
  pub fn is_latest(&self, kind: &IntentKind, seq: u64) -> bool {
    self.latest.get(kind).is_some_and(|&latest| latest == seq)
  }
}
