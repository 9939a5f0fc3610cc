use serde_json::Value;

/// Failure payload of a request against the backend.
///
/// Stores forward this verbatim to the presentation layer; the variants only
/// exist so the message reads well.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
  #[error("request failed with status {status}: {message}")]
  Status { status: u16, message: String },
  #[error("transport error: {0}")]
  Transport(String),
  #[error("could not decode response: {0}")]
  Decode(String),
  #[error("could not encode request: {0}")]
  Encode(String),
  #[error("unknown subset '{0}'")]
  UnknownSubset(String),
  #[error("invalid url: {0}")]
  InvalidUrl(String),
}

impl RequestError {
  /// Build a status error from a non-2xx response body.
  ///
  /// The backend answers with problem JSON; its `detail`, `title` or
  /// `message` is preferred over the raw body.
  pub fn from_status(status: u16, body: &str) -> Self {
    let message = serde_json::from_str::<Value>(body)
      .ok()
      .and_then(|v| {
        ["detail", "title", "message"]
          .iter()
          .find_map(|k| v.get(k).and_then(Value::as_str).map(str::to_string))
      })
      .unwrap_or_else(|| body.trim().to_string());

    RequestError::Status { status, message }
  }
}

impl From<reqwest::Error> for RequestError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_decode() {
      RequestError::Decode(e.to_string())
    } else {
      RequestError::Transport(e.to_string())
    }
  }
}
