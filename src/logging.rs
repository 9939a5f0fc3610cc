use crate::config::Config;
use color_eyre::Result;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "ISSUEDESK_LOG";
const LOG_FILE: &str = "issuedesk.log";

/// Route tracing output to a log file in the data directory.
///
/// The terminal belongs to the UI, so nothing is written to stdout or
/// stderr. Keep the returned guard alive until exit or buffered lines are
/// lost.
pub fn init(config: &Config) -> Result<WorkerGuard> {
  let dir = Config::data_dir()?;
  fs::create_dir_all(&dir)?;

  let appender = tracing_appender::rolling::never(&dir, LOG_FILE);
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let _ = tracing_subscriber::registry()
    .with(filter(config))
    .with(fmt::layer().with_writer(writer).with_ansi(false))
    .try_init();

  Ok(guard)
}

fn filter(config: &Config) -> EnvFilter {
  EnvFilter::try_from_env(LOG_ENV)
    .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)))
}

fn default_directives(level: &str) -> String {
  format!("issuedesk={},warn", level)
}
