mod api;
mod app;
mod cli;
mod config;
mod event;
mod logging;
mod store;
mod ui;

use api::RestClient;
use app::{App, StartView};
use clap::Parser;
use cli::Command;
use color_eyre::Result;
use std::path::PathBuf;
use store::Registry;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "issuedesk")]
#[command(about = "Terminal client and dashboard for an issue tracking REST API")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./issuedesk.yaml, then $XDG_CONFIG_HOME/issuedesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API root url, overrides api.url from the config file
  #[arg(short, long)]
  url: Option<String>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref(), args.url.as_deref())?;
  let _log_guard = logging::init(&config)?;

  let client = RestClient::new(&config.api, config::Config::api_token())?;
  info!(url = %client.base_url(), "starting");
  let registry = Registry::connect(&client, &config);

  let start = match args.command.unwrap_or(Command::Monitor) {
    Command::Monitor => StartView::Monitor,
    Command::Browse => StartView::Browse,
    Command::Issue(command) => return cli::run_issue(&registry, command).await,
    Command::Comment(command) => return cli::run_comment(&registry, command).await,
  };

  let mut app = App::new(config, registry, start);
  app.run().await
}
