mod app;
mod cache;
mod config;
mod error;
mod journal;
mod ledger;
mod mutation;
mod notify;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;

use crate::ledger::types::Network;

#[derive(Parser, Debug)]
#[command(name = "jotter")]
#[command(about = "A command-line client for a ledger-backed journal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jotter/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Network to operate on (overrides the configured default)
  #[arg(short, long)]
  network: Option<Network>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Check whether the backend program is deployed
  Status,
  /// List all journal records
  List,
  /// Invalidate cached views on the active network and re-list
  Refresh,
  /// Show a single record by title
  Show { title: String },
  /// Create a new record
  Create {
    title: String,
    message: String,
    /// Owner identity (defaults to the configured signer)
    #[arg(long)]
    owner: Option<String>,
  },
  /// Replace a record's message
  Update { title: String, message: String },
  /// Delete a record
  Delete { title: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_tracing();

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let app = app::App::new(&config, args.network)?;

  match args.command {
    Command::Status => app.status().await,
    Command::List => app.list().await,
    Command::Refresh => app.refresh().await,
    Command::Show { title } => app.show(&title).await,
    Command::Create {
      title,
      message,
      owner,
    } => app.create(title, message, owner).await,
    Command::Update { title, message } => app.update(title, message).await,
    Command::Delete { title } => app.delete(title).await,
  }
}

/// Log to a file under the user data dir; stdout stays clean for output.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
  let log_dir = dirs::data_dir()
    .map(|d| d.join("jotter"))
    .unwrap_or_else(|| PathBuf::from("."));
  let appender = tracing_appender::rolling::daily(log_dir, "jotter.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jotter=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  guard
}
