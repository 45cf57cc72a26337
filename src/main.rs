mod api;
mod app;
mod cache;
mod cli;
mod commands;
mod config;
mod event;
mod logging;
mod shell;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkfin")]
#[command(about = "A caching terminal dashboard for MUFAP mutual funds and PSX stocks")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pkfin/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// API base URL (overrides config and PKFIN_BASE_URL)
  #[arg(short, long, global = true)]
  base_url: Option<String>,

  /// Print raw JSON instead of tables
  #[arg(long, global = true)]
  json: bool,

  /// Without a command the interactive dashboard starts
  #[command(subcommand)]
  command: Option<cli::Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override base URL if specified on command line
  if let Some(base_url) = args.base_url {
    config.api.base_url = base_url;
  }

  let _log_guard = logging::init(&config.log)?;

  match args.command.unwrap_or(cli::Command::Dashboard) {
    cli::Command::Dashboard => {
      let mut app = app::App::new(config)?;
      app.run().await
    }
    command => cli::run(command, &config, args.json).await,
  }
}
