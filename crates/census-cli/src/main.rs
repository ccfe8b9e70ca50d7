//! `census`: fetch per-country demographic statistics and load them into a
//! local store.
//!
//! # Usage
//!
//! ```text
//! census fetch                     # reference list -> countries_data.json
//! census fetch --only EGY,FRA
//! census load-all                  # countries_data.json -> census.db
//! census load-one Egypt            # one record from the batch file
//! census load-one --fresh EGY      # one record straight from the API
//! census show EGY
//! census list
//! ```
//!
//! Settings come from `census.toml` (or `--config`) and `CENSUS_*`
//! environment variables.

mod commands;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "census", author, version, about = "Demographic statistics ingestion")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "census.toml")]
  config: PathBuf,

  /// SQLite store path; overrides the config file.
  #[arg(long, global = true, env = "CENSUS_STORE")]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Query the upstream API for each reference country and write the batch file.
  Fetch {
    /// Batch file to write; overrides the config file.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Restrict the run to these codes (comma-separated).
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,
  },

  /// Load every record of the batch file into the store.
  LoadAll {
    /// Batch file to read; overrides the config file.
    #[arg(short, long)]
    input: Option<PathBuf>,
  },

  /// Load a single country. Prompts on stdin when no identifier is given.
  LoadOne {
    /// Country code or name.
    ident: Option<String>,

    /// Batch file to read; overrides the config file.
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Fetch the record from the upstream API instead of the batch file.
    #[arg(long, conflicts_with = "input")]
    fresh: bool,
  },

  /// Print the stored yearly series of one country.
  Show {
    /// Country code or name.
    ident: String,
  },

  /// List stored countries.
  List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut settings = Settings::load(&cli.config)?;
  if let Some(store) = cli.store {
    settings.store_path = store;
  }

  match cli.command {
    Command::Fetch { output, only } => commands::fetch(&settings, output, &only).await,
    Command::LoadAll { input } => commands::load_all(&settings, input).await,
    Command::LoadOne { ident, input, fresh } => {
      commands::load_one(&settings, ident, input, fresh).await
    }
    Command::Show { ident } => commands::show(&settings, &ident).await,
    Command::List => commands::list(&settings).await,
  }
}
