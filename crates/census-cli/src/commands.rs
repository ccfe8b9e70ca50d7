//! Subcommand implementations.
//!
//! Each command prints its result on stdout; diagnostics go through
//! `tracing` to stderr.

use std::{
  io::{self, BufRead as _, Write as _},
  path::PathBuf,
};

use anyhow::{Context as _, Result, anyhow, bail};
use census_core::{
  country::CountryCode,
  fetch::run_fetch,
  load::{LoadOneOutcome, Loader},
  record::CountryRecord,
  store::PopulationStore as _,
};
use census_store_sqlite::SqliteStore;
use census_worldbank::WorldBankClient;

use crate::settings::Settings;

async fn open_store(settings: &Settings) -> Result<SqliteStore> {
  SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| format!("failed to open store at {}", settings.store_path.display()))
}

/// `census fetch`
pub async fn fetch(settings: &Settings, output: Option<PathBuf>, only: &[String]) -> Result<()> {
  let reference = settings.reference_list()?;
  let countries = if only.is_empty() {
    reference
  } else {
    let codes = only
      .iter()
      .map(|s| s.parse::<CountryCode>())
      .collect::<Result<Vec<_>, _>>()?;
    reference.restrict(&codes)?
  };

  let output = output.unwrap_or_else(|| settings.batch_path.clone());
  let client = WorldBankClient::new(settings.worldbank()).context("failed to build HTTP client")?;

  let summary = run_fetch(&client, &countries, &output, &settings.fetch_options())
    .await
    .with_context(|| format!("failed to write batch file {}", output.display()))?;

  println!("fetch: {summary}");
  Ok(())
}

/// `census load-all`
pub async fn load_all(settings: &Settings, input: Option<PathBuf>) -> Result<()> {
  let input = input.unwrap_or_else(|| settings.batch_path.clone());
  let store = open_store(settings).await?;
  let rules = settings.rules(settings.reference_list()?);

  let summary = Loader::new(&store, &rules).load_all(&input).await?;

  println!("load-all: {summary}");
  Ok(())
}

/// `census load-one`
pub async fn load_one(
  settings: &Settings,
  ident: Option<String>,
  input: Option<PathBuf>,
  fresh: bool,
) -> Result<()> {
  let ident = match ident {
    Some(ident) => ident,
    None => prompt("Country code or name: ")?,
  };
  let ident = ident.trim();
  if ident.is_empty() {
    bail!("no country identifier given");
  }

  let store = open_store(settings).await?;
  let rules = settings.rules(settings.reference_list()?);
  let loader = Loader::new(&store, &rules);

  let outcome = if fresh {
    let client =
      WorldBankClient::new(settings.worldbank()).context("failed to build HTTP client")?;
    loader.load_fresh(&client, ident, &settings.fetch_options()).await?
  } else {
    let input = input.unwrap_or_else(|| settings.batch_path.clone());
    loader.load_one(&input, ident).await?
  };

  let succeeded = match &outcome {
    LoadOneOutcome::Loaded(entry) => {
      println!(
        "loaded {} ({}): {} years",
        entry.country_code, entry.country_name, entry.year_count
      );
      1
    }
    LoadOneOutcome::NotFound(err) => {
      println!("{err}");
      0
    }
    LoadOneOutcome::Invalid(err) => {
      println!("record rejected: {err}");
      0
    }
  };
  println!("load-one: attempted 1, succeeded {succeeded}, skipped {}", 1 - succeeded);
  Ok(())
}

/// `census show`
pub async fn show(settings: &Settings, ident: &str) -> Result<()> {
  let reference = settings.reference_list()?;
  let code = reference
    .resolve(ident)
    .map(|c| c.code.clone())
    .or_else(|| ident.parse().ok())
    .ok_or_else(|| anyhow!("not a country code or known name: {ident:?}"))?;

  let store = open_store(settings).await?;
  match store.get_country(code).await? {
    Some(record) => print_record(&record),
    None => println!("no such record: {ident}"),
  }
  Ok(())
}

/// `census list`
pub async fn list(settings: &Settings) -> Result<()> {
  let store = open_store(settings).await?;
  for entry in store.list_countries().await? {
    let span = match (entry.first_year, entry.last_year) {
      (Some(first), Some(last)) => format!("{first}-{last}"),
      _ => "-".to_owned(),
    };
    println!(
      "{}  {:<40} {:>4} years  {span:<9}  {}",
      entry.country_code,
      entry.country_name,
      entry.year_count,
      entry.source.as_deref().unwrap_or("-")
    );
  }
  Ok(())
}

fn print_record(record: &CountryRecord) {
  println!("{} ({})", record.country_name, record.country_code);
  if let Some(source) = &record.source {
    match &source.website {
      Some(site) => println!("source: {} <{site}>", source.name),
      None => println!("source: {}", source.name),
    }
  }
  println!("{:>6} {:>15} {:>12} {:>12}", "year", "population", "births", "deaths");
  for s in &record.stats {
    let births = s.births.map_or_else(|| "-".to_owned(), |b| b.to_string());
    let deaths = s.deaths.map_or_else(|| "-".to_owned(), |d| d.to_string());
    println!("{:>6} {:>15} {births:>12} {deaths:>12}", s.year, s.population);
  }
}

/// Read one line from stdin after printing `label`.
fn prompt(label: &str) -> Result<String> {
  print!("{label}");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin()
    .lock()
    .read_line(&mut line)
    .context("failed to read identifier from stdin")?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
