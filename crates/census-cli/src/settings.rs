//! Process-wide settings, fixed for the lifetime of a run.
//!
//! Sources, lowest precedence first: built-in defaults, the optional TOML
//! config file, `CENSUS_*` environment variables, then command-line flags
//! (applied by the caller).

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use census_core::{
  fetch::FetchOptions,
  record::{MIN_YEAR, ValidationRules},
  reference::ReferenceList,
};
use census_worldbank::WorldBankConfig;
use chrono::{Datelike, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite database file.
  pub store_path:           PathBuf,
  /// Batch file written by `fetch` and read by the loaders.
  pub batch_path:           PathBuf,
  /// JSON reference list; the embedded list when unset.
  pub reference_list:       Option<PathBuf>,
  pub api_base_url:         String,
  /// First year requested from the upstream API.
  pub start_year:           i32,
  /// Last year requested; the current year when unset.
  pub end_year:             Option<i32>,
  /// Earliest year the loader accepts.
  pub min_year:             i32,
  pub request_timeout_secs: u64,
  /// Budget for one country, retries included. `0` disables it.
  pub item_timeout_secs:    u64,
  pub request_delay_ms:     u64,
  pub retries:              u32,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:           PathBuf::from("census.db"),
      batch_path:           PathBuf::from("countries_data.json"),
      reference_list:       None,
      api_base_url:         WorldBankConfig::default().base_url,
      start_year:           1960,
      end_year:             None,
      min_year:             MIN_YEAR,
      request_timeout_secs: 30,
      item_timeout_secs:    120,
      request_delay_ms:     250,
      retries:              2,
    }
  }
}

impl Settings {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let raw = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(config::Environment::with_prefix("CENSUS"))
      .build()
      .with_context(|| format!("failed to read config file {}", path.display()))?;

    let mut settings: Settings = raw
      .try_deserialize()
      .context("failed to deserialise settings")?;

    settings.store_path = expand_tilde(&settings.store_path);
    settings.batch_path = expand_tilde(&settings.batch_path);
    settings.reference_list = settings.reference_list.as_deref().map(expand_tilde);
    Ok(settings)
  }

  pub fn end_year(&self) -> i32 { self.end_year.unwrap_or_else(|| Utc::now().year()) }

  pub fn reference_list(&self) -> anyhow::Result<ReferenceList> {
    match &self.reference_list {
      Some(path) => ReferenceList::from_path(path)
        .with_context(|| format!("failed to load reference list {}", path.display())),
      None => ReferenceList::embedded().context("embedded reference list is corrupt"),
    }
  }

  pub fn rules(&self, reference: ReferenceList) -> ValidationRules {
    let rules = ValidationRules::new(reference);
    let max = *rules.years.end();
    rules.with_years(self.min_year..=max)
  }

  pub fn worldbank(&self) -> WorldBankConfig {
    WorldBankConfig {
      base_url: self.api_base_url.clone(),
      start_year: self.start_year,
      end_year: self.end_year(),
      timeout: Duration::from_secs(self.request_timeout_secs),
      retries: self.retries,
      ..WorldBankConfig::default()
    }
  }

  pub fn fetch_options(&self) -> FetchOptions {
    FetchOptions {
      timeout: (self.item_timeout_secs > 0).then(|| Duration::from_secs(self.item_timeout_secs)),
      delay:   (self.request_delay_ms > 0).then(|| Duration::from_millis(self.request_delay_ms)),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
