//! The load pipeline: batch file (or a fresh fetch) into a
//! [`PopulationStore`].

use std::path::Path;

use serde_json::Value;
use tracing::{info, warn};

use crate::{
  Error, Result,
  batch,
  fetch::{FetchOptions, fetch_one},
  record::{CountryRecord, ValidationRules},
  source::StatsSource,
  store::{PopulationStore, StoreEntry},
  summary::RunSummary,
};

/// Result of a single-record load.
#[derive(Debug)]
pub enum LoadOneOutcome {
  /// The record was upserted.
  Loaded(StoreEntry),
  /// Nothing matched the identifier; holds [`Error::RecordNotFound`]. The
  /// store was not touched.
  NotFound(Error),
  /// Every matching record failed validation; holds the rejection of the
  /// last one in the file. The store was not touched.
  Invalid(Error),
}

/// Validates records and upserts them into `store`.
pub struct Loader<'a, S> {
  store: &'a S,
  rules: &'a ValidationRules,
}

impl<'a, S: PopulationStore> Loader<'a, S> {
  pub fn new(store: &'a S, rules: &'a ValidationRules) -> Self { Self { store, rules } }

  /// Load every record in the batch file at `path`.
  ///
  /// A file that does not parse as a JSON array fails the run before the
  /// store is touched. Bad records are skipped and counted.
  pub async fn load_all(&self, path: &Path) -> Result<RunSummary> {
    let entries = batch::read_batch(path)?;
    info!(path = %path.display(), entries = entries.len(), "loading batch");
    let summary = self.load_entries(entries).await?;
    info!(%summary, "load finished");
    Ok(summary)
  }

  /// Load already-parsed batch elements, in order.
  pub async fn load_entries(&self, entries: Vec<Value>) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    for (index, value) in entries.into_iter().enumerate() {
      let label = batch::entry_code(&value)
        .or_else(|| batch::entry_name(&value))
        .map_or_else(|| format!("#{index}"), str::to_owned);

      match self.prepare(index, value) {
        Ok(record) => {
          self.upsert(record).await?;
          summary.success();
        }
        Err(err) => {
          warn!(error = %err, "skipping record");
          let reason = match err {
            Error::RecordSchemaViolation { reason, .. } => reason,
            other => other.to_string(),
          };
          summary.failure(label, reason);
        }
      }
    }

    Ok(summary)
  }

  /// Find `ident` (country code or name) in the batch file at `path` and
  /// load only that country.
  ///
  /// When the file holds several matching elements, the last valid one is
  /// loaded: the same record a bulk load of the file would leave stored.
  pub async fn load_one(&self, path: &Path, ident: &str) -> Result<LoadOneOutcome> {
    let entries = batch::read_batch(path)?;
    let mut rejected = None;

    for (index, value) in self.matching_entries(entries, ident).into_iter().rev() {
      match self.prepare(index, value) {
        Ok(record) => return self.load_record(record).await,
        Err(err) => {
          warn!(error = %err, "record rejected");
          rejected.get_or_insert(err);
        }
      }
    }

    Ok(match rejected {
      Some(err) => LoadOneOutcome::Invalid(err),
      None => {
        info!(ident, "no matching record in batch");
        LoadOneOutcome::NotFound(Error::RecordNotFound(ident.trim().to_owned()))
      }
    })
  }

  /// Fetch `ident` from `source` instead of reading the batch file, then
  /// load it.
  pub async fn load_fresh<Src: StatsSource>(
    &self,
    source: &Src,
    ident: &str,
    options: &FetchOptions,
  ) -> Result<LoadOneOutcome> {
    let Some(country) = self.rules.reference.resolve(ident) else {
      return Ok(LoadOneOutcome::NotFound(Error::RecordNotFound(ident.trim().to_owned())));
    };
    let record = fetch_one(source, country, options).await?;
    self.load_record(record).await
  }

  /// Validate and upsert one record.
  pub async fn load_record(&self, record: CountryRecord) -> Result<LoadOneOutcome> {
    if let Err(violation) = self.rules.check(&record) {
      return Ok(LoadOneOutcome::Invalid(Error::RecordSchemaViolation {
        index:  0,
        code:   Some(record.country_code.to_string()),
        reason: violation.to_string(),
      }));
    }
    let entry = self.upsert(record).await?;
    Ok(LoadOneOutcome::Loaded(entry))
  }

  fn prepare(&self, index: usize, value: Value) -> Result<CountryRecord> {
    let record = batch::decode_entry(index, value)?;
    self.rules.check(&record).map_err(|v| Error::RecordSchemaViolation {
      index,
      code: Some(record.country_code.to_string()),
      reason: v.to_string(),
    })?;
    Ok(CountryRecord::new(record.country_code, record.country_name, record.stats)
      .with_source(record.source))
  }

  /// Every element whose code or name matches `ident`, in file order.
  fn matching_entries(&self, entries: Vec<Value>, ident: &str) -> Vec<(usize, Value)> {
    let ident = ident.trim();
    let resolved = self.rules.reference.resolve(ident).map(|c| c.code.as_str());

    entries
      .into_iter()
      .enumerate()
      .filter(|(_, value)| {
        let code = batch::entry_code(value).map(str::trim);
        let name = batch::entry_name(value).map(str::trim);
        code.is_some_and(|c| {
          c.eq_ignore_ascii_case(ident) || resolved.is_some_and(|r| c.eq_ignore_ascii_case(r))
        })
          || name.is_some_and(|n| n.eq_ignore_ascii_case(ident))
      })
      .collect()
  }

  async fn upsert(&self, record: CountryRecord) -> Result<StoreEntry> {
    let code = record.country_code.clone();
    let entry = self
      .store
      .upsert_country(record)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    tracing::debug!(%code, years = entry.year_count, "upserted");
    Ok(entry)
  }
}
