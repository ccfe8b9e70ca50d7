//! The `PopulationStore` trait and the stored projection of a record.
//!
//! Implemented by storage backends (e.g. `census-store-sqlite`). The load
//! pipeline depends on this abstraction, not on a concrete backend.

use std::future::Future;

use crate::{country::CountryCode, record::CountryRecord};

/// Summary of one stored country, as returned by writes and listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
  pub country_code: CountryCode,
  pub country_name: String,
  /// Name of the data source the stored figures came from.
  pub source:       Option<String>,
  pub year_count:   usize,
  pub first_year:   Option<i32>,
  pub last_year:    Option<i32>,
}

impl From<&CountryRecord> for StoreEntry {
  fn from(record: &CountryRecord) -> Self {
    let years = record.years();
    Self {
      country_code: record.country_code.clone(),
      country_name: record.country_name.clone(),
      source:       record.source.as_ref().map(|s| s.name.clone()),
      year_count:   record.stats.len(),
      first_year:   years.as_ref().map(|r| *r.start()),
      last_year:    years.as_ref().map(|r| *r.end()),
    }
  }
}

/// Abstraction over a persistent store of country records.
///
/// Writes are upserts keyed by country code: the stored record is replaced
/// wholesale, never appended to. Each upsert is atomic on its own; there is
/// no transaction spanning several records.
pub trait PopulationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert `record`, or overwrite the record already stored under its code.
  fn upsert_country(
    &self,
    record: CountryRecord,
  ) -> impl Future<Output = Result<StoreEntry, Self::Error>> + Send + '_;

  /// Fetch the full record for `code`. Returns `None` if not stored.
  fn get_country(
    &self,
    code: CountryCode,
  ) -> impl Future<Output = Result<Option<CountryRecord>, Self::Error>> + Send + '_;

  /// All stored countries, ordered by code.
  fn list_countries(
    &self,
  ) -> impl Future<Output = Result<Vec<StoreEntry>, Self::Error>> + Send + '_;
}
