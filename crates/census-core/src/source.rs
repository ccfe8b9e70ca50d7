//! The `StatsSource` trait: where fetched records come from.

use std::future::Future;

use crate::{country::CountryCode, record::CountryRecord};

/// An upstream provider of per-country statistics.
///
/// Implemented by `census-worldbank` for the live API and by fixtures in
/// tests. A failure for one country says nothing about the others.
pub trait StatsSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Retrieve the full yearly series for `code`.
  fn fetch_country<'a>(
    &'a self,
    code: &'a CountryCode,
  ) -> impl Future<Output = Result<CountryRecord, Self::Error>> + Send + 'a;
}
