//! Error type for `census-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] census_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A stored count does not fit the column's domain.
  #[error("corrupt row for {code}: {reason}")]
  CorruptRow { code: String, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
