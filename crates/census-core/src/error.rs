//! Error types for `census-core`.

use std::path::PathBuf;

use thiserror::Error;

use crate::country::CountryCode;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid country code: {0:?}")]
  InvalidCountryCode(String),

  #[error("country {0} is not in the reference list")]
  NotInReferenceList(CountryCode),

  #[error("upstream unavailable for {code}: {reason}")]
  UpstreamUnavailable { code: CountryCode, reason: String },

  /// The batch file cannot be parsed at all. Fatal for every load mode.
  #[error(
    "malformed batch file {}: {reason} (line {line}, column {column}, byte {offset})",
    path.display()
  )]
  MalformedBatch {
    path:   PathBuf,
    line:   usize,
    column: usize,
    offset: usize,
    reason: String,
  },

  #[error("record #{index} ({}): {reason}", code.as_deref().unwrap_or("no country code"))]
  RecordSchemaViolation {
    index:  usize,
    code:   Option<String>,
    reason: String,
  },

  #[error("no such record: {0}")]
  RecordNotFound(String),

  #[error("reference list {}: {reason}", path.display())]
  ReferenceList { path: PathBuf, reason: String },

  #[error("i/o error on {}: {source}", path.display())]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
    let path = path.into();
    move |source| Error::Io { path, source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
