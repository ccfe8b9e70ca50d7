//! Error type for `census-worldbank`.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{url} returned {status}")]
  Status { url: String, status: StatusCode },

  /// The API answered, but does not recognise the country.
  #[error("unknown country {code}: {message}")]
  UnknownCountry { code: String, message: String },

  #[error("unexpected response shape: {0}")]
  Shape(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The country exists but has no population figures in the requested range.
  #[error("no population data for {0}")]
  NoData(String),
}

impl Error {
  /// Worth another attempt: timeouts, connection failures, 429 and 5xx.
  pub fn is_transient(&self) -> bool {
    match self {
      Error::Http(e) => e.is_timeout() || e.is_connect(),
      Error::Status { status, .. } => {
        *status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
      }
      _ => false,
    }
  }

  /// The API answered, but has nothing for this country and indicator.
  pub fn is_missing_data(&self) -> bool {
    matches!(self, Error::NoData(_) | Error::UnknownCountry { .. })
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
