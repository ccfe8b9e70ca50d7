//! ISO 3166-1 alpha-3 country codes.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// An upper-case, three-letter ISO 3166-1 alpha-3 code (e.g. `EGY`).
///
/// Parsing trims whitespace and accepts lower-case input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
  pub fn as_str(&self) -> &str { &self.0 }
}

impl FromStr for CountryCode {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let trimmed = s.trim();
    if trimmed.len() == 3 && trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
      Ok(Self(trimmed.to_ascii_uppercase()))
    } else {
      Err(Error::InvalidCountryCode(s.to_owned()))
    }
  }
}

impl TryFrom<String> for CountryCode {
  type Error = Error;

  fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<CountryCode> for String {
  fn from(code: CountryCode) -> Self { code.0 }
}

impl fmt::Display for CountryCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl AsRef<str> for CountryCode {
  fn as_ref(&self) -> &str { &self.0 }
}
