//! The reference list: the countries a fetch run attempts and a load accepts.
//!
//! A default list of sovereign states ships with the crate
//! (`data/reference_countries.json`). Deployments may point at their own list
//! with the same shape.

use std::{collections::HashSet, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Error, Result, country::CountryCode};

const EMBEDDED: &str = include_str!("../data/reference_countries.json");

/// One entry of the reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceCountry {
  pub code: CountryCode,
  pub name: String,
}

/// An ordered list of countries, unique by code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceList {
  countries: Vec<ReferenceCountry>,
}

impl ReferenceList {
  /// Build a list, keeping the first entry for any repeated code.
  pub fn new(countries: impl IntoIterator<Item = ReferenceCountry>) -> Self {
    let mut seen = HashSet::new();
    let countries = countries
      .into_iter()
      .filter(|c| seen.insert(c.code.clone()))
      .collect();
    Self { countries }
  }

  /// The list bundled with the crate.
  pub fn embedded() -> Result<Self> {
    Self::from_json(Path::new("<embedded>"), EMBEDDED)
  }

  /// Read a list from a JSON file of `{"code", "name"}` objects.
  pub fn from_path(path: &Path) -> Result<Self> {
    let text = std::fs::read_to_string(path).map_err(Error::io(path))?;
    Self::from_json(path, &text)
  }

  fn from_json(path: &Path, text: &str) -> Result<Self> {
    let countries: Vec<ReferenceCountry> =
      serde_json::from_str(text).map_err(|e| Error::ReferenceList {
        path:   path.to_path_buf(),
        reason: e.to_string(),
      })?;
    if countries.is_empty() {
      return Err(Error::ReferenceList {
        path:   path.to_path_buf(),
        reason: "list is empty".into(),
      });
    }
    Ok(Self::new(countries))
  }

  pub fn len(&self) -> usize { self.countries.len() }

  pub fn is_empty(&self) -> bool { self.countries.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &ReferenceCountry> { self.countries.iter() }

  pub fn get(&self, code: &CountryCode) -> Option<&ReferenceCountry> {
    self.countries.iter().find(|c| &c.code == code)
  }

  pub fn contains(&self, code: &CountryCode) -> bool { self.get(code).is_some() }

  /// Resolve an operator-supplied identifier: an alpha-3 code or a country
  /// name, both case-insensitive.
  pub fn resolve(&self, ident: &str) -> Option<&ReferenceCountry> {
    let ident = ident.trim();
    if let Ok(code) = ident.parse::<CountryCode>()
      && let Some(found) = self.get(&code)
    {
      return Some(found);
    }
    self.countries.iter().find(|c| c.name.eq_ignore_ascii_case(ident))
  }

  /// Narrow the list to `codes`, preserving reference order.
  ///
  /// Every requested code must already be on the list.
  pub fn restrict(&self, codes: &[CountryCode]) -> Result<Self> {
    if let Some(missing) = codes.iter().find(|c| !self.contains(c)) {
      return Err(Error::NotInReferenceList(missing.clone()));
    }
    Ok(Self {
      countries: self
        .countries
        .iter()
        .filter(|c| codes.contains(&c.code))
        .cloned()
        .collect(),
    })
  }
}

impl<'a> IntoIterator for &'a ReferenceList {
  type Item = &'a ReferenceCountry;
  type IntoIter = std::slice::Iter<'a, ReferenceCountry>;

  fn into_iter(self) -> Self::IntoIter { self.countries.iter() }
}
