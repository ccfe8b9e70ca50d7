//! Country records and the rules a record must satisfy before it is stored.

use std::{collections::HashSet, ops::RangeInclusive};

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{country::CountryCode, reference::ReferenceList};

/// Earliest year accepted by default.
pub const MIN_YEAR: i32 = 1800;

// ─── Records ─────────────────────────────────────────────────────────────────

/// Demographic figures for one country in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyStat {
  pub year:       i32,
  pub population: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub births:     Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deaths:     Option<i64>,
}

/// Where a record's figures were obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
  pub name:    String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub website: Option<String>,
}

impl DataSource {
  pub fn new(name: impl Into<String>, website: Option<&str>) -> Self {
    Self { name: name.into(), website: website.map(str::to_owned) }
  }
}

/// Everything the pipeline knows about one country. Identity is
/// `country_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRecord {
  pub country_code: CountryCode,
  pub country_name: String,
  /// Provenance of every figure in `stats`; absent in hand-made batches.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub source:       Option<DataSource>,
  pub stats:        Vec<YearlyStat>,
}

impl CountryRecord {
  /// Build a record with `stats` ordered by year.
  pub fn new(
    country_code: CountryCode,
    country_name: impl Into<String>,
    mut stats: Vec<YearlyStat>,
  ) -> Self {
    stats.sort_by_key(|s| s.year);
    Self { country_code, country_name: country_name.into(), source: None, stats }
  }

  pub fn with_source(mut self, source: Option<DataSource>) -> Self {
    self.source = source;
    self
  }

  pub fn years(&self) -> Option<RangeInclusive<i32>> {
    let first = self.stats.iter().map(|s| s.year).min()?;
    let last = self.stats.iter().map(|s| s.year).max()?;
    Some(first..=last)
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Why a record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
  #[error("country {0} is not in the reference list")]
  UnknownCountry(CountryCode),

  #[error("country name is empty")]
  EmptyName,

  #[error("data source name is empty")]
  EmptySourceName,

  #[error("year {year} is outside {min}..={max}")]
  YearOutOfRange { year: i32, min: i32, max: i32 },

  #[error("year {0} appears more than once")]
  DuplicateYear(i32),

  #[error("{field} is negative ({value}) in {year}")]
  Negative { year: i32, field: &'static str, value: i64 },
}

/// The checks applied to every record before it reaches the store.
#[derive(Debug, Clone)]
pub struct ValidationRules {
  pub years:     RangeInclusive<i32>,
  pub reference: ReferenceList,
}

impl ValidationRules {
  /// Accept [`MIN_YEAR`] through the current calendar year.
  pub fn new(reference: ReferenceList) -> Self {
    Self { years: MIN_YEAR..=Utc::now().year(), reference }
  }

  pub fn with_years(mut self, years: RangeInclusive<i32>) -> Self {
    self.years = years;
    self
  }

  pub fn check(&self, record: &CountryRecord) -> Result<(), Violation> {
    if !self.reference.contains(&record.country_code) {
      return Err(Violation::UnknownCountry(record.country_code.clone()));
    }
    if record.country_name.trim().is_empty() {
      return Err(Violation::EmptyName);
    }
    if record.source.as_ref().is_some_and(|s| s.name.trim().is_empty()) {
      return Err(Violation::EmptySourceName);
    }

    let mut seen = HashSet::with_capacity(record.stats.len());
    for stat in &record.stats {
      if !self.years.contains(&stat.year) {
        return Err(Violation::YearOutOfRange {
          year: stat.year,
          min:  *self.years.start(),
          max:  *self.years.end(),
        });
      }
      if !seen.insert(stat.year) {
        return Err(Violation::DuplicateYear(stat.year));
      }
      let counts = [
        ("population", Some(stat.population)),
        ("births", stat.births),
        ("deaths", stat.deaths),
      ];
      for (field, value) in counts {
        if let Some(value) = value
          && value < 0
        {
          return Err(Violation::Negative { year: stat.year, field, value });
        }
      }
    }
    Ok(())
  }
}
