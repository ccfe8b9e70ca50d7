//! Encoding and decoding helpers between domain types and SQLite rows.
//!
//! Country codes are stored as their upper-case text form; counts as
//! `INTEGER`.

use census_core::{
  country::CountryCode,
  record::{CountryRecord, DataSource, YearlyStat},
  store::StoreEntry,
};

use crate::{Error, Result};

// ─── CountryCode ─────────────────────────────────────────────────────────────

pub fn encode_code(code: &CountryCode) -> String { code.as_str().to_owned() }

pub fn decode_code(s: &str) -> Result<CountryCode> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column values of one `yearly_stats` row, minus the country code.
pub struct RawStat {
  pub year:       i32,
  pub population: i64,
  pub births:     Option<i64>,
  pub deaths:     Option<i64>,
}

impl From<&YearlyStat> for RawStat {
  fn from(s: &YearlyStat) -> Self {
    Self {
      year:       s.year,
      population: s.population,
      births:     s.births,
      deaths:     s.deaths,
    }
  }
}

impl From<RawStat> for YearlyStat {
  fn from(r: RawStat) -> Self {
    Self {
      year:       r.year,
      population: r.population,
      births:     r.births,
      deaths:     r.deaths,
    }
  }
}

/// A `countries` row, its joined `data_sources` columns and its yearly
/// series.
pub struct RawCountry {
  pub country_code:   String,
  pub country_name:   String,
  pub source_name:    Option<String>,
  pub source_website: Option<String>,
  pub stats:          Vec<RawStat>,
}

impl RawCountry {
  pub fn into_record(self) -> Result<CountryRecord> {
    let source = self.source_name.map(|name| DataSource { name, website: self.source_website });
    Ok(
      CountryRecord::new(
        decode_code(&self.country_code)?,
        self.country_name,
        self.stats.into_iter().map(YearlyStat::from).collect(),
      )
      .with_source(source),
    )
  }
}

/// One row of the country listing query.
pub struct RawEntry {
  pub country_code: String,
  pub country_name: String,
  pub source_name:  Option<String>,
  pub year_count:   i64,
  pub first_year:   Option<i32>,
  pub last_year:    Option<i32>,
}

impl RawEntry {
  pub fn into_entry(self) -> Result<StoreEntry> {
    let year_count = usize::try_from(self.year_count).map_err(|e| Error::CorruptRow {
      code:   self.country_code.clone(),
      reason: format!("year count {}: {e}", self.year_count),
    })?;
    Ok(StoreEntry {
      country_code: decode_code(&self.country_code)?,
      country_name: self.country_name,
      source: self.source_name,
      year_count,
      first_year: self.first_year,
      last_year: self.last_year,
    })
  }
}
