//! Decoding World Bank indicator responses.
//!
//! A successful page is a two-element array: paging metadata, then the
//! observations (or `null` when there are none). A rejected request is a
//! one-element array holding a `message` list, which the API returns with
//! `200 OK`.

use std::collections::{BTreeMap, HashMap};

use census_core::{
  country::CountryCode,
  record::{CountryRecord, DataSource, YearlyStat},
};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::{Error, Result};

/// The indicators a country record is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
  /// Population, total.
  Population,
  /// Birth rate, crude (per 1,000 people).
  BirthRate,
  /// Death rate, crude (per 1,000 people).
  DeathRate,
}

impl Indicator {
  pub fn id(self) -> &'static str {
    match self {
      Indicator::Population => "SP.POP.TOTL",
      Indicator::BirthRate => "SP.DYN.CBRT.IN",
      Indicator::DeathRate => "SP.DYN.CDRT.IN",
    }
  }
}

/// Provenance attached to every record this crate produces.
pub(crate) fn data_source() -> DataSource {
  DataSource::new("World Bank WDI", Some("https://data.worldbank.org"))
}

// ─── Decoded types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Observation {
  pub year:         i32,
  pub value:        Option<f64>,
  pub country_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Page {
  pub page:         u32,
  pub pages:        u32,
  pub observations: Vec<Observation>,
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawMeta {
  #[serde(deserialize_with = "lenient_u32")]
  page:  u32,
  #[serde(deserialize_with = "lenient_u32")]
  pages: u32,
}

#[derive(Deserialize)]
struct RawObservation {
  country: RawLabel,
  date:    String,
  value:   Option<f64>,
}

#[derive(Deserialize)]
struct RawLabel {
  value: String,
}

#[derive(Deserialize)]
struct RawMessage {
  #[serde(default)]
  id:    String,
  #[serde(default)]
  key:   String,
  #[serde(default)]
  value: String,
}

/// Paging fields are numbers on most endpoints and strings on a few.
fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum NumOrStr {
    Num(u32),
    Str(String),
  }

  match NumOrStr::deserialize(d)? {
    NumOrStr::Num(n) => Ok(n),
    NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
  }
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Decode one page of an indicator response for `code`.
pub(crate) fn parse_page(code: &CountryCode, body: &str) -> Result<Page> {
  let value: Value = serde_json::from_str(body)?;
  let Value::Array(mut parts) = value else {
    return Err(Error::Shape("expected a top-level array".into()));
  };

  if let Some(messages) = parts.first().and_then(|p| p.get("message")) {
    let messages: Vec<RawMessage> = serde_json::from_value(messages.clone())?;
    let unknown = messages.iter().any(|m| m.id == "120" || m.key == "Invalid value");
    let message = messages
      .iter()
      .map(|m| format!("{} ({})", m.value.trim(), m.key))
      .collect::<Vec<_>>()
      .join("; ");
    return Err(if unknown {
      Error::UnknownCountry { code: code.to_string(), message }
    } else {
      Error::Shape(format!("api message: {message}"))
    });
  }

  if parts.len() < 2 {
    return Err(Error::Shape(format!("expected 2 elements, found {}", parts.len())));
  }
  let data = parts.swap_remove(1);
  let meta: RawMeta = serde_json::from_value(parts.swap_remove(0))?;

  let raw: Vec<RawObservation> = match data {
    Value::Null => Vec::new(),
    other => serde_json::from_value(other)?,
  };

  let observations = raw
    .into_iter()
    .filter_map(|o| {
      let year = o.date.trim().parse().ok()?;
      Some(Observation { year, value: o.value, country_name: o.country.value })
    })
    .collect();

  Ok(Page { page: meta.page, pages: meta.pages, observations })
}

/// Merge the three indicator series into one record.
///
/// Only years with a population figure produce a [`YearlyStat`]; rates
/// without a matching population are dropped.
pub(crate) fn assemble(
  code: &CountryCode,
  population: &[Observation],
  birth_rate: &[Observation],
  death_rate: &[Observation],
) -> Result<CountryRecord> {
  let births = rates(birth_rate);
  let deaths = rates(death_rate);

  let mut by_year = BTreeMap::new();
  for obs in population {
    let Some(pop) = obs.value.filter(|v| v.is_finite()) else {
      continue;
    };
    by_year.insert(obs.year, YearlyStat {
      year:       obs.year,
      population: pop.round() as i64,
      births:     births.get(&obs.year).map(|r| per_thousand(*r, pop)),
      deaths:     deaths.get(&obs.year).map(|r| per_thousand(*r, pop)),
    });
  }

  if by_year.is_empty() {
    return Err(Error::NoData(code.to_string()));
  }

  let name = population
    .iter()
    .map(|o| o.country_name.trim())
    .find(|n| !n.is_empty())
    .unwrap_or_default();

  Ok(
    CountryRecord::new(code.clone(), name, by_year.into_values().collect())
      .with_source(Some(data_source())),
  )
}

fn rates(series: &[Observation]) -> HashMap<i32, f64> {
  series
    .iter()
    .filter_map(|o| o.value.filter(|v| v.is_finite()).map(|v| (o.year, v)))
    .collect()
}

fn per_thousand(rate: f64, population: f64) -> i64 { (rate * population / 1000.0).round() as i64 }
