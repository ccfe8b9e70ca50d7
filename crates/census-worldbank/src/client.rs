//! Async HTTP client for the World Bank Indicators API (v2).

use std::time::Duration;

use census_core::{country::CountryCode, record::CountryRecord, source::StatsSource};
use reqwest::Client;
use tracing::{debug, warn};

use crate::{
  Error, Result,
  response::{Indicator, Observation, assemble, parse_page},
};

/// Upper bound on pages followed for a single series.
const MAX_PAGES: u32 = 50;

/// Connection and query settings.
#[derive(Debug, Clone)]
pub struct WorldBankConfig {
  pub base_url:      String,
  pub start_year:    i32,
  pub end_year:      i32,
  pub per_page:      u32,
  pub timeout:       Duration,
  /// Extra attempts after a transient failure.
  pub retries:       u32,
  /// Wait before retry `n` is `retry_backoff * n`.
  pub retry_backoff: Duration,
}

impl Default for WorldBankConfig {
  fn default() -> Self {
    Self {
      base_url:      "https://api.worldbank.org/v2".into(),
      start_year:    1960,
      end_year:      2024,
      per_page:      1000,
      timeout:       Duration::from_secs(30),
      retries:       2,
      retry_backoff: Duration::from_secs(1),
    }
  }
}

/// World Bank client.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WorldBankClient {
  client: Client,
  config: WorldBankConfig,
}

impl WorldBankClient {
  pub fn new(config: WorldBankConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("census/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, config })
  }

  fn url(&self, code: &CountryCode, indicator: Indicator) -> String {
    format!(
      "{}/country/{}/indicator/{}",
      self.config.base_url.trim_end_matches('/'),
      code.as_str().to_ascii_lowercase(),
      indicator.id()
    )
  }

  /// `GET /country/<iso3>/indicator/<id>`, following pagination.
  async fn series(&self, code: &CountryCode, indicator: Indicator) -> Result<Vec<Observation>> {
    let url = self.url(code, indicator);
    let mut observations = Vec::new();
    let mut page = 1;

    loop {
      let body = self.get_with_retry(&url, page).await?;
      let parsed = parse_page(code, &body)?;
      observations.extend(parsed.observations);
      match paging(page, parsed.page, parsed.pages) {
        Paging::Done => break,
        Paging::Next(next) => page = next,
        Paging::Truncated => {
          warn!(
            %code,
            indicator = indicator.id(),
            pages = parsed.pages,
            "page limit reached, series truncated"
          );
          break;
        }
      }
    }

    debug!(%code, indicator = indicator.id(), points = observations.len(), "series fetched");
    Ok(observations)
  }

  async fn get_with_retry(&self, url: &str, page: u32) -> Result<String> {
    let mut attempt = 0;
    loop {
      match self.get_once(url, page).await {
        Err(e) if e.is_transient() && attempt < self.config.retries => {
          attempt += 1;
          debug!(url, attempt, error = %e, "transient failure, retrying");
          tokio::time::sleep(self.config.retry_backoff * attempt).await;
        }
        other => return other,
      }
    }
  }

  async fn get_once(&self, url: &str, page: u32) -> Result<String> {
    let resp = self
      .client
      .get(url)
      .query(&[
        ("format", "json".to_string()),
        ("date", format!("{}:{}", self.config.start_year, self.config.end_year)),
        ("per_page", self.config.per_page.to_string()),
        ("page", page.to_string()),
      ])
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Status { url: url.to_owned(), status });
    }
    Ok(resp.text().await?)
  }
}

#[derive(Debug, PartialEq, Eq)]
enum Paging {
  Done,
  Next(u32),
  /// More pages exist but [`MAX_PAGES`] were already read.
  Truncated,
}

/// Next step after `requested` came back as page `page` of `pages`.
fn paging(requested: u32, page: u32, pages: u32) -> Paging {
  if page >= pages {
    Paging::Done
  } else if requested >= MAX_PAGES {
    Paging::Truncated
  } else {
    Paging::Next(requested + 1)
  }
}

impl StatsSource for WorldBankClient {
  type Error = Error;

  async fn fetch_country(&self, code: &CountryCode) -> Result<CountryRecord> {
    let population = self.series(code, Indicator::Population).await?;

    // A rate the API has nothing for still yields a population-only record.
    // Any other failure fails the country.
    let mut rate_series = Vec::with_capacity(2);
    for indicator in [Indicator::BirthRate, Indicator::DeathRate] {
      let series = match self.series(code, indicator).await {
        Ok(series) => series,
        Err(e) if e.is_missing_data() => {
          warn!(%code, indicator = indicator.id(), error = %e, "rate unavailable");
          Vec::new()
        }
        Err(e) => return Err(e),
      };
      rate_series.push(series);
    }

    assemble(code, &population, &rate_series[0], &rate_series[1])
  }
}
