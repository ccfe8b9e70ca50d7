//! The fetch pipeline: one upstream request per reference country, then a
//! single atomic write of everything that succeeded.

use std::{path::Path, time::Duration};

use tracing::{info, warn};

use crate::{
  Error, Result,
  batch::write_batch,
  record::CountryRecord,
  reference::{ReferenceCountry, ReferenceList},
  source::StatsSource,
  summary::RunSummary,
};

/// Knobs for a fetch run.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
  /// Give up on a single country after this long.
  pub timeout: Option<Duration>,
  /// Pause between consecutive requests.
  pub delay:   Option<Duration>,
}

/// Query `source` for every country in `countries`, in order.
///
/// Failures are logged, counted and skipped; they never end the run.
pub async fn fetch_all<S: StatsSource>(
  source: &S,
  countries: &ReferenceList,
  options: &FetchOptions,
) -> (Vec<CountryRecord>, RunSummary) {
  let mut records = Vec::with_capacity(countries.len());
  let mut summary = RunSummary::default();

  info!(countries = countries.len(), "starting fetch");

  for (i, country) in countries.iter().enumerate() {
    if i > 0
      && let Some(delay) = options.delay
    {
      tokio::time::sleep(delay).await;
    }

    match fetch_one(source, country, options).await {
      Ok(record) => {
        tracing::debug!(code = %country.code, years = record.stats.len(), "fetched");
        summary.success();
        records.push(record);
      }
      Err(err) => {
        warn!(code = %country.code, error = %err, "skipping country");
        let reason = match err {
          Error::UpstreamUnavailable { reason, .. } => reason,
          other => other.to_string(),
        };
        summary.failure(country.code.as_str(), reason);
      }
    }
  }

  info!(%summary, "fetch finished");
  (records, summary)
}

/// Fetch every country and atomically write the batch to `output`.
///
/// The batch file is written even when nothing succeeded, so the output is
/// always a complete JSON array.
pub async fn run_fetch<S: StatsSource>(
  source: &S,
  countries: &ReferenceList,
  output: &Path,
  options: &FetchOptions,
) -> Result<RunSummary> {
  let (records, summary) = fetch_all(source, countries, options).await;
  write_batch(output, &records)?;
  info!(path = %output.display(), records = records.len(), "batch file written");
  Ok(summary)
}

/// Fetch a single reference country, applying the per-item timeout and
/// checking that the upstream answered for the country that was asked for.
pub async fn fetch_one<S: StatsSource>(
  source: &S,
  country: &ReferenceCountry,
  options: &FetchOptions,
) -> Result<CountryRecord> {
  let unavailable = |reason: String| Error::UpstreamUnavailable {
    code: country.code.clone(),
    reason,
  };

  let fetched = match options.timeout {
    Some(limit) => tokio::time::timeout(limit, source.fetch_country(&country.code))
      .await
      .map_err(|_| unavailable(format!("timed out after {}s", limit.as_secs_f32())))?,
    None => source.fetch_country(&country.code).await,
  };
  let record = fetched.map_err(|e| unavailable(e.to_string()))?;

  if record.country_code != country.code {
    return Err(unavailable(format!(
      "upstream answered for {} instead",
      record.country_code
    )));
  }

  let name = if record.country_name.trim().is_empty() {
    country.name.clone()
  } else {
    record.country_name
  };
  Ok(CountryRecord::new(record.country_code, name, record.stats).with_source(record.source))
}
