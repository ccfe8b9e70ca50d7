//! Pipeline tests against an in-memory store and a fixture upstream.

use std::{
  collections::{BTreeMap, HashMap},
  convert::Infallible,
  path::{Path, PathBuf},
  sync::Mutex,
  time::Duration,
};

use serde_json::{Value, json};
use tempfile::TempDir;

use crate::{
  Error,
  country::CountryCode,
  fetch::{FetchOptions, run_fetch},
  load::{LoadOneOutcome, Loader},
  record::{CountryRecord, DataSource, ValidationRules, YearlyStat},
  reference::{ReferenceCountry, ReferenceList},
  source::StatsSource,
  store::{PopulationStore, StoreEntry},
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryStore {
  rows: Mutex<BTreeMap<CountryCode, CountryRecord>>,
}

impl MemoryStore {
  fn snapshot(&self) -> BTreeMap<CountryCode, CountryRecord> {
    self.rows.lock().unwrap().clone()
  }
}

impl PopulationStore for MemoryStore {
  type Error = Infallible;

  async fn upsert_country(&self, record: CountryRecord) -> Result<StoreEntry, Infallible> {
    let entry = StoreEntry::from(&record);
    self.rows.lock().unwrap().insert(record.country_code.clone(), record);
    Ok(entry)
  }

  async fn get_country(&self, code: CountryCode) -> Result<Option<CountryRecord>, Infallible> {
    Ok(self.rows.lock().unwrap().get(&code).cloned())
  }

  async fn list_countries(&self) -> Result<Vec<StoreEntry>, Infallible> {
    Ok(self.rows.lock().unwrap().values().map(StoreEntry::from).collect())
  }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FixtureError(String);

enum Answer {
  Ok(CountryRecord),
  Fail(&'static str),
  Slow(Duration),
}

#[derive(Default)]
struct FixtureSource {
  answers: HashMap<CountryCode, Answer>,
}

impl FixtureSource {
  fn with(mut self, code: &str, answer: Answer) -> Self {
    self.answers.insert(cc(code), answer);
    self
  }
}

impl StatsSource for FixtureSource {
  type Error = FixtureError;

  async fn fetch_country(&self, code: &CountryCode) -> Result<CountryRecord, FixtureError> {
    match self.answers.get(code) {
      Some(Answer::Ok(record)) => Ok(record.clone()),
      Some(Answer::Fail(msg)) => Err(FixtureError((*msg).to_owned())),
      Some(Answer::Slow(delay)) => {
        tokio::time::sleep(*delay).await;
        Err(FixtureError("too slow".into()))
      }
      None => Err(FixtureError("Invalid value".into())),
    }
  }
}

fn cc(s: &str) -> CountryCode { s.parse().unwrap() }

fn reference(codes: &[(&str, &str)]) -> ReferenceList {
  ReferenceList::new(codes.iter().map(|(code, name)| ReferenceCountry {
    code: cc(code),
    name: (*name).to_owned(),
  }))
}

fn three_countries() -> ReferenceList {
  reference(&[("EGY", "Egypt"), ("FRA", "France"), ("DEU", "Germany")])
}

fn rules() -> ValidationRules {
  ValidationRules::new(ReferenceList::embedded().unwrap()).with_years(1950..=2024)
}

fn record(code: &str, name: &str, years: &[(i32, i64)]) -> CountryRecord {
  CountryRecord::new(
    cc(code),
    name,
    years
      .iter()
      .map(|&(year, population)| YearlyStat {
        year,
        population,
        births: Some(population / 40),
        deaths: Some(population / 160),
      })
      .collect(),
  )
}

fn write_json(dir: &TempDir, value: &Value) -> PathBuf {
  let path = dir.path().join("countries_data.json");
  std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
  path
}

fn read_array(path: &Path) -> Vec<Value> {
  let text = std::fs::read_to_string(path).unwrap();
  match serde_json::from_str(&text).unwrap() {
    Value::Array(items) => items,
    other => panic!("expected array, got {other}"),
  }
}

fn egypt_json() -> Value {
  json!({
    "country_code": "EGY",
    "country_name": "Egypt",
    "stats": [
      { "year": 2020, "population": 107465134, "births": 2520000, "deaths": 610000 },
      { "year": 2021, "population": 109262178 }
    ]
  })
}

// ─── Fetch ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_skips_failures_and_writes_valid_json() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("batch.json");
  let source = FixtureSource::default()
    .with("EGY", Answer::Ok(record("EGY", "Egypt", &[(2020, 100)])))
    .with("FRA", Answer::Fail("HTTP 503"))
    .with("DEU", Answer::Ok(record("DEU", "Germany", &[(2020, 80)])));

  let summary = run_fetch(&source, &three_countries(), &out, &FetchOptions::default())
    .await
    .unwrap();

  assert_eq!(summary.attempted, 3);
  assert_eq!(summary.succeeded, 2);
  assert_eq!(summary.skipped(), 1);
  assert_eq!(summary.failures[0].item, "FRA");
  assert_eq!(summary.failures[0].reason, "HTTP 503");

  let items = read_array(&out);
  let codes: Vec<_> = items.iter().map(|v| v["country_code"].as_str().unwrap()).collect();
  assert_eq!(codes, ["EGY", "DEU"]);
}

#[tokio::test]
async fn fetch_output_matches_accepted_subset() {
  let countries = three_countries();
  let codes = ["EGY", "FRA", "DEU"];

  for mask in 0u8..8 {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("batch.json");
    let mut source = FixtureSource::default();
    let mut accepted = 0;
    for (bit, code) in codes.iter().enumerate() {
      if mask & (1 << bit) != 0 {
        source = source.with(code, Answer::Ok(record(code, code, &[(2000, 1)])));
        accepted += 1;
      }
    }

    let summary = run_fetch(&source, &countries, &out, &FetchOptions::default())
      .await
      .unwrap();

    assert_eq!(read_array(&out).len(), accepted, "mask {mask:03b}");
    assert_eq!(summary.succeeded, accepted);
    assert_eq!(summary.skipped(), 3 - accepted);
  }
}

#[tokio::test]
async fn slow_country_times_out_without_blocking_the_rest() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("batch.json");
  let source = FixtureSource::default()
    .with("EGY", Answer::Slow(Duration::from_secs(30)))
    .with("FRA", Answer::Ok(record("FRA", "France", &[(2020, 67)])));
  let options = FetchOptions { timeout: Some(Duration::from_millis(20)), delay: None };

  let summary = run_fetch(&source, &three_countries(), &out, &options).await.unwrap();

  assert_eq!(summary.succeeded, 1);
  assert!(summary.failures[0].reason.contains("timed out"));
  assert_eq!(read_array(&out).len(), 1);
}

#[tokio::test]
async fn fetch_rejects_answer_for_wrong_country() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("batch.json");
  let source = FixtureSource::default()
    .with("EGY", Answer::Ok(record("FRA", "France", &[(2020, 67)])));

  let summary = run_fetch(&source, &reference(&[("EGY", "Egypt")]), &out, &FetchOptions::default())
    .await
    .unwrap();

  assert_eq!(summary.succeeded, 0);
  assert!(read_array(&out).is_empty());
}

#[tokio::test]
async fn fetch_and_load_keep_the_data_source() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("batch.json");
  let wdi = DataSource::new("World Bank WDI", Some("https://data.worldbank.org"));
  let source = FixtureSource::default().with(
    "EGY",
    Answer::Ok(record("EGY", "Egypt", &[(2020, 1)]).with_source(Some(wdi.clone()))),
  );

  run_fetch(&source, &reference(&[("EGY", "Egypt")]), &out, &FetchOptions::default())
    .await
    .unwrap();
  assert_eq!(read_array(&out)[0]["source"]["name"], "World Bank WDI");

  let store = MemoryStore::default();
  let rules = rules();
  Loader::new(&store, &rules).load_all(&out).await.unwrap();

  assert_eq!(store.snapshot()[&cc("EGY")].source, Some(wdi));
  let listed = store.list_countries().await.unwrap();
  assert_eq!(listed[0].source.as_deref(), Some("World Bank WDI"));
}

#[tokio::test]
async fn fetch_fills_blank_name_from_reference() {
  let dir = tempfile::tempdir().unwrap();
  let out = dir.path().join("batch.json");
  let source = FixtureSource::default()
    .with("EGY", Answer::Ok(record("EGY", "", &[(2020, 1)])));

  run_fetch(&source, &reference(&[("EGY", "Egypt")]), &out, &FetchOptions::default())
    .await
    .unwrap();

  assert_eq!(read_array(&out)[0]["country_name"], "Egypt");
}

// ─── Bulk load ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn egypt_loads_and_atlantis_is_skipped() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    egypt_json(),
    { "country_code": "ATL", "country_name": "Atlantis",
      "stats": [{ "year": 2020, "population": 1000 }] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let summary = Loader::new(&store, &rules).load_all(&path).await.unwrap();

  assert_eq!(summary.to_string(), "attempted 2, succeeded 1, skipped 1");
  assert_eq!(summary.failures[0].item, "ATL");
  let rows = store.snapshot();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[&cc("EGY")].stats.len(), 2);
}

#[tokio::test]
async fn unparseable_identifier_is_skipped() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "Atlantis", "country_name": "Atlantis", "stats": [] },
    egypt_json()
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let summary = Loader::new(&store, &rules).load_all(&path).await.unwrap();

  assert_eq!(summary.succeeded, 1);
  assert_eq!(summary.failures[0].item, "Atlantis");
  assert!(store.snapshot().contains_key(&cc("EGY")));
}

#[tokio::test]
async fn reloading_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    egypt_json(),
    { "country_code": "FRA", "country_name": "France",
      "stats": [{ "year": 2020, "population": 67000000 }] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();
  let loader = Loader::new(&store, &rules);

  loader.load_all(&path).await.unwrap();
  let once = store.snapshot();
  loader.load_all(&path).await.unwrap();

  assert_eq!(store.snapshot(), once);
  assert_eq!(once.len(), 2);
}

#[tokio::test]
async fn invalid_years_and_counts_are_excluded() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "FRA", "country_name": "France",
      "stats": [{ "year": 1492, "population": 1 }] },
    { "country_code": "DEU", "country_name": "Germany",
      "stats": [{ "year": 2020, "population": -3 }] },
    { "country_code": "ESP", "country_name": "Spain",
      "stats": [{ "year": "2020", "population": 47000000 }] },
    { "country_code": "ITA", "country_name": "Italy" },
    egypt_json()
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let summary = Loader::new(&store, &rules).load_all(&path).await.unwrap();

  assert_eq!(summary.attempted, 5);
  assert_eq!(summary.succeeded, 1);
  let skipped: Vec<_> = summary.failures.iter().map(|f| f.item.as_str()).collect();
  assert_eq!(skipped, ["FRA", "DEU", "ESP", "ITA"]);
  assert_eq!(store.snapshot().keys().cloned().collect::<Vec<_>>(), [cc("EGY")]);
}

#[tokio::test]
async fn malformed_batch_is_fatal_and_loads_nothing() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("countries_data.json");
  let valid = serde_json::to_string(&egypt_json()).unwrap();
  std::fs::write(&path, format!("[{valid},\n{valid}")).unwrap();
  let store = MemoryStore::default();
  let rules = rules();

  let err = Loader::new(&store, &rules).load_all(&path).await.unwrap_err();

  assert!(matches!(err, Error::MalformedBatch { line: 2, .. }), "{err}");
  assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn duplicate_codes_last_one_wins() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2020, "population": 1 }] },
    { "country_code": "egy", "country_name": "Egypt",
      "stats": [{ "year": 2021, "population": 2 }] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let summary = Loader::new(&store, &rules).load_all(&path).await.unwrap();

  assert_eq!(summary.succeeded, 2);
  let rows = store.snapshot();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[&cc("EGY")].stats[0].year, 2021);
}

// ─── Single-record load ──────────────────────────────────────────────────────

#[tokio::test]
async fn load_one_equals_bulk_load_of_that_record() {
  let dir = tempfile::tempdir().unwrap();
  let france = json!({ "country_code": "FRA", "country_name": "France",
                       "stats": [{ "year": 2020, "population": 67000000 }] });
  let path = write_json(&dir, &json!([egypt_json(), france]));
  let rules = rules();

  let single = MemoryStore::default();
  let outcome = Loader::new(&single, &rules).load_one(&path, "egy").await.unwrap();
  assert!(matches!(outcome, LoadOneOutcome::Loaded(ref e) if e.year_count == 2));

  let bulk = MemoryStore::default();
  Loader::new(&bulk, &rules).load_entries(vec![egypt_json()]).await.unwrap();

  assert_eq!(single.snapshot(), bulk.snapshot());
}

#[tokio::test]
async fn load_one_matches_by_name() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([egypt_json()]));
  let store = MemoryStore::default();
  let rules = rules();

  let outcome = Loader::new(&store, &rules).load_one(&path, "EGYPT").await.unwrap();

  assert!(matches!(outcome, LoadOneOutcome::Loaded(_)));
  assert_eq!(store.snapshot().len(), 1);
}

#[tokio::test]
async fn load_one_absent_leaves_store_unchanged() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([egypt_json()]));
  let store = MemoryStore::default();
  store.upsert_country(record("FRA", "France", &[(2020, 5)])).await.unwrap();
  let before = store.snapshot();
  let rules = rules();

  let outcome = Loader::new(&store, &rules).load_one(&path, "Atlantis").await.unwrap();

  match outcome {
    LoadOneOutcome::NotFound(err) => {
      assert!(matches!(err, Error::RecordNotFound(ref id) if id == "Atlantis"));
      assert_eq!(err.to_string(), "no such record: Atlantis");
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert_eq!(store.snapshot(), before);
}

#[tokio::test]
async fn load_one_invalid_record_is_rejected() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "DEU", "country_name": "Germany",
      "stats": [{ "year": 2020, "population": -1 }] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let outcome = Loader::new(&store, &rules).load_one(&path, "DEU").await.unwrap();

  match outcome {
    LoadOneOutcome::Invalid(err) => assert!(err.to_string().contains("negative"), "{err}"),
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn load_one_skips_invalid_trailing_duplicate_like_bulk_load() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2020, "population": 5 }] },
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2020, "population": -1 }] }
  ]));
  let rules = rules();

  let bulk = MemoryStore::default();
  let summary = Loader::new(&bulk, &rules).load_all(&path).await.unwrap();
  assert_eq!(summary.to_string(), "attempted 2, succeeded 1, skipped 1");

  let single = MemoryStore::default();
  let outcome = Loader::new(&single, &rules).load_one(&path, "EGY").await.unwrap();

  assert!(matches!(outcome, LoadOneOutcome::Loaded(ref e) if e.year_count == 1));
  assert_eq!(single.snapshot(), bulk.snapshot());
  assert_eq!(single.snapshot()[&cc("EGY")].stats[0].population, 5);
}

#[tokio::test]
async fn load_one_prefers_last_valid_duplicate() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2020, "population": 5 }] },
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2021, "population": 6 }] },
    { "country_code": "EGY", "country_name": "",
      "stats": [] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  Loader::new(&store, &rules).load_one(&path, "Egypt").await.unwrap();

  assert_eq!(store.snapshot()[&cc("EGY")].stats[0].year, 2021);
}

#[tokio::test]
async fn load_one_reports_last_rejection_when_no_duplicate_is_valid() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_json(&dir, &json!([
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 1492, "population": 5 }] },
    { "country_code": "EGY", "country_name": "Egypt",
      "stats": [{ "year": 2020, "population": -1 }] }
  ]));
  let store = MemoryStore::default();
  let rules = rules();

  let outcome = Loader::new(&store, &rules).load_one(&path, "EGY").await.unwrap();

  match outcome {
    LoadOneOutcome::Invalid(Error::RecordSchemaViolation { index, reason, .. }) => {
      assert_eq!(index, 1);
      assert!(reason.contains("negative"), "{reason}");
    }
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert!(store.snapshot().is_empty());
}

#[tokio::test]
async fn load_one_on_malformed_batch_is_fatal() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("countries_data.json");
  std::fs::write(&path, "[{\"country_code\": \"EGY\"").unwrap();
  let store = MemoryStore::default();
  let rules = rules();

  let err = Loader::new(&store, &rules).load_one(&path, "EGY").await.unwrap_err();

  assert!(matches!(err, Error::MalformedBatch { .. }));
}

#[tokio::test]
async fn load_fresh_fetches_and_upserts() {
  let store = MemoryStore::default();
  let rules = rules();
  let source = FixtureSource::default()
    .with("EGY", Answer::Ok(record("EGY", "Egypt", &[(2019, 10), (2020, 11)])));
  let loader = Loader::new(&store, &rules);

  let outcome = loader.load_fresh(&source, "Egypt", &FetchOptions::default()).await.unwrap();
  assert!(matches!(outcome, LoadOneOutcome::Loaded(ref e) if e.last_year == Some(2020)));

  let missing = loader.load_fresh(&source, "Atlantis", &FetchOptions::default()).await.unwrap();
  assert!(matches!(missing, LoadOneOutcome::NotFound(_)));

  let failed = loader.load_fresh(&source, "FRA", &FetchOptions::default()).await.unwrap_err();
  assert!(matches!(failed, Error::UpstreamUnavailable { .. }));
  assert_eq!(store.snapshot().len(), 1);
}
