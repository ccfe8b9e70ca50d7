//! [`SqliteStore`], the SQLite implementation of [`PopulationStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use census_core::{
  country::CountryCode,
  record::{CountryRecord, DataSource},
  store::{PopulationStore, StoreEntry},
};

use crate::{
  Result,
  encode::{RawCountry, RawEntry, RawStat, encode_code},
  schema::{MIGRATIONS, SCHEMA, SCHEMA_VERSION},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A population store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        conn.execute_batch(SCHEMA)?;
        for (from, ddl) in MIGRATIONS {
          if version != 0 && version <= *from {
            conn.execute_batch(ddl)?;
          }
        }
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every registered data source, ordered by name.
  pub async fn data_sources(&self) -> Result<Vec<DataSource>> {
    let sources = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT name, website FROM data_sources ORDER BY name")?;
        let rows = stmt
          .query_map([], |row| Ok(DataSource { name: row.get(0)?, website: row.get(1)? }))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(sources)
  }

  /// Number of rows in `yearly_stats`, across all countries.
  pub async fn stat_row_count(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM yearly_stats", [], |r| r.get(0))?))
      .await?;
    Ok(n.max(0) as usize)
  }
}

// ─── PopulationStore impl ────────────────────────────────────────────────────

impl PopulationStore for SqliteStore {
  type Error = crate::Error;

  async fn upsert_country(&self, record: CountryRecord) -> Result<StoreEntry> {
    let entry = StoreEntry::from(&record);

    let code_str = encode_code(&record.country_code);
    let name     = record.country_name;
    let source   = record.source;
    let stats: Vec<RawStat> = record.stats.iter().map(RawStat::from).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let source_id: Option<i64> = source
          .map(|s| {
            tx.query_row(
              "INSERT INTO data_sources (name, website) VALUES (?1, ?2)
               ON CONFLICT (name) DO UPDATE
                 SET website = COALESCE(excluded.website, data_sources.website)
               RETURNING source_id",
              rusqlite::params![s.name, s.website],
              |row| row.get(0),
            )
          })
          .transpose()?;
        tx.execute(
          "INSERT INTO countries (country_code, country_name, source_id) VALUES (?1, ?2, ?3)
           ON CONFLICT (country_code) DO UPDATE
             SET country_name = excluded.country_name,
                 source_id    = excluded.source_id",
          rusqlite::params![code_str, name, source_id],
        )?;
        tx.execute(
          "DELETE FROM yearly_stats WHERE country_code = ?1",
          rusqlite::params![code_str],
        )?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO yearly_stats (country_code, year, population, births, deaths)
             VALUES (?1, ?2, ?3, ?4, ?5)",
          )?;
          for s in &stats {
            stmt.execute(rusqlite::params![code_str, s.year, s.population, s.births, s.deaths])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(entry)
  }

  async fn get_country(&self, code: CountryCode) -> Result<Option<CountryRecord>> {
    let code_str = encode_code(&code);

    let raw: Option<RawCountry> = self
      .conn
      .call(move |conn| {
        let head: Option<(String, Option<String>, Option<String>)> = conn
          .query_row(
            "SELECT c.country_name, d.name, d.website
             FROM countries c
             LEFT JOIN data_sources d ON d.source_id = c.source_id
             WHERE c.country_code = ?1",
            rusqlite::params![code_str],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
          )
          .optional()?;

        let Some((country_name, source_name, source_website)) = head else {
          return Ok(None);
        };

        let mut stmt = conn.prepare(
          "SELECT year, population, births, deaths
           FROM yearly_stats
           WHERE country_code = ?1
           ORDER BY year",
        )?;
        let stats = stmt
          .query_map(rusqlite::params![code_str], |row| {
            Ok(RawStat {
              year:       row.get(0)?,
              population: row.get(1)?,
              births:     row.get(2)?,
              deaths:     row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(RawCountry {
          country_code: code_str,
          country_name,
          source_name,
          source_website,
          stats,
        }))
      })
      .await?;

    raw.map(RawCountry::into_record).transpose()
  }

  async fn list_countries(&self) -> Result<Vec<StoreEntry>> {
    let raws: Vec<RawEntry> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT c.country_code, c.country_name, d.name,
                  COUNT(s.year), MIN(s.year), MAX(s.year)
           FROM countries c
           LEFT JOIN data_sources d ON d.source_id = c.source_id
           LEFT JOIN yearly_stats s ON s.country_code = c.country_code
           GROUP BY c.country_code, c.country_name, d.name
           ORDER BY c.country_code",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawEntry {
              country_code: row.get(0)?,
              country_name: row.get(1)?,
              source_name:  row.get(2)?,
              year_count:   row.get(3)?,
              first_year:   row.get(4)?,
              last_year:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }
}
