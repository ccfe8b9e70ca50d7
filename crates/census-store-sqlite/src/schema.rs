//! SQL schema for the census SQLite store.
//!
//! Executed once at connection startup. Databases written by an older
//! version are brought forward by the steps in [`MIGRATIONS`], gated on
//! `PRAGMA user_version`.

/// Version written to `PRAGMA user_version` once the schema is current.
pub const SCHEMA_VERSION: i64 = 2;

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Providers the stored figures were obtained from.
CREATE TABLE IF NOT EXISTS data_sources (
    source_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT NOT NULL UNIQUE,
    website   TEXT
);

-- One row per country; rewritten in place on every upsert.
CREATE TABLE IF NOT EXISTS countries (
    country_code TEXT PRIMARY KEY,   -- ISO 3166-1 alpha-3, upper case
    country_name TEXT NOT NULL,
    source_id    INTEGER REFERENCES data_sources(source_id)
);

-- The yearly series of a country is replaced wholesale on upsert.
CREATE TABLE IF NOT EXISTS yearly_stats (
    country_code TEXT    NOT NULL REFERENCES countries(country_code) ON DELETE CASCADE,
    year         INTEGER NOT NULL,
    population   INTEGER NOT NULL CHECK (population >= 0),
    births       INTEGER CHECK (births >= 0),
    deaths       INTEGER CHECK (deaths >= 0),
    PRIMARY KEY (country_code, year)
);

CREATE INDEX IF NOT EXISTS yearly_stats_year_idx ON yearly_stats(year);
";

/// `(from_version, ddl)`: run after [`SCHEMA`] when the database reports
/// `from_version`.
pub const MIGRATIONS: &[(i64, &str)] = &[(
  1,
  "ALTER TABLE countries ADD COLUMN source_id INTEGER REFERENCES data_sources(source_id);",
)];
